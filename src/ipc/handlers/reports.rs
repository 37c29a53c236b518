use crate::ipc::handlers::setup;
use crate::ipc::helpers::{
    anyhow_err, bad_params, domain_err, open_record, optional_i64, optional_str, required_index,
    respond, HandlerResult,
};
use crate::ipc::types::{AppState, Request};
use crate::report::{self, Orientation, PageLayout};
use serde_json::{json, Value};

/// Orientation and chunk size for a paginated request: explicit params win,
/// then workspace settings, then built-in defaults.
pub fn resolve_layout(state: &AppState, req: &Request) -> Result<(Orientation, usize), Value> {
    let (default_orientation, layout) = match state.db.as_ref() {
        Some(conn) => {
            setup::report_settings(conn).map_err(|e| anyhow_err(req, "db_query_failed", &e))?
        }
        None => (Orientation::Landscape, PageLayout::default()),
    };
    let orientation = match optional_str(req, "orientation")? {
        Some(s) => Orientation::parse(s).ok_or_else(|| {
            bad_params(req, "orientation must be one of: landscape, portrait")
        })?,
        None => default_orientation,
    };
    let chunk_size = match optional_i64(req, "chunkSize")? {
        Some(n) if n >= 1 => n as usize,
        Some(_) => return Err(bad_params(req, "chunkSize must be >= 1")),
        None => layout.chunk_size(orientation),
    };
    Ok((orientation, chunk_size))
}

fn reports_semester_table(state: &mut AppState, req: &Request) -> HandlerResult {
    let sem = required_index(req, "semester")?;
    let gradebook = open_record(state, req)?;
    let table = report::semester_table(gradebook, sem).map_err(|e| domain_err(req, &e))?;
    Ok(json!(table))
}

fn reports_pages(state: &mut AppState, req: &Request) -> HandlerResult {
    let (orientation, chunk_size) = resolve_layout(state, req)?;
    let gradebook = open_record(state, req)?;
    let pages = report::paginate(gradebook, orientation, chunk_size)
        .map_err(|e| domain_err(req, &e))?;
    Ok(json!({
        "orientation": orientation,
        "chunkSize": chunk_size,
        "pageCount": pages.len(),
        "pages": pages,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "reports.semesterTable" => reports_semester_table(state, req),
        "reports.pages" => reports_pages(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
