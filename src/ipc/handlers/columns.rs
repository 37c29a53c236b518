use crate::columns::{self, ColumnField};
use crate::ipc::handlers::setup;
use crate::ipc::helpers::{
    anyhow_err, bad_params, domain_err, open_record, optional_i64, optional_str, require_db,
    required_index, respond, HandlerResult,
};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use tracing::info;

fn columns_add(state: &mut AppState, req: &Request) -> HandlerResult {
    let sem = required_index(req, "semester")?;
    let month = required_index(req, "month")?;
    let title = optional_str(req, "title")?.map(str::to_string);
    let max = optional_i64(req, "max")?;

    // Omitted fields fall back to the workspace defaults when one is selected.
    let (title, max) = match require_db(state, req) {
        Ok(conn) => {
            let d = setup::record_defaults(conn)
                .map_err(|e| anyhow_err(req, "db_query_failed", &e))?;
            (
                Some(title.unwrap_or(d.column_title)),
                Some(max.unwrap_or(d.column_max)),
            )
        }
        Err(_) => (title, max),
    };

    let gradebook = open_record(state, req)?;
    let col = columns::add_column(gradebook, sem, month, title.as_deref(), max)
        .map_err(|e| domain_err(req, &e))?;
    let list = &gradebook.semesters[sem].months[month].custom_columns;
    Ok(json!({ "col": col, "columns": list }))
}

fn columns_remove(state: &mut AppState, req: &Request) -> HandlerResult {
    let sem = required_index(req, "semester")?;
    let month = required_index(req, "month")?;
    let col = required_index(req, "col")?;
    let gradebook = open_record(state, req)?;
    let removed =
        columns::remove_column(gradebook, sem, month, col).map_err(|e| domain_err(req, &e))?;
    info!(semester = sem, month, col, "column removed");
    Ok(json!({
        "removed": removed,
        "columns": gradebook.semesters[sem].months[month].custom_columns,
    }))
}

fn columns_update(state: &mut AppState, req: &Request) -> HandlerResult {
    let sem = required_index(req, "semester")?;
    let month = required_index(req, "month")?;
    let col = required_index(req, "col")?;
    let field = match (optional_str(req, "title")?, optional_i64(req, "max")?) {
        (Some(t), None) => ColumnField::Title(t.to_string()),
        (None, Some(m)) => ColumnField::Max(m),
        _ => return Err(bad_params(req, "provide exactly one of params.title, params.max")),
    };
    let gradebook = open_record(state, req)?;
    columns::update_column(gradebook, sem, month, col, field).map_err(|e| domain_err(req, &e))?;
    Ok(json!({ "column": gradebook.semesters[sem].months[month].custom_columns[col] }))
}

fn columns_copy_first_month(state: &mut AppState, req: &Request) -> HandlerResult {
    let gradebook = open_record(state, req)?;
    columns::copy_first_month_to_all(gradebook);
    Ok(json!({ "semesters": gradebook.semesters }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "columns.add" => columns_add(state, req),
        "columns.remove" => columns_remove(state, req),
        "columns.update" => columns_update(state, req),
        "columns.copyFirstMonthToAll" => columns_copy_first_month(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
