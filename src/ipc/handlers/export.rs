use crate::export::{ExportJob, JobState};
use crate::ipc::error::err;
use crate::ipc::handlers::reports::resolve_layout;
use crate::ipc::helpers::{domain_err, open_record, required_str, respond, HandlerResult};
use crate::ipc::types::{AppState, Request};
use crate::report;
use serde_json::{json, Value};
use std::path::PathBuf;
use tracing::info;

fn export_start(state: &mut AppState, req: &Request) -> HandlerResult {
    let out_path = PathBuf::from(required_str(req, "outPath")?);
    let (orientation, chunk_size) = resolve_layout(state, req)?;
    let gradebook = open_record(state, req)?;
    // Pages own their data, so later edits to the open record never reach the job.
    let pages = report::paginate(gradebook, orientation, chunk_size)
        .map_err(|e| domain_err(req, &e))?;
    let page_count = pages.len();

    // Finished jobs are only kept until the next start.
    state.exports.retain(|_, job| !job.is_finished());

    let job_id = uuid::Uuid::new_v4().to_string();
    info!(job = %job_id, pages = page_count, out = %out_path.display(), "export started");
    let job = ExportJob::spawn(job_id.clone(), pages, out_path);
    state.exports.insert(job_id.clone(), job);
    Ok(json!({ "jobId": job_id, "pageCount": page_count }))
}

fn find_job<'a>(state: &'a AppState, req: &Request) -> Result<&'a ExportJob, Value> {
    let job_id = required_str(req, "jobId")?;
    state
        .exports
        .get(job_id)
        .ok_or_else(|| err(&req.id, "not_found", format!("unknown export job {}", job_id), None))
}

fn export_status(state: &mut AppState, req: &Request) -> HandlerResult {
    let job = find_job(state, req)?;
    Ok(json!({ "jobId": job.id, "progress": job.progress() }))
}

fn export_cancel(state: &mut AppState, req: &Request) -> HandlerResult {
    let job = find_job(state, req)?;
    let progress = job.progress();
    if progress.state == JobState::Running {
        job.cancel();
        info!(job = %job.id, "export cancel requested");
    }
    Ok(json!({ "jobId": job.id, "cancelRequested": progress.state == JobState::Running }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "export.start" => export_start(state, req),
        "export.status" => export_status(state, req),
        "export.cancel" => export_cancel(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
