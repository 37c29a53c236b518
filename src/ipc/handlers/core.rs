use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::path::PathBuf;
use tracing::{info, warn};

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string()),
            "openRecords": state.sessions.len(),
        }),
    )
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let p = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .map(PathBuf::from);
    let Some(path) = p else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };

    let conn = match db::open_db(&path) {
        Ok(conn) => conn,
        Err(e) => return err(&req.id, "io_failed", format!("{e:#}"), None),
    };

    // Open records belong to the previous workspace's database; they are
    // written back there before the switch.
    let mut saved = Vec::with_capacity(state.sessions.len());
    if let Some(old) = state.db.as_ref() {
        for ((teacher_id, record_key), gradebook) in &state.sessions {
            if let Err(e) = db::record_save(old, teacher_id, record_key, gradebook) {
                warn!(record = %record_key, error = %format!("{e:#}"), "save before workspace switch failed");
                return err(
                    &req.id,
                    "db_update_failed",
                    format!("failed to save open record {}: {e:#}", record_key),
                    Some(json!({ "teacherId": teacher_id, "recordKey": record_key })),
                );
            }
            saved.push(json!({ "teacherId": teacher_id, "recordKey": record_key }));
        }
    }
    if !saved.is_empty() {
        info!(saved = saved.len(), "saved open records before workspace switch");
    }
    state.sessions.clear();

    info!(workspace = %path.display(), "workspace selected");
    state.workspace = Some(path.clone());
    state.db = Some(conn);
    ok(
        &req.id,
        json!({ "workspacePath": path.to_string_lossy(), "savedRecords": saved }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        _ => None,
    }
}
