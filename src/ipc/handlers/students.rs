use crate::ipc::helpers::{
    bad_params, domain_err, open_record, optional_str, required_i64, required_str, respond,
    HandlerResult,
};
use crate::ipc::types::{AppState, Request};
use crate::ledger;
use serde_json::json;
use tracing::{debug, info};

fn students_add(state: &mut AppState, req: &Request) -> HandlerResult {
    let name = optional_str(req, "name")?.unwrap_or("");
    let gradebook = open_record(state, req)?;
    let id = ledger::add_student(gradebook, name);
    debug!(student = id, "student added");
    Ok(json!({ "studentId": id, "studentCount": gradebook.students.len() }))
}

fn students_rename(state: &mut AppState, req: &Request) -> HandlerResult {
    let student_id = required_i64(req, "studentId")?;
    let name = required_str(req, "name")?;
    let gradebook = open_record(state, req)?;
    ledger::rename_student(gradebook, student_id, name).map_err(|e| domain_err(req, &e))?;
    Ok(json!({ "ok": true }))
}

fn students_delete(state: &mut AppState, req: &Request) -> HandlerResult {
    let student_id = required_i64(req, "studentId")?;
    let gradebook = open_record(state, req)?;
    let removed = ledger::remove_student(gradebook, student_id).map_err(|e| domain_err(req, &e))?;
    info!(student = removed.id, "student deleted");
    Ok(json!({ "removed": removed }))
}

fn students_import_names(state: &mut AppState, req: &Request) -> HandlerResult {
    let text = required_str(req, "text")?;
    let names = match optional_str(req, "format")?.unwrap_or("lines") {
        "lines" => ledger::names_from_lines(text),
        "csv" => ledger::names_from_csv(text),
        other => {
            return Err(bad_params(
                req,
                format!("format must be one of: lines, csv (got {})", other),
            ))
        }
    };
    let gradebook = open_record(state, req)?;
    let added = ledger::append_names(gradebook, &names);
    info!(added = added.len(), "roster names imported");
    Ok(json!({ "added": added.len(), "studentIds": added }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "students.add" => students_add(state, req),
        "students.rename" => students_rename(state, req),
        "students.delete" => students_delete(state, req),
        "students.importNames" => students_import_names(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
