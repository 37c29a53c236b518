use crate::calc;
use crate::ipc::helpers::{
    domain_err, grade_key, grade_text, open_record, required_i64, respond, HandlerResult,
};
use crate::ipc::types::{AppState, Request};
use crate::ledger;
use serde_json::json;

/// Grid entry: digits only, clamped to the cell's cap. Returns the stored
/// value and the student's refreshed averages so the row can redraw.
fn grid_set_grade(state: &mut AppState, req: &Request) -> HandlerResult {
    let student_id = required_i64(req, "studentId")?;
    let key = grade_key(req)?;
    let raw = grade_text(req)?;
    let gradebook = open_record(state, req)?;
    let stored =
        ledger::enter_grade(gradebook, student_id, key, &raw).map_err(|e| domain_err(req, &e))?;
    let gradebook = &*gradebook;
    let student = gradebook.student(student_id).map_err(|e| domain_err(req, &e))?;
    let averages = calc::calculate_student(gradebook, student).map_err(|e| domain_err(req, &e))?;
    Ok(json!({ "key": key, "value": stored, "averages": averages }))
}

fn grid_set_raw(state: &mut AppState, req: &Request) -> HandlerResult {
    let student_id = required_i64(req, "studentId")?;
    let key = grade_key(req)?;
    let raw = grade_text(req)?;
    let gradebook = open_record(state, req)?;
    let stored =
        ledger::set_grade(gradebook, student_id, key, &raw).map_err(|e| domain_err(req, &e))?;
    Ok(json!({ "key": key, "value": stored }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "grid.setGrade" => grid_set_grade(state, req),
        "grid.setRaw" => grid_set_raw(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
