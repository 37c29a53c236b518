use crate::calc;
use crate::ipc::helpers::{domain_err, open_record, required_i64, respond, HandlerResult};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn calc_student(state: &mut AppState, req: &Request) -> HandlerResult {
    let student_id = required_i64(req, "studentId")?;
    let gradebook = &*open_record(state, req)?;
    let student = gradebook.student(student_id).map_err(|e| domain_err(req, &e))?;
    let result = calc::calculate_student(gradebook, student).map_err(|e| domain_err(req, &e))?;
    Ok(json!(result))
}

fn calc_record(state: &mut AppState, req: &Request) -> HandlerResult {
    let gradebook = open_record(state, req)?;
    let students = calc::calculate_record(gradebook).map_err(|e| domain_err(req, &e))?;
    Ok(json!({ "students": students }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "calc.student" => calc_student(state, req),
        "calc.record" => calc_record(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
