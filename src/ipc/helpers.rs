use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request, SessionKey};
use crate::model::{GradeKey, GradebookError, GradebookState};
use rusqlite::Connection;
use serde_json::Value;

/// Handler outcome: a result payload, or a fully-built error response.
pub type HandlerResult = Result<Value, Value>;

pub fn respond(req: &Request, result: HandlerResult) -> Value {
    match result {
        Ok(v) => ok(&req.id, v),
        Err(resp) => resp,
    }
}

pub fn bad_params(req: &Request, message: impl Into<String>) -> Value {
    err(&req.id, "bad_params", message, None)
}

pub fn domain_err(req: &Request, e: &GradebookError) -> Value {
    err(&req.id, e.code(), e.to_string(), None)
}

/// Maps an infrastructure error, surfacing a wrapped domain error's own code.
pub fn anyhow_err(req: &Request, fallback_code: &str, e: &anyhow::Error) -> Value {
    match e.downcast_ref::<GradebookError>() {
        Some(g) => domain_err(req, g),
        None => err(&req.id, fallback_code, format!("{e:#}"), None),
    }
}

pub fn required_str<'a>(req: &'a Request, key: &str) -> Result<&'a str, Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| bad_params(req, format!("missing params.{}", key)))
}

pub fn optional_str<'a>(req: &'a Request, key: &str) -> Result<Option<&'a str>, Value> {
    match req.params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(_) => Err(bad_params(req, format!("params.{} must be a string", key))),
    }
}

pub fn required_i64(req: &Request, key: &str) -> Result<i64, Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_i64())
        .ok_or_else(|| bad_params(req, format!("missing/invalid params.{}", key)))
}

pub fn optional_i64(req: &Request, key: &str) -> Result<Option<i64>, Value> {
    match req.params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_i64()
            .map(Some)
            .ok_or_else(|| bad_params(req, format!("params.{} must be an integer", key))),
    }
}

pub fn required_index(req: &Request, key: &str) -> Result<usize, Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_u64())
        .map(|n| n as usize)
        .ok_or_else(|| bad_params(req, format!("missing/invalid params.{}", key)))
}

pub fn grade_key(req: &Request) -> Result<GradeKey, Value> {
    required_str(req, "key")?
        .parse::<GradeKey>()
        .map_err(|e| domain_err(req, &e))
}

/// Grade values arrive as text, a number, or null for "clear".
pub fn grade_text(req: &Request) -> Result<String, Value> {
    match req.params.get("value") {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(_) => Err(bad_params(req, "params.value must be a string, number or null")),
    }
}

pub fn require_db<'a>(state: &'a AppState, req: &Request) -> Result<&'a Connection, Value> {
    state
        .db
        .as_ref()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
}

pub fn session_key(req: &Request) -> Result<SessionKey, Value> {
    let teacher_id = required_str(req, "teacherId")?;
    let record_key = required_str(req, "recordKey")?;
    Ok((teacher_id.to_string(), record_key.to_string()))
}

pub fn open_record<'a>(
    state: &'a mut AppState,
    req: &Request,
) -> Result<&'a mut GradebookState, Value> {
    let key = session_key(req)?;
    state.sessions.get_mut(&key).ok_or_else(|| {
        err(
            &req.id,
            "not_found",
            format!("record {} is not open", key.1),
            None,
        )
    })
}
