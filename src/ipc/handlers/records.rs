use crate::columns;
use crate::db::{self, NewRecord};
use crate::ipc::error::err;
use crate::ipc::handlers::setup;
use crate::ipc::helpers::{
    anyhow_err, bad_params, open_record, optional_str, require_db, required_i64, required_str,
    respond, session_key, HandlerResult,
};
use crate::ipc::types::{AppState, Request};
use serde_json::{json, Value};
use tracing::{info, warn};

fn records_list(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = require_db(state, req)?;
    let teacher_id = required_str(req, "teacherId")?;
    let records =
        db::records_list(conn, teacher_id).map_err(|e| anyhow_err(req, "db_query_failed", &e))?;
    Ok(json!({ "records": records }))
}

fn records_create(state: &mut AppState, req: &Request) -> HandlerResult {
    let conn = require_db(state, req)?;
    let teacher_id = required_str(req, "teacherId")?;
    let class_label = required_str(req, "classLabel")?;
    let section = required_str(req, "section")?;
    let teacher_name = optional_str(req, "teacherName")?.unwrap_or("");
    let subject_name = optional_str(req, "subjectName")?.unwrap_or("");

    let defaults = setup::record_defaults(conn)
        .map_err(|e| anyhow_err(req, "db_query_failed", &e))?
        .info;
    let (record_key, gradebook) = db::record_create(
        conn,
        NewRecord {
            teacher_id,
            class_label,
            section,
            teacher_name,
            subject_name,
            defaults,
        },
    )
    .map_err(|e| anyhow_err(req, "db_update_failed", &e))?;

    info!(teacher = teacher_id, record = %record_key, "record created");
    let result = json!({ "recordKey": record_key, "state": gradebook });
    state
        .sessions
        .insert((teacher_id.to_string(), record_key), gradebook);
    Ok(result)
}

fn records_open(state: &mut AppState, req: &Request) -> HandlerResult {
    let key = session_key(req)?;
    if let Some(open) = state.sessions.get(&key) {
        return Ok(json!({ "state": open, "alreadyOpen": true }));
    }
    let conn = require_db(state, req)?;
    let gradebook = db::record_load(conn, &key.0, &key.1)
        .map_err(|e| anyhow_err(req, "db_query_failed", &e))?;
    info!(teacher = %key.0, record = %key.1, students = gradebook.students.len(), "record opened");
    let result = json!({ "state": gradebook, "alreadyOpen": false });
    state.sessions.insert(key, gradebook);
    Ok(result)
}

fn records_get(state: &mut AppState, req: &Request) -> HandlerResult {
    let gradebook = open_record(state, req)?;
    Ok(json!({ "state": gradebook }))
}

fn save_session(state: &AppState, req: &Request) -> Result<(), Value> {
    let key = session_key(req)?;
    let conn = require_db(state, req)?;
    let Some(gradebook) = state.sessions.get(&key) else {
        return Err(err(
            &req.id,
            "not_found",
            format!("record {} is not open", key.1),
            None,
        ));
    };
    db::record_save(conn, &key.0, &key.1, gradebook)
        .map_err(|e| anyhow_err(req, "db_update_failed", &e))?;
    info!(teacher = %key.0, record = %key.1, "record saved");
    Ok(())
}

fn records_save(state: &mut AppState, req: &Request) -> HandlerResult {
    save_session(state, req)?;
    Ok(json!({ "saved": true }))
}

fn records_close(state: &mut AppState, req: &Request) -> HandlerResult {
    let key = session_key(req)?;
    let save = match req.params.get("save") {
        None | Some(Value::Null) => true,
        Some(v) => v
            .as_bool()
            .ok_or_else(|| bad_params(req, "params.save must be boolean"))?,
    };
    if !state.sessions.contains_key(&key) {
        return Err(err(
            &req.id,
            "not_found",
            format!("record {} is not open", key.1),
            None,
        ));
    }
    if save {
        save_session(state, req)?;
    } else {
        warn!(teacher = %key.0, record = %key.1, "closing without save");
    }
    state.sessions.remove(&key);
    Ok(json!({ "closed": true, "saved": save }))
}

fn records_delete(state: &mut AppState, req: &Request) -> HandlerResult {
    let key = session_key(req)?;
    let conn = require_db(state, req)?;
    db::record_delete(conn, &key.0, &key.1)
        .map_err(|e| anyhow_err(req, "db_update_failed", &e))?;
    state.sessions.remove(&key);
    info!(teacher = %key.0, record = %key.1, "record deleted");
    Ok(json!({ "deleted": true }))
}

fn records_update_info(state: &mut AppState, req: &Request) -> HandlerResult {
    let Some(patch) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return Err(bad_params(req, "patch must be an object"));
    };
    let gradebook = open_record(state, req)?;
    // Validate every field before applying any of them.
    let mut updates = Vec::with_capacity(patch.len());
    for (k, v) in patch {
        let Some(s) = v.as_str() else {
            return Err(bad_params(req, format!("{} must be string", k)));
        };
        match k.as_str() {
            "schoolName" | "teacherName" | "subjectName" | "className" | "year" => {
                updates.push((k.as_str(), s.trim().to_string()))
            }
            _ => return Err(bad_params(req, format!("unknown info field: {}", k))),
        }
    }
    let info = &mut gradebook.info;
    for (k, s) in updates {
        match k {
            "schoolName" => info.school_name = s,
            "teacherName" => info.teacher_name = s,
            "subjectName" => info.subject_name = s,
            "className" => info.class_name = s,
            _ => info.year = s,
        }
    }
    Ok(json!({ "info": gradebook.info }))
}

fn records_set_exam_max(state: &mut AppState, req: &Request) -> HandlerResult {
    let value = required_i64(req, "value")?;
    let gradebook = open_record(state, req)?;
    let applied = columns::set_exam_max_grade(gradebook, value);
    Ok(json!({ "examMaxGrade": applied }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "records.list" => records_list(state, req),
        "records.create" => records_create(state, req),
        "records.open" => records_open(state, req),
        "records.get" => records_get(state, req),
        "records.save" => records_save(state, req),
        "records.close" => records_close(state, req),
        "records.delete" => records_delete(state, req),
        "records.updateInfo" => records_update_info(state, req),
        "records.setExamMax" => records_set_exam_max(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
