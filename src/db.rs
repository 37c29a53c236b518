use crate::model::{GradebookError, GradebookState, RecordInfo};
use anyhow::Context;
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use std::path::Path;

pub const DB_FILE: &str = "gradebook.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let conn = Connection::open(workspace.join(DB_FILE))?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS records(
            teacher_id TEXT NOT NULL,
            record_key TEXT NOT NULL,
            class_name TEXT NOT NULL,
            subject_name TEXT NOT NULL,
            state_json TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            PRIMARY KEY(teacher_id, record_key)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_records_teacher ON records(teacher_id)",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL
        )",
        [],
    )?;
    Ok(())
}

pub fn settings_get_json(conn: &Connection, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value_json FROM settings WHERE key = ?",
            [key],
            |r| r.get(0),
        )
        .optional()?;
    match raw {
        Some(text) => Ok(Some(
            serde_json::from_str(&text).with_context(|| format!("settings {} is not JSON", key))?,
        )),
        None => Ok(None),
    }
}

pub fn settings_set_json(conn: &Connection, key: &str, value: &serde_json::Value) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value_json) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json",
        (key, value.to_string()),
    )?;
    Ok(())
}

/// Storage key for a class/section pair, e.g. `"5th_A"`.
pub fn record_key(class_label: &str, section: &str) -> Result<String, GradebookError> {
    let class_label = class_label.trim();
    let section = section.trim();
    if class_label.is_empty() || section.is_empty() {
        return Err(GradebookError::InvalidInput(
            "class and section are both required".into(),
        ));
    }
    Ok(format!("{}_{}", class_label, section))
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordSummary {
    pub record_key: String,
    pub info: RecordInfo,
    pub updated_at: String,
}

pub fn records_list(conn: &Connection, teacher_id: &str) -> anyhow::Result<Vec<RecordSummary>> {
    let mut stmt = conn.prepare(
        "SELECT record_key, state_json, updated_at
         FROM records
         WHERE teacher_id = ?
         ORDER BY record_key",
    )?;
    let rows = stmt
        .query_map([teacher_id], |r| {
            Ok((
                r.get::<_, String>(0)?,
                r.get::<_, String>(1)?,
                r.get::<_, String>(2)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut out = Vec::with_capacity(rows.len());
    for (record_key, state_json, updated_at) in rows {
        // A damaged record still shows up in the list with default info.
        let info = serde_json::from_str::<serde_json::Value>(&state_json)
            .ok()
            .and_then(|v| GradebookState::from_json(v).ok())
            .map(|s| s.info)
            .unwrap_or_default();
        out.push(RecordSummary {
            record_key,
            info,
            updated_at,
        });
    }
    Ok(out)
}

pub fn record_exists(conn: &Connection, teacher_id: &str, key: &str) -> anyhow::Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM records WHERE teacher_id = ? AND record_key = ?",
            (teacher_id, key),
            |r| r.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

pub struct NewRecord<'a> {
    pub teacher_id: &'a str,
    pub class_label: &'a str,
    pub section: &'a str,
    pub teacher_name: &'a str,
    pub subject_name: &'a str,
    pub defaults: RecordInfo,
}

/// Creates and stores a fresh record. Fails with a conflict when the
/// class/section pair already has one.
pub fn record_create(conn: &Connection, new: NewRecord<'_>) -> anyhow::Result<(String, GradebookState)> {
    let key = record_key(new.class_label, new.section)?;
    if record_exists(conn, new.teacher_id, &key)? {
        return Err(GradebookError::DuplicateRecord(key).into());
    }

    let mut state = GradebookState {
        info: new.defaults,
        ..Default::default()
    };
    state.info.teacher_name = new.teacher_name.to_string();
    state.info.subject_name = new.subject_name.to_string();
    state.info.class_name = format!("{} / {}", new.class_label.trim(), new.section.trim());

    let now = chrono::Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO records(teacher_id, record_key, class_name, subject_name, state_json, created_at, updated_at)
         VALUES(?, ?, ?, ?, ?, ?, ?)",
        (
            new.teacher_id,
            &key,
            &state.info.class_name,
            &state.info.subject_name,
            serde_json::to_string(&state)?,
            &now,
            &now,
        ),
    )?;
    Ok((key, state))
}

pub fn record_load(conn: &Connection, teacher_id: &str, key: &str) -> anyhow::Result<GradebookState> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT state_json FROM records WHERE teacher_id = ? AND record_key = ?",
            (teacher_id, key),
            |r| r.get(0),
        )
        .optional()?;
    let Some(raw) = raw else {
        return Err(GradebookError::RecordNotFound(key.to_string()).into());
    };
    let value: serde_json::Value =
        serde_json::from_str(&raw).with_context(|| format!("record {} is not JSON", key))?;
    GradebookState::from_json(value).with_context(|| format!("record {} has an invalid shape", key))
}

/// Whole-record replace; there is no partial persistence.
pub fn record_save(
    conn: &Connection,
    teacher_id: &str,
    key: &str,
    state: &GradebookState,
) -> anyhow::Result<()> {
    let now = chrono::Utc::now().to_rfc3339();
    let changed = conn.execute(
        "UPDATE records
         SET state_json = ?, class_name = ?, subject_name = ?, updated_at = ?
         WHERE teacher_id = ? AND record_key = ?",
        (
            serde_json::to_string(state)?,
            &state.info.class_name,
            &state.info.subject_name,
            &now,
            teacher_id,
            key,
        ),
    )?;
    if changed == 0 {
        conn.execute(
            "INSERT INTO records(teacher_id, record_key, class_name, subject_name, state_json, created_at, updated_at)
             VALUES(?, ?, ?, ?, ?, ?, ?)",
            (
                teacher_id,
                key,
                &state.info.class_name,
                &state.info.subject_name,
                serde_json::to_string(state)?,
                &now,
                &now,
            ),
        )?;
    }
    Ok(())
}

pub fn record_delete(conn: &Connection, teacher_id: &str, key: &str) -> anyhow::Result<()> {
    let changed = conn.execute(
        "DELETE FROM records WHERE teacher_id = ? AND record_key = ?",
        (teacher_id, key),
    )?;
    if changed == 0 {
        return Err(GradebookError::RecordNotFound(key.to_string()).into());
    }
    Ok(())
}
