use crate::columns::{DEFAULT_COLUMN_MAX, DEFAULT_COLUMN_TITLE};
use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::model::{RecordInfo, DEFAULT_EXAM_MAX_GRADE, DEFAULT_YEAR, EXAM_CAP};
use crate::report::{Orientation, PageLayout, DEFAULT_LANDSCAPE_CHUNK, DEFAULT_PORTRAIT_CHUNK};
use serde_json::{json, Map, Value};

const MAX_CHUNK: i64 = 60;
const MAX_COLUMN_MAX: i64 = 1000;

#[derive(Clone, Copy)]
enum SetupSection {
    Reports,
    Records,
}

impl SetupSection {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "reports" => Some(Self::Reports),
            "records" => Some(Self::Records),
            _ => None,
        }
    }

    fn key(self) -> &'static str {
        match self {
            Self::Reports => "setup.reports",
            Self::Records => "setup.records",
        }
    }
}

fn default_section(section: SetupSection) -> Value {
    match section {
        SetupSection::Reports => json!({
            "defaultOrientation": "landscape",
            "landscapeChunkSize": DEFAULT_LANDSCAPE_CHUNK,
            "portraitChunkSize": DEFAULT_PORTRAIT_CHUNK
        }),
        SetupSection::Records => json!({
            "defaultYear": DEFAULT_YEAR,
            "defaultExamMaxGrade": DEFAULT_EXAM_MAX_GRADE,
            "defaultColumnTitle": DEFAULT_COLUMN_TITLE,
            "defaultColumnMax": DEFAULT_COLUMN_MAX
        }),
    }
}

fn as_object_mut(value: &mut Value) -> Result<&mut Map<String, Value>, String> {
    value
        .as_object_mut()
        .ok_or_else(|| "internal setup object must be a JSON object".to_string())
}

fn parse_i64_range(v: &Value, key: &str, min: i64, max: i64) -> Result<i64, String> {
    let n = v
        .as_i64()
        .ok_or_else(|| format!("{} must be integer", key))?;
    if !(min..=max).contains(&n) {
        return Err(format!("{} must be in {}..={}", key, min, max));
    }
    Ok(n)
}

fn parse_string_max(v: &Value, key: &str, max_len: usize) -> Result<String, String> {
    let s = v.as_str().ok_or_else(|| format!("{} must be string", key))?;
    let s = s.trim();
    if s.chars().count() > max_len {
        return Err(format!("{} length must be <= {}", key, max_len));
    }
    Ok(s.to_string())
}

fn merge_section_patch(
    section: SetupSection,
    current: &mut Value,
    patch: &Map<String, Value>,
) -> Result<(), String> {
    let obj = as_object_mut(current)?;
    for (k, v) in patch {
        match section {
            SetupSection::Reports => match k.as_str() {
                "defaultOrientation" => {
                    let s = parse_string_max(v, k, 16)?;
                    let Some(o) = Orientation::parse(&s) else {
                        return Err("defaultOrientation must be one of: landscape, portrait".into());
                    };
                    obj.insert(k.clone(), Value::String(o.as_str().to_string()));
                }
                "landscapeChunkSize" | "portraitChunkSize" => {
                    obj.insert(k.clone(), Value::from(parse_i64_range(v, k, 1, MAX_CHUNK)?));
                }
                _ => return Err(format!("unknown reports field: {}", k)),
            },
            SetupSection::Records => match k.as_str() {
                "defaultYear" => {
                    obj.insert(k.clone(), Value::String(parse_string_max(v, k, 32)?));
                }
                "defaultExamMaxGrade" => {
                    obj.insert(k.clone(), Value::from(parse_i64_range(v, k, 0, EXAM_CAP)?));
                }
                "defaultColumnTitle" => {
                    let s = parse_string_max(v, k, 64)?;
                    if s.is_empty() {
                        return Err("defaultColumnTitle must not be empty".into());
                    }
                    obj.insert(k.clone(), Value::String(s));
                }
                "defaultColumnMax" => {
                    obj.insert(k.clone(), Value::from(parse_i64_range(v, k, 0, MAX_COLUMN_MAX)?));
                }
                _ => return Err(format!("unknown records field: {}", k)),
            },
        }
    }
    Ok(())
}

fn load_section(conn: &rusqlite::Connection, section: SetupSection) -> anyhow::Result<Value> {
    let mut current = default_section(section);
    if let Some(saved) = db::settings_get_json(conn, section.key())? {
        if let Some(saved_obj) = saved.as_object() {
            // A malformed stored value falls back to defaults field by field.
            let _ = merge_section_patch(section, &mut current, saved_obj);
        }
    }
    Ok(current)
}

/// Page layout and default orientation for report and export requests.
pub fn report_settings(conn: &rusqlite::Connection) -> anyhow::Result<(Orientation, PageLayout)> {
    let v = load_section(conn, SetupSection::Reports)?;
    let orientation = v
        .get("defaultOrientation")
        .and_then(|o| o.as_str())
        .and_then(Orientation::parse)
        .unwrap_or(Orientation::Landscape);
    let chunk = |key: &str, fallback: usize| {
        v.get(key)
            .and_then(|n| n.as_u64())
            .map(|n| n as usize)
            .unwrap_or(fallback)
    };
    Ok((
        orientation,
        PageLayout {
            landscape_chunk: chunk("landscapeChunkSize", DEFAULT_LANDSCAPE_CHUNK),
            portrait_chunk: chunk("portraitChunkSize", DEFAULT_PORTRAIT_CHUNK),
        },
    ))
}

pub struct RecordDefaults {
    pub info: RecordInfo,
    pub column_title: String,
    pub column_max: i64,
}

pub fn record_defaults(conn: &rusqlite::Connection) -> anyhow::Result<RecordDefaults> {
    let v = load_section(conn, SetupSection::Records)?;
    let info = RecordInfo {
        year: v
            .get("defaultYear")
            .and_then(|y| y.as_str())
            .unwrap_or(DEFAULT_YEAR)
            .to_string(),
        exam_max_grade: v
            .get("defaultExamMaxGrade")
            .and_then(|n| n.as_i64())
            .unwrap_or(DEFAULT_EXAM_MAX_GRADE),
        ..Default::default()
    };
    Ok(RecordDefaults {
        info,
        column_title: v
            .get("defaultColumnTitle")
            .and_then(|t| t.as_str())
            .unwrap_or(DEFAULT_COLUMN_TITLE)
            .to_string(),
        column_max: v
            .get("defaultColumnMax")
            .and_then(|n| n.as_i64())
            .unwrap_or(DEFAULT_COLUMN_MAX),
    })
}

fn handle_setup_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let reports = match load_section(conn, SetupSection::Reports) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let records = match load_section(conn, SetupSection::Records) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    ok(
        &req.id,
        json!({
            "reports": reports,
            "records": records
        }),
    )
}

fn handle_setup_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(section_raw) = req.params.get("section").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing section", None);
    };
    let Some(section) = SetupSection::parse(section_raw) else {
        return err(&req.id, "bad_params", "unknown section", None);
    };
    let Some(patch_obj) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "patch must be an object", None);
    };

    let mut current = match load_section(conn, section) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if let Err(msg) = merge_section_patch(section, &mut current, patch_obj) {
        return err(&req.id, "bad_params", msg, None);
    }
    if let Err(e) = db::settings_set_json(conn, section.key(), &current) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }
    tracing::info!(section = section.key(), "setup updated");
    ok(&req.id, json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "setup.get" => Some(handle_setup_get(state, req)),
        "setup.update" => Some(handle_setup_update(state, req)),
        _ => None,
    }
}
