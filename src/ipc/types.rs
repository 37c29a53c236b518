use std::collections::HashMap;
use std::path::PathBuf;

use rusqlite::Connection;
use serde::Deserialize;

use crate::export::ExportJob;
use crate::model::GradebookState;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// `(teacherId, recordKey)`
pub type SessionKey = (String, String);

#[derive(Default)]
pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    /// Records currently open for editing. Each entry is independent.
    pub sessions: HashMap<SessionKey, GradebookState>,
    pub exports: HashMap<String, ExportJob>,
}
