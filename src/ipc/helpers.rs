use rusqlite::Connection;

use crate::ipc::error::err;
use crate::ipc::types::AppState;
use crate::roster::RosterId;

pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl HandlerErr {
    pub fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }

    pub fn bad_params(message: impl Into<String>) -> HandlerErr {
        HandlerErr {
            code: "bad_params",
            message: message.into(),
            details: None,
        }
    }
}

pub fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

/// Deltas arrive as JSON numbers or numeric strings (the student client
/// posts form fields); anything else is a validation failure.
pub fn get_required_int(params: &serde_json::Value, key: &str) -> Result<i64, HandlerErr> {
    match params.get(key) {
        Some(v) if v.is_i64() => Ok(v.as_i64().unwrap_or(0)),
        Some(v) => v
            .as_str()
            .and_then(|s| s.trim().parse::<i64>().ok())
            .ok_or_else(|| HandlerErr::bad_params("Invalid delta values.")),
        None => Err(HandlerErr::bad_params(format!("missing {}", key))),
    }
}

pub fn require_db(state: &AppState) -> Result<&Connection, HandlerErr> {
    state.db.as_ref().ok_or(HandlerErr {
        code: "no_workspace",
        message: "no workspace selected".to_string(),
        details: None,
    })
}

/// Resolve `params.roster` against the registry into a typed handle. This
/// happens once at the top of every roster-scoped handler; resolution
/// failure means no query is ever built.
pub fn resolve_roster(state: &AppState, params: &serde_json::Value) -> Result<RosterId, HandlerErr> {
    let name = get_required_str(params, "roster")?;
    let registry = state.rosters.as_ref().ok_or(HandlerErr {
        code: "no_workspace",
        message: "no workspace selected".to_string(),
        details: None,
    })?;
    registry.resolve(&name).map_err(|e| HandlerErr {
        code: e.code(),
        message: e.message(),
        details: None,
    })
}
