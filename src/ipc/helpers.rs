use crate::config::GradingConfig;
use crate::db;
use crate::error::EngineError;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use rusqlite::Connection;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<Value>,
}

impl HandlerErr {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn bad_params(message: impl Into<String>) -> Self {
        Self::new("bad_params", message)
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn response(self, id: &str) -> Value {
        err(id, self.code, self.message, self.details)
    }
}

impl From<EngineError> for HandlerErr {
    fn from(e: EngineError) -> Self {
        Self {
            code: e.code(),
            message: e.to_string(),
            details: e.details(),
        }
    }
}

/// Wraps a handler outcome in the response envelope.
pub fn respond(req: &Request, result: Result<Value, HandlerErr>) -> Value {
    match result {
        Ok(v) => ok(&req.id, v),
        Err(e) => {
            tracing::warn!(method = %req.method, code = e.code, message = %e.message, "request rejected");
            e.response(&req.id)
        }
    }
}

pub fn require_db(state: &AppState) -> Result<&Connection, HandlerErr> {
    state
        .db
        .as_ref()
        .ok_or_else(|| HandlerErr::new("no_workspace", "select a workspace first"))
}

pub fn db_query(e: anyhow::Error) -> HandlerErr {
    HandlerErr::new("db_query_failed", format!("{e:#}"))
}

pub fn db_update(e: anyhow::Error) -> HandlerErr {
    HandlerErr::new("db_update_failed", format!("{e:#}"))
}

/// Grading config for the open workspace, or the defaults when none is open.
pub fn load_grading_config(state: &AppState) -> Result<GradingConfig, HandlerErr> {
    let Some(conn) = state.db.as_ref() else {
        return Ok(GradingConfig::default());
    };
    let saved = db::settings_get_json(conn, GradingConfig::SETTINGS_KEY).map_err(db_query)?;
    Ok(GradingConfig::from_saved(saved.as_ref()))
}

pub fn get_str<'a>(params: &'a Value, key: &str) -> Result<&'a str, HandlerErr> {
    let s = params
        .get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing params.{}", key)))?
        .trim();
    if s.is_empty() {
        return Err(HandlerErr::bad_params(format!("{} must not be empty", key)));
    }
    Ok(s)
}

pub fn get_opt_str<'a>(params: &'a Value, key: &str) -> Result<Option<&'a str>, HandlerErr> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_str()
            .map(Some)
            .ok_or_else(|| HandlerErr::bad_params(format!("{} must be string or null", key))),
    }
}

pub fn get_f64(params: &Value, key: &str) -> Result<f64, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_f64())
        .ok_or_else(|| HandlerErr::bad_params(format!("{} must be a number", key)))
}

pub fn get_bool_or(params: &Value, key: &str, default: bool) -> Result<bool, HandlerErr> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(default),
        Some(v) => v
            .as_bool()
            .ok_or_else(|| HandlerErr::bad_params(format!("{} must be boolean", key))),
    }
}

/// Days travel as small integers; anything that does not fit a `u8` is
/// passed on as 0 so the grid rejects it as a coordinate.
pub fn get_day(params: &Value) -> Result<u8, HandlerErr> {
    let n = params
        .get("day")
        .and_then(|v| v.as_i64())
        .ok_or_else(|| HandlerErr::bad_params("day must be integer"))?;
    Ok(u8::try_from(n).unwrap_or(0))
}

pub fn get_opt_usize(params: &Value, key: &str, min: usize, max: usize) -> Result<Option<usize>, HandlerErr> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => {
            let n = v
                .as_u64()
                .ok_or_else(|| HandlerErr::bad_params(format!("{} must be integer", key)))?;
            let n = n as usize;
            if !(min..=max).contains(&n) {
                return Err(HandlerErr::bad_params(format!(
                    "{} must be in {}..={}",
                    key, min, max
                )));
            }
            Ok(Some(n))
        }
    }
}

/// Deserializes `params[key]` into a typed value, reporting shape errors as
/// `bad_params`.
pub fn get_typed<T: DeserializeOwned>(params: &Value, key: &str) -> Result<T, HandlerErr> {
    let raw = params
        .get(key)
        .cloned()
        .ok_or_else(|| HandlerErr::bad_params(format!("missing params.{}", key)))?;
    serde_json::from_value(raw).map_err(|e| {
        HandlerErr::bad_params(format!("params.{} is malformed: {}", key, e))
            .with_details(json!({ "field": key }))
    })
}

pub fn get_list<T: DeserializeOwned>(
    params: &Value,
    key: &str,
    max_len: usize,
) -> Result<Vec<T>, HandlerErr> {
    let len = params
        .get(key)
        .and_then(|v| v.as_array())
        .map(|a| a.len())
        .ok_or_else(|| HandlerErr::bad_params(format!("{} must be an array", key)))?;
    if len > max_len {
        return Err(HandlerErr::bad_params(format!(
            "{} must have at most {} entries",
            key, max_len
        ))
        .with_details(json!({ "len": len })));
    }
    get_typed(params, key)
}
