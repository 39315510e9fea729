//! One async function per API endpoint.
//!
//! Write payloads are partial: every `Option` field left as `None` is
//! omitted from the JSON body.

pub mod checklists;
pub mod plans;
pub mod tasks;
pub mod users;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::ApiError;

/// Decode a list endpoint that may answer with a bare array or a paginated
/// `{"results": [...]}` envelope.
pub(crate) fn results<T: DeserializeOwned>(value: Value) -> Result<Vec<T>, ApiError> {
    match value {
        Value::Object(mut map) => match map.remove("results") {
            Some(results) => Ok(serde_json::from_value(results)?),
            None => Err(ApiError::Transport(
                "list response has neither an array nor a `results` field".to_owned(),
            )),
        },
        Value::Null => Ok(Vec::new()),
        other => Ok(serde_json::from_value(other)?),
    }
}

/// Append `key=value` pairs for the present values of a filter.
pub(crate) fn with_query(path: &str, params: &[(&str, Option<String>)]) -> String {
    let query: Vec<String> = params
        .iter()
        .filter_map(|(k, v)| v.as_ref().map(|v| format!("{k}={v}")))
        .collect();
    if query.is_empty() {
        path.to_owned()
    } else {
        format!("{path}?{}", query.join("&"))
    }
}
