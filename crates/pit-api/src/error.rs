//! Error type for every request issued against the school platform API.

use std::collections::BTreeMap;

use serde_json::Value;
use thiserror::Error;

/// Message shown when a failure carries nothing a person could act on.
pub const GENERIC_MESSAGE: &str = "Something went wrong. Please try again.";

/// Errors that can occur while talking to the platform API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The server rejected the request with a single human-readable reason.
    #[error("request rejected ({status}): {detail}")]
    Rejected { status: u16, detail: String },

    /// The server rejected one or more fields of the payload.
    #[error("validation failed ({status})")]
    Validation {
        status: u16,
        fields: BTreeMap<String, Vec<String>>,
    },

    /// The access token is missing, expired, or could not be refreshed.
    #[error("not authenticated")]
    Unauthorized,

    /// Non-success status with a body we could not make sense of.
    #[error("unexpected response status {status}")]
    Unstructured { status: u16 },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("invalid JSON: {0}")]
    Decode(#[from] serde_json::Error),

    /// Failure raised by a transport that is not HTTP-backed.
    #[error("transport error: {0}")]
    Transport(String),
}

impl ApiError {
    /// Build an error from a non-success response.
    ///
    /// Recognized bodies:
    /// - `{"detail": "..."}` or `{"error": "..."}`
    /// - a field map `{"field": ["msg", ...], ...}`
    /// - a bare list of messages `["msg", ...]`
    pub fn from_response(status: u16, body: &[u8]) -> Self {
        if status == 401 {
            return Self::Unauthorized;
        }

        let Ok(value) = serde_json::from_slice::<Value>(body) else {
            return Self::Unstructured { status };
        };

        match value {
            Value::Object(map) => {
                for key in ["detail", "error"] {
                    if let Some(Value::String(detail)) = map.get(key) {
                        return Self::Rejected {
                            status,
                            detail: detail.clone(),
                        };
                    }
                }

                let fields: BTreeMap<String, Vec<String>> = map
                    .into_iter()
                    .filter_map(|(field, v)| {
                        let messages = messages_of(&v);
                        (!messages.is_empty()).then_some((field, messages))
                    })
                    .collect();

                if fields.is_empty() {
                    Self::Unstructured { status }
                } else {
                    Self::Validation { status, fields }
                }
            }
            Value::Array(_) => {
                let messages = messages_of(&value);
                match messages.into_iter().next() {
                    Some(detail) => Self::Rejected { status, detail },
                    None => Self::Unstructured { status },
                }
            }
            Value::String(detail) if !detail.trim().is_empty() => {
                Self::Rejected { status, detail }
            }
            _ => Self::Unstructured { status },
        }
    }

    /// HTTP status of the failed response, when there was one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Rejected { status, .. }
            | Self::Validation { status, .. }
            | Self::Unstructured { status } => Some(*status),
            Self::Unauthorized => Some(401),
            Self::Network(e) => e.status().map(|s| s.as_u16()),
            Self::Decode(_) | Self::Transport(_) => None,
        }
    }

    /// Per-field messages of a validation failure.
    pub fn field_errors(&self) -> Option<&BTreeMap<String, Vec<String>>> {
        match self {
            Self::Validation { fields, .. } => Some(fields),
            _ => None,
        }
    }

    /// First message a person can act on, or [`GENERIC_MESSAGE`].
    ///
    /// For validation failures `non_field_errors` wins over field messages.
    pub fn user_message(&self) -> String {
        match self {
            Self::Rejected { detail, .. } if !detail.trim().is_empty() => detail.clone(),
            Self::Validation { fields, .. } => fields
                .get("non_field_errors")
                .and_then(|m| m.first())
                .or_else(|| fields.values().flatten().next())
                .cloned()
                .unwrap_or_else(|| GENERIC_MESSAGE.to_owned()),
            Self::Unauthorized => "Your session has expired. Please sign in again.".to_owned(),
            _ => GENERIC_MESSAGE.to_owned(),
        }
    }

    /// Check if retrying the same request could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Unstructured { status } | Self::Rejected { status, .. } => *status >= 500,
            Self::Validation { .. }
            | Self::Unauthorized
            | Self::Decode(_)
            | Self::Transport(_) => false,
        }
    }
}

fn messages_of(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => vec![s.clone()],
        Value::Array(items) => items.iter().flat_map(messages_of).collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detail_body_becomes_rejected() {
        let err = ApiError::from_response(403, br#"{"detail": "Not your plan."}"#);
        assert!(matches!(err, ApiError::Rejected { status: 403, .. }));
        assert_eq!(err.user_message(), "Not your plan.");
    }

    #[test]
    fn error_key_is_accepted_as_detail() {
        let err = ApiError::from_response(400, br#"{"error": "Plan already submitted"}"#);
        assert_eq!(err.user_message(), "Plan already submitted");
    }

    #[test]
    fn field_map_becomes_validation() {
        let err = ApiError::from_response(
            400,
            br#"{"description": ["This field may not be blank."], "order": []}"#,
        );
        let fields = err.field_errors().expect("validation error");
        assert_eq!(fields.len(), 1);
        assert_eq!(err.user_message(), "This field may not be blank.");
    }

    #[test]
    fn non_field_errors_take_priority() {
        let err = ApiError::from_response(
            400,
            br#"{"a_field": ["first"], "non_field_errors": ["global"]}"#,
        );
        assert_eq!(err.user_message(), "global");
    }

    #[test]
    fn list_body_uses_first_message() {
        let err = ApiError::from_response(400, br#"["one", "two"]"#);
        assert_eq!(err.user_message(), "one");
    }

    #[test]
    fn garbage_body_falls_back_to_generic_message() {
        let err = ApiError::from_response(502, b"<html>bad gateway</html>");
        assert!(matches!(err, ApiError::Unstructured { status: 502 }));
        assert_eq!(err.user_message(), GENERIC_MESSAGE);
        assert!(err.is_transient());

        let err = ApiError::from_response(400, br#"{"count": 3}"#);
        assert_eq!(err.user_message(), GENERIC_MESSAGE);
    }

    #[test]
    fn unauthorized_ignores_body() {
        let err = ApiError::from_response(401, br#"{"detail": "Token expired"}"#);
        assert!(matches!(err, ApiError::Unauthorized));
        assert_eq!(err.status(), Some(401));
        assert!(!err.is_transient());
    }

    #[test]
    fn client_errors_are_not_transient() {
        let err = ApiError::from_response(404, br#"{"detail": "Not found."}"#);
        assert!(!err.is_transient());
        assert!(!ApiError::Transport("boom".into()).is_transient());
    }
}
