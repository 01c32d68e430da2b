use std::fmt;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Message used when the server gave nothing structured to show.
pub const UNKNOWN_ERROR_MESSAGE: &str = "An unknown error occurred";

/// Maximum length for non-JSON response bodies kept in errors
const MAX_ERROR_BODY_LENGTH: usize = 500;

#[derive(Error, Debug)]
pub enum ApiError {
    /// The server answered with a non-success status. `payload` is the
    /// server's JSON body (field errors, `detail`, ...).
    #[error("{status}: {payload}")]
    Rejected {
        status: StatusCode,
        payload: ErrorPayload,
    },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The access token could not be refreshed. Stored credentials have
    /// already been purged.
    #[error("Session expired - please log in again")]
    SessionExpired,

    #[error("Session storage error: {0}")]
    Storage(String),
}

impl ApiError {
    /// Build an error from a failed response body.
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        ApiError::Rejected {
            status,
            payload: ErrorPayload::from_body(body),
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Rejected { status, .. } => Some(*status),
            ApiError::Network(e) => e.status(),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(StatusCode::UNAUTHORIZED)
    }

    /// Uniform error shape for the view layer: the server's payload, or
    /// `{"message": "An unknown error occurred"}` when there is none.
    pub fn payload(&self) -> ErrorPayload {
        match self {
            ApiError::Rejected { payload, .. } if !payload.is_empty() => payload.clone(),
            ApiError::SessionExpired => ErrorPayload::message(self.to_string()),
            _ => ErrorPayload::unknown(),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Storage(format!("{:#}", err))
    }
}

/// Structured error body returned by the API.
///
/// Either `{"detail": "..."}`, `{"message": "..."}` or field-level
/// validation messages such as `{"email": ["already taken"]}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrorPayload(Map<String, Value>);

impl ErrorPayload {
    pub fn unknown() -> Self {
        Self::message(UNKNOWN_ERROR_MESSAGE)
    }

    pub fn message(msg: impl Into<String>) -> Self {
        let mut map = Map::new();
        map.insert("message".to_string(), Value::String(msg.into()));
        Self(map)
    }

    /// Parse a response body. JSON objects are kept as-is, anything else is
    /// wrapped (truncated) under `detail`.
    pub fn from_body(body: &str) -> Self {
        match serde_json::from_str::<Value>(body) {
            Ok(Value::Object(map)) => Self(map),
            Ok(Value::Array(items)) => {
                let mut map = Map::new();
                map.insert("non_field_errors".to_string(), Value::Array(items));
                Self(map)
            }
            _ if body.trim().is_empty() => Self::default(),
            _ => {
                let mut map = Map::new();
                map.insert("detail".to_string(), Value::String(truncate_body(body)));
                Self(map)
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn detail(&self) -> Option<&str> {
        self.0.get("detail").and_then(Value::as_str)
    }

    pub fn get_message(&self) -> Option<&str> {
        self.0.get("message").and_then(Value::as_str)
    }

    /// Field-level messages, excluding `detail` and `message`.
    pub fn field_errors(&self) -> Vec<(String, Vec<String>)> {
        self.0
            .iter()
            .filter(|(k, _)| k.as_str() != "detail" && k.as_str() != "message")
            .map(|(field, value)| (field.clone(), messages_of(value)))
            .collect()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl fmt::Display for ErrorPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(detail) = self.detail() {
            return write!(f, "{}", detail);
        }
        if let Some(msg) = self.get_message() {
            return write!(f, "{}", msg);
        }
        let fields = self.field_errors();
        if fields.is_empty() {
            return write!(f, "{}", UNKNOWN_ERROR_MESSAGE);
        }
        let parts: Vec<String> = fields
            .iter()
            .map(|(field, msgs)| format!("{}: {}", field, msgs.join(", ")))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

fn messages_of(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) => vec![s.clone()],
        Value::Array(items) => items.iter().flat_map(messages_of).collect(),
        Value::Null => Vec::new(),
        other => vec![other.to_string()],
    }
}

/// Truncate a response body to avoid logging excessive data
fn truncate_body(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY_LENGTH {
        body.to_string()
    } else {
        let cut = (0..=MAX_ERROR_BODY_LENGTH)
            .rev()
            .find(|&i| body.is_char_boundary(i))
            .unwrap_or(0);
        format!("{}... (truncated, {} total bytes)", &body[..cut], body.len())
    }
}
