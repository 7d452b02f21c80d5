//! Uniform response envelope
//!
//! Every JSON endpoint answers with `{data, code, error}`. `code` is always a
//! string: `"0"` on success, a five digit application code otherwise.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::fmt;

/// Format used for every timestamp rendered in a payload
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Application-level outcome codes carried in the envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseCode {
    Ok,
    Internal,
    InvalidUsernamePassword,
    RequestIncorrectData,
    PermissionDenied,
    DuplicateUsername,
    InvalidToken,
}

impl ResponseCode {
    /// Wire representation of the code
    pub fn code(&self) -> &'static str {
        match self {
            ResponseCode::Ok => "0",
            ResponseCode::Internal => "10000",
            ResponseCode::InvalidUsernamePassword => "10001",
            ResponseCode::RequestIncorrectData => "10002",
            ResponseCode::PermissionDenied => "10003",
            ResponseCode::DuplicateUsername => "10004",
            ResponseCode::InvalidToken => "10005",
        }
    }

    /// Symbolic name of the code
    pub fn message(&self) -> &'static str {
        match self {
            ResponseCode::Ok => "ok",
            ResponseCode::Internal => "INTERNAL_ERROR",
            ResponseCode::InvalidUsernamePassword => "INVALID_USERNAME_PASSWORD",
            ResponseCode::RequestIncorrectData => "REQUEST_INCORRECT_DATA",
            ResponseCode::PermissionDenied => "PERMISSION_DENIED",
            ResponseCode::DuplicateUsername => "DUPLICATE_USERNAME",
            ResponseCode::InvalidToken => "INVALID_TOKEN",
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, ResponseCode::Ok)
    }
}

impl fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message(), self.code())
    }
}

impl Serialize for ResponseCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.code())
    }
}

/// The `{data, code, error}` wrapper
///
/// All three keys are always present; absent values serialize as `null`.
#[derive(Debug, Clone, Serialize)]
pub struct Envelope<T = Value> {
    pub data: Option<T>,
    pub code: ResponseCode,
    pub error: Option<Value>,
}

impl<T: Serialize> Envelope<T> {
    /// Successful envelope carrying `data`
    pub fn ok(data: T) -> Self {
        Self {
            data: Some(data),
            code: ResponseCode::Ok,
            error: None,
        }
    }
}

impl Envelope<Value> {
    /// Failed envelope with an error payload (a message or a field map)
    pub fn failure(code: ResponseCode, error: impl Into<Value>) -> Self {
        Self {
            data: None,
            code,
            error: Some(error.into()),
        }
    }
}

impl<T: Serialize> IntoResponse for Envelope<T> {
    fn into_response(self) -> Response {
        // Business outcomes travel in `code`; transport status stays 200.
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// Serde adapter for `DateTime<Utc>` fields in response views
pub mod datetime_format {
    use super::DATETIME_FORMAT;
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.format(DATETIME_FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&raw, DATETIME_FORMAT)
            .map(|naive| naive.and_utc())
            .map_err(serde::de::Error::custom)
    }
}
