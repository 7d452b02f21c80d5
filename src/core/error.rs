//! Typed error handling for stencil
//!
//! Every failure a handler can hit is a [`StencilError`]. Each category knows
//! its HTTP status and its [`ResponseCode`], and renders itself as the usual
//! `{data, code, error}` envelope.
//!
//! # Error Categories
//!
//! - [`FormErrors`]: field-level input validation failures
//! - [`BusinessError`]: expected domain outcomes (duplicate username, bad login)
//! - [`DenyReason`]: authentication and authorization refusals
//! - [`StoreError`]: storage backend failures
//! - [`ConfigError`]: configuration parsing and validation
//! - [`RequestError`]: malformed HTTP requests
//!
//! # Example
//!
//! ```rust,ignore
//! async fn register(...) -> ApiResult<Envelope<UserView>> {
//!     if exists {
//!         return Err(BusinessError::DuplicateUsername { username }.into());
//!     }
//!     ...
//! }
//! ```

use crate::auth::{HashError, TokenError};
use crate::core::auth::DenyReason;
use crate::core::response::{Envelope, ResponseCode};
use crate::core::store::StoreError;
use crate::core::validation::FormErrors;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::Value;
use std::fmt;

/// The main error type of the application
#[derive(Debug)]
pub enum StencilError {
    /// Input did not pass the form's validators
    Validation(FormErrors),

    /// Expected business outcome reported to the client
    Business(BusinessError),

    /// Authentication or authorization refusal
    Auth(DenyReason),

    /// Storage backend errors
    Storage(StoreError),

    /// Configuration errors
    Config(ConfigError),

    /// HTTP/Request errors
    Request(RequestError),

    /// Anything else; details are logged, never sent to the client
    Internal(String),
}

impl fmt::Display for StencilError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StencilError::Validation(e) => write!(f, "{}", e),
            StencilError::Business(e) => write!(f, "{}", e),
            StencilError::Auth(e) => write!(f, "{}", e),
            StencilError::Storage(e) => write!(f, "Storage error: {}", e),
            StencilError::Config(e) => write!(f, "{}", e),
            StencilError::Request(e) => write!(f, "{}", e),
            StencilError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for StencilError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StencilError::Validation(e) => Some(e),
            StencilError::Business(e) => Some(e),
            StencilError::Auth(e) => Some(e),
            StencilError::Storage(e) => Some(e),
            StencilError::Config(e) => Some(e),
            StencilError::Request(e) => Some(e),
            StencilError::Internal(_) => None,
        }
    }
}

impl StencilError {
    /// HTTP status of the response
    ///
    /// Validation and business failures are ordinary answers and keep 200;
    /// the envelope `code` carries the outcome.
    pub fn status_code(&self) -> StatusCode {
        match self {
            StencilError::Validation(_) | StencilError::Business(_) => StatusCode::OK,
            StencilError::Auth(reason) => reason.status_code(),
            StencilError::Request(e) => e.status_code(),
            StencilError::Storage(_) | StencilError::Config(_) | StencilError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Application code placed in the envelope
    pub fn response_code(&self) -> ResponseCode {
        match self {
            StencilError::Validation(_) => ResponseCode::RequestIncorrectData,
            StencilError::Request(e) => e.response_code(),
            StencilError::Business(e) => e.response_code(),
            StencilError::Auth(reason) => reason.response_code(),
            StencilError::Storage(_) | StencilError::Config(_) | StencilError::Internal(_) => {
                ResponseCode::Internal
            }
        }
    }

    /// Value of the envelope's `error` key
    pub fn payload(&self) -> Value {
        match self {
            StencilError::Validation(errors) => {
                serde_json::to_value(errors).unwrap_or_else(|_| Value::String(errors.describe()))
            }
            StencilError::Storage(_) | StencilError::Config(_) | StencilError::Internal(_) => {
                Value::String(ResponseCode::Internal.message().to_string())
            }
            other => Value::String(other.to_string()),
        }
    }

    /// Convert to the response envelope
    pub fn to_envelope(&self) -> Envelope {
        Envelope::failure(self.response_code(), self.payload())
    }

    fn is_server_fault(&self) -> bool {
        self.status_code().is_server_error()
    }
}

impl IntoResponse for StencilError {
    fn into_response(self) -> Response {
        if self.is_server_fault() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, code = self.response_code().code(), "request rejected");
        }
        (self.status_code(), Json(self.to_envelope())).into_response()
    }
}

// =============================================================================
// Business Errors
// =============================================================================

/// Expected outcomes of user-facing operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusinessError {
    DuplicateUsername { username: String },
    InvalidCredentials,
}

impl fmt::Display for BusinessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BusinessError::DuplicateUsername { username } => write!(
                f,
                "DUPLICATE_USERNAME: username '{}' is already registered",
                username
            ),
            BusinessError::InvalidCredentials => write!(f, "username or password invalid."),
        }
    }
}

impl std::error::Error for BusinessError {}

impl BusinessError {
    pub fn response_code(&self) -> ResponseCode {
        match self {
            BusinessError::DuplicateUsername { .. } => ResponseCode::DuplicateUsername,
            BusinessError::InvalidCredentials => ResponseCode::InvalidUsernamePassword,
        }
    }
}

impl From<BusinessError> for StencilError {
    fn from(err: BusinessError) -> Self {
        StencilError::Business(err)
    }
}

// =============================================================================
// Config Errors
// =============================================================================

/// Errors related to configuration
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to parse configuration file
    ParseError {
        file: Option<String>,
        message: String,
    },

    /// Missing required setting
    MissingField { field: String, context: String },

    /// Invalid value in configuration
    InvalidValue {
        field: String,
        value: String,
        message: String,
    },

    /// Configuration file not found
    FileNotFound { path: String },

    /// IO error while reading configuration
    IoError { message: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ParseError { file, message } => {
                if let Some(file) = file {
                    write!(f, "Failed to parse config file '{}': {}", file, message)
                } else {
                    write!(f, "Failed to parse config: {}", message)
                }
            }
            ConfigError::MissingField { field, context } => {
                write!(f, "Missing required setting '{}' in {}", field, context)
            }
            ConfigError::InvalidValue {
                field,
                value,
                message,
            } => {
                write!(f, "Invalid value '{}' for '{}': {}", value, field, message)
            }
            ConfigError::FileNotFound { path } => {
                write!(f, "Configuration file not found: {}", path)
            }
            ConfigError::IoError { message } => {
                write!(f, "IO error: {}", message)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for StencilError {
    fn from(err: ConfigError) -> Self {
        StencilError::Config(err)
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigError::ParseError {
            file: None,
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::IoError {
            message: err.to_string(),
        }
    }
}

// =============================================================================
// Request Errors
// =============================================================================

/// Errors related to HTTP requests
#[derive(Debug)]
pub enum RequestError {
    /// Body is not valid JSON
    InvalidJson { message: String },

    /// Body is JSON but not an object
    InvalidBody { message: String },

    /// Query string could not be decoded
    InvalidQuery { message: String },

    /// Handler did not answer within the configured request timeout
    Timeout { seconds: u64 },
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestError::InvalidJson { message } => write!(f, "Invalid JSON: {}", message),
            RequestError::InvalidBody { message } => {
                write!(f, "Invalid request body: {}", message)
            }
            RequestError::InvalidQuery { message } => {
                write!(f, "Invalid query string: {}", message)
            }
            RequestError::Timeout { seconds } => {
                write!(f, "Request timed out after {}s", seconds)
            }
        }
    }
}

impl std::error::Error for RequestError {}

impl RequestError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            RequestError::Timeout { .. } => StatusCode::REQUEST_TIMEOUT,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    pub fn response_code(&self) -> ResponseCode {
        match self {
            RequestError::Timeout { .. } => ResponseCode::Internal,
            _ => ResponseCode::RequestIncorrectData,
        }
    }
}

impl From<RequestError> for StencilError {
    fn from(err: RequestError) -> Self {
        StencilError::Request(err)
    }
}

// =============================================================================
// Conversions
// =============================================================================

impl From<FormErrors> for StencilError {
    fn from(err: FormErrors) -> Self {
        StencilError::Validation(err)
    }
}

impl From<DenyReason> for StencilError {
    fn from(err: DenyReason) -> Self {
        StencilError::Auth(err)
    }
}

impl From<StoreError> for StencilError {
    fn from(err: StoreError) -> Self {
        StencilError::Storage(err)
    }
}

impl From<TokenError> for StencilError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Invalid(message) => StencilError::Auth(DenyReason::InvalidToken(message)),
            TokenError::WrongKind { expected, .. } => {
                StencilError::Auth(DenyReason::WrongTokenKind { expected })
            }
            TokenError::Encode(message) => StencilError::Internal(message),
        }
    }
}

impl From<HashError> for StencilError {
    fn from(err: HashError) -> Self {
        StencilError::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for StencilError {
    fn from(err: serde_json::Error) -> Self {
        StencilError::Internal(err.to_string())
    }
}

impl From<anyhow::Error> for StencilError {
    fn from(err: anyhow::Error) -> Self {
        StencilError::Internal(format!("{:#}", err))
    }
}

// =============================================================================
// Result type alias
// =============================================================================

/// Result of a handler or service operation
pub type ApiResult<T> = Result<T, StencilError>;
