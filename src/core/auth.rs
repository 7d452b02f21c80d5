//! Authorization primitives
//!
//! Requests are authenticated into an [`AuthContext`] by an [`AuthProvider`];
//! an [`AuthPolicy`] then evaluates the context into an [`AuthDecision`].
//! Denials carry a [`DenyReason`] instead of unwinding through the handler.

use crate::core::response::ResponseCode;
use async_trait::async_trait;
use axum::http::{HeaderMap, StatusCode};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which credential a bearer token represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Access => f.write_str("access"),
            TokenKind::Refresh => f.write_str("refresh"),
        }
    }
}

/// Who is calling
#[derive(Debug, Clone, PartialEq)]
pub enum AuthContext {
    /// Caller presented a valid token
    User {
        user_id: i64,
        username: String,
        roles: Vec<String>,
        token_id: String,
        /// Login session the token belongs to
        session_id: String,
        token_kind: TokenKind,
        expires_at: i64,
    },

    /// No credentials presented
    Anonymous,
}

impl AuthContext {
    pub fn user_id(&self) -> Option<i64> {
        match self {
            AuthContext::User { user_id, .. } => Some(*user_id),
            AuthContext::Anonymous => None,
        }
    }

    pub fn username(&self) -> Option<&str> {
        match self {
            AuthContext::User { username, .. } => Some(username),
            AuthContext::Anonymous => None,
        }
    }

    pub fn roles(&self) -> &[String] {
        match self {
            AuthContext::User { roles, .. } => roles,
            AuthContext::Anonymous => &[],
        }
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles().iter().any(|r| r == role)
    }

    pub fn session_id(&self) -> Option<&str> {
        match self {
            AuthContext::User { session_id, .. } => Some(session_id),
            AuthContext::Anonymous => None,
        }
    }

    pub fn token_kind(&self) -> Option<TokenKind> {
        match self {
            AuthContext::User { token_kind, .. } => Some(*token_kind),
            AuthContext::Anonymous => None,
        }
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self, AuthContext::Anonymous)
    }
}

/// Why a request was refused
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenyReason {
    MissingCredentials,
    InvalidToken(String),
    Revoked,
    WrongTokenKind { expected: TokenKind },
    InsufficientRole { required: Vec<String> },
    PolicyRejected,
}

impl DenyReason {
    /// 401 for credential problems, 403 once the caller is known
    pub fn status_code(&self) -> StatusCode {
        match self {
            DenyReason::MissingCredentials
            | DenyReason::InvalidToken(_)
            | DenyReason::Revoked
            | DenyReason::WrongTokenKind { .. } => StatusCode::UNAUTHORIZED,
            DenyReason::InsufficientRole { .. } | DenyReason::PolicyRejected => {
                StatusCode::FORBIDDEN
            }
        }
    }

    pub fn response_code(&self) -> ResponseCode {
        if self.status_code() == StatusCode::FORBIDDEN {
            ResponseCode::PermissionDenied
        } else {
            ResponseCode::InvalidToken
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenyReason::MissingCredentials => write!(f, "Missing bearer token"),
            DenyReason::InvalidToken(message) => write!(f, "Invalid token: {}", message),
            DenyReason::Revoked => write!(f, "Token has been revoked"),
            DenyReason::WrongTokenKind { expected } => {
                write!(f, "Expected a {} token", expected)
            }
            DenyReason::InsufficientRole { required } => {
                write!(f, "PERMISSION_DENIED: requires one of [{}]", required.join(", "))
            }
            DenyReason::PolicyRejected => write!(f, "PERMISSION_DENIED"),
        }
    }
}

impl std::error::Error for DenyReason {}

/// Outcome of evaluating a policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthDecision {
    Allowed,
    Denied(DenyReason),
}

impl AuthDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, AuthDecision::Allowed)
    }
}

/// Authorization policy for a route group
#[derive(Debug, Clone)]
pub enum AuthPolicy {
    /// No credentials needed
    Public,

    /// A valid access token
    Authenticated,

    /// A valid refresh token
    Refresh,

    /// An access token whose user holds one of these roles
    HasRole(Vec<String>),

    /// Every policy must allow
    And(Vec<AuthPolicy>),

    /// At least one policy must allow
    Or(Vec<AuthPolicy>),

    Custom(fn(&AuthContext) -> bool),
}

impl AuthPolicy {
    pub fn check(&self, context: &AuthContext) -> bool {
        self.evaluate(context).is_allowed()
    }

    pub fn evaluate(&self, context: &AuthContext) -> AuthDecision {
        match self {
            AuthPolicy::Public => AuthDecision::Allowed,

            AuthPolicy::Authenticated => require_kind(context, TokenKind::Access),

            AuthPolicy::Refresh => require_kind(context, TokenKind::Refresh),

            AuthPolicy::HasRole(required) => match require_kind(context, TokenKind::Access) {
                AuthDecision::Allowed if required.iter().any(|r| context.has_role(r)) => {
                    AuthDecision::Allowed
                }
                AuthDecision::Allowed => AuthDecision::Denied(DenyReason::InsufficientRole {
                    required: required.clone(),
                }),
                denied => denied,
            },

            AuthPolicy::And(policies) => policies
                .iter()
                .map(|p| p.evaluate(context))
                .find(|d| !d.is_allowed())
                .unwrap_or(AuthDecision::Allowed),

            AuthPolicy::Or(policies) => {
                let mut last = AuthDecision::Denied(DenyReason::PolicyRejected);
                for policy in policies {
                    match policy.evaluate(context) {
                        AuthDecision::Allowed => return AuthDecision::Allowed,
                        denied => last = denied,
                    }
                }
                last
            }

            AuthPolicy::Custom(f) => {
                if f(context) {
                    AuthDecision::Allowed
                } else {
                    AuthDecision::Denied(DenyReason::PolicyRejected)
                }
            }
        }
    }
}

fn require_kind(context: &AuthContext, expected: TokenKind) -> AuthDecision {
    match context.token_kind() {
        None => AuthDecision::Denied(DenyReason::MissingCredentials),
        Some(kind) if kind == expected => AuthDecision::Allowed,
        Some(_) => AuthDecision::Denied(DenyReason::WrongTokenKind { expected }),
    }
}

/// Turns request headers into an [`AuthContext`]
///
/// Absent credentials yield `Ok(AuthContext::Anonymous)`; presented but
/// unusable credentials yield a [`DenyReason`].
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn authenticate(&self, headers: &HeaderMap) -> Result<AuthContext, DenyReason>;
}

/// Provider that never authenticates anyone
pub struct NoAuthProvider;

#[async_trait]
impl AuthProvider for NoAuthProvider {
    async fn authenticate(&self, _headers: &HeaderMap) -> Result<AuthContext, DenyReason> {
        Ok(AuthContext::Anonymous)
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header
pub fn bearer_token(headers: &HeaderMap) -> Result<Option<&str>, DenyReason> {
    let Some(value) = headers.get(axum::http::header::AUTHORIZATION) else {
        return Ok(None);
    };
    let value = value
        .to_str()
        .map_err(|_| DenyReason::InvalidToken("authorization header is not ASCII".into()))?;
    match value.split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() => {
            Ok(Some(token.trim()))
        }
        _ => Err(DenyReason::InvalidToken(
            "expected 'Bearer <token>' authorization".into(),
        )),
    }
}
