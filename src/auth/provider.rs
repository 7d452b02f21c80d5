//! Bearer-token authentication

use super::blocklist::TokenBlocklist;
use super::token::{TokenError, TokenService};
use crate::core::auth::{AuthContext, AuthProvider, DenyReason, TokenKind, bearer_token};
use async_trait::async_trait;
use axum::http::HeaderMap;
use std::sync::Arc;

/// Authenticates `Authorization: Bearer <jwt>` headers
///
/// Access and refresh tokens are both accepted here; route policies decide
/// which kind a route wants.
#[derive(Clone)]
pub struct JwtAuthProvider {
    tokens: Arc<TokenService>,
    blocklist: Arc<dyn TokenBlocklist>,
}

impl JwtAuthProvider {
    pub fn new(tokens: Arc<TokenService>, blocklist: Arc<dyn TokenBlocklist>) -> Self {
        Self { tokens, blocklist }
    }
}

#[async_trait]
impl AuthProvider for JwtAuthProvider {
    async fn authenticate(&self, headers: &HeaderMap) -> Result<AuthContext, DenyReason> {
        let Some(token) = bearer_token(headers)? else {
            return Ok(AuthContext::Anonymous);
        };

        let claims = match self.tokens.decode(token, TokenKind::Access) {
            Ok(claims) => claims,
            Err(TokenError::WrongKind { .. }) => self
                .tokens
                .decode(token, TokenKind::Refresh)
                .map_err(|e| DenyReason::InvalidToken(e.to_string()))?,
            Err(e) => return Err(DenyReason::InvalidToken(e.to_string())),
        };

        // A token dies with its own jti or with its whole login session.
        let mut revoked = false;
        for id in [&claims.jti, &claims.sid] {
            revoked |= self.blocklist.is_revoked(id).await.map_err(|e| {
                tracing::error!(error = %e, "blocklist lookup failed");
                DenyReason::InvalidToken("token state unavailable".into())
            })?;
        }
        if revoked {
            return Err(DenyReason::Revoked);
        }

        claims
            .into_context()
            .map_err(|e| DenyReason::InvalidToken(e.to_string()))
    }
}
