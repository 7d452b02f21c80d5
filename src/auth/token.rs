//! JWT issuing and decoding
//!
//! Access and refresh tokens are HS256 JWTs signed with the application
//! secret. Both carry a `type` claim so one cannot stand in for the other,
//! and a `jti` used by the logout blocklist. Tokens issued by one login
//! share a session id (`sid`), so logout can end the whole session.

use crate::core::auth::{AuthContext, TokenKind};
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("{0}")]
    Invalid(String),

    #[error("expected a {expected} token, got {found}")]
    WrongKind { expected: TokenKind, found: TokenKind },

    #[error("failed to sign token: {0}")]
    Encode(String),
}

/// JWT claims structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user id)
    pub sub: String,
    pub username: String,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(rename = "type")]
    pub kind: TokenKind,
    pub jti: String,
    /// Login session shared by an access/refresh pair
    pub sid: String,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn user_id(&self) -> Result<i64, TokenError> {
        self.sub
            .parse()
            .map_err(|_| TokenError::Invalid(format!("subject '{}' is not a user id", self.sub)))
    }

    pub fn into_context(self) -> Result<AuthContext, TokenError> {
        Ok(AuthContext::User {
            user_id: self.user_id()?,
            username: self.username,
            roles: self.roles,
            token_id: self.jti,
            session_id: self.sid,
            token_kind: self.kind,
            expires_at: self.exp,
        })
    }
}

/// A freshly issued token and its identity
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub jti: String,
    pub expires_at: i64,
}

/// Access and refresh token issued together at login
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub session_id: String,
    pub access: IssuedToken,
    pub refresh: IssuedToken,
}

/// Signs and verifies tokens with one shared secret
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    pub fn new(secret: &str, access_ttl: Duration, refresh_ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            access_ttl,
            refresh_ttl,
        }
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    /// Start a login session: one access and one refresh token sharing a `sid`
    pub fn issue_pair(&self, user_id: i64, username: &str, roles: &[String]) -> Result<TokenPair, TokenError> {
        let session_id = Uuid::new_v4().to_string();
        Ok(TokenPair {
            access: self.issue_access(&session_id, user_id, username, roles)?,
            refresh: self.issue(TokenKind::Refresh, self.refresh_ttl, &session_id, user_id, username, roles)?,
            session_id,
        })
    }

    /// New access token within an existing session
    pub fn issue_access(
        &self,
        session_id: &str,
        user_id: i64,
        username: &str,
        roles: &[String],
    ) -> Result<IssuedToken, TokenError> {
        self.issue(TokenKind::Access, self.access_ttl, session_id, user_id, username, roles)
    }

    fn issue(
        &self,
        kind: TokenKind,
        ttl: Duration,
        session_id: &str,
        user_id: i64,
        username: &str,
        roles: &[String],
    ) -> Result<IssuedToken, TokenError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            username: username.to_string(),
            roles: roles.to_vec(),
            kind,
            jti: Uuid::new_v4().to_string(),
            sid: session_id.to_string(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| TokenError::Encode(e.to_string()))?;
        Ok(IssuedToken {
            token,
            jti: claims.jti,
            expires_at: claims.exp,
        })
    }

    /// Verify signature and expiry, then check the token kind
    pub fn decode(&self, token: &str, expected: TokenKind) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let claims = decode::<Claims>(token, &self.decoding, &validation)
            .map_err(|e| TokenError::Invalid(e.to_string()))?
            .claims;
        if claims.kind != expected {
            return Err(TokenError::WrongKind {
                expected,
                found: claims.kind,
            });
        }
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> TokenService {
        TokenService::new("test-secret", Duration::minutes(15), Duration::days(30))
    }

    #[test]
    fn test_access_token_round_trip() {
        let service = service();
        let issued = service.issue_access("s1", 7, "ann", &["admin".to_string()]).unwrap();
        let claims = service.decode(&issued.token, TokenKind::Access).unwrap();
        assert_eq!(claims.user_id().unwrap(), 7);
        assert_eq!(claims.jti, issued.jti);
        assert_eq!(claims.roles, vec!["admin"]);
    }

    #[test]
    fn test_kinds_are_not_interchangeable() {
        let service = service();
        let pair = service.issue_pair(1, "ann", &[]).unwrap();
        assert!(matches!(
            service.decode(&pair.refresh.token, TokenKind::Access),
            Err(TokenError::WrongKind { expected: TokenKind::Access, .. })
        ));
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let service = TokenService::new("s", Duration::seconds(-5), Duration::days(1));
        let issued = service.issue_access("s1", 1, "ann", &[]).unwrap();
        assert!(matches!(
            service.decode(&issued.token, TokenKind::Access),
            Err(TokenError::Invalid(_))
        ));
    }

    #[test]
    fn test_foreign_signature_is_rejected() {
        let issued = TokenService::new("other", Duration::minutes(1), Duration::days(1))
            .issue_access("s1", 1, "ann", &[])
            .unwrap();
        assert!(service().decode(&issued.token, TokenKind::Access).is_err());
    }

    #[test]
    fn test_pair_shares_session() {
        let service = service();
        let pair = service.issue_pair(1, "ann", &[]).unwrap();
        let access = service.decode(&pair.access.token, TokenKind::Access).unwrap();
        let refresh = service.decode(&pair.refresh.token, TokenKind::Refresh).unwrap();
        assert_eq!(access.sid, pair.session_id);
        assert_eq!(refresh.sid, pair.session_id);
        assert_ne!(access.jti, refresh.jti);
    }

    #[test]
    fn test_claims_into_context() {
        let service = service();
        let issued = service.issue_access("s1", 3, "bob", &[]).unwrap();
        let context = service
            .decode(&issued.token, TokenKind::Access)
            .unwrap()
            .into_context()
            .unwrap();
        assert_eq!(context.user_id(), Some(3));
        assert_eq!(context.username(), Some("bob"));
    }
}
