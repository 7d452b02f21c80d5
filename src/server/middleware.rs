//! Request middleware: route guards, CORS and timeouts

use crate::config::ServerSettings;
use crate::core::auth::{AuthDecision, AuthPolicy, AuthProvider};
use crate::core::error::{RequestError, StencilError};
use axum::BoxError;
use axum::extract::{Request, State};
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::sync::Arc;
use tower::timeout::error::Elapsed;
use tower_http::cors::{Any, CorsLayer};

/// Authenticates a request and checks it against one policy
///
/// Mount with [`require`]:
///
/// ```rust,ignore
/// Router::new()
///     .route("/logout", post(logout))
///     .route_layer(middleware::from_fn_with_state(
///         AuthGuard::shared(ctx.auth.clone(), AuthPolicy::Authenticated),
///         require,
///     ))
/// ```
pub struct AuthGuard {
    provider: Arc<dyn AuthProvider>,
    policy: AuthPolicy,
}

impl AuthGuard {
    pub fn new(provider: Arc<dyn AuthProvider>, policy: AuthPolicy) -> Self {
        Self { provider, policy }
    }

    pub fn shared(provider: Arc<dyn AuthProvider>, policy: AuthPolicy) -> Arc<Self> {
        Arc::new(Self::new(provider, policy))
    }
}

/// Guard middleware; the accepted [`AuthContext`](crate::core::auth::AuthContext)
/// is stored as a request extension
pub async fn require(
    State(guard): State<Arc<AuthGuard>>,
    mut request: Request,
    next: Next,
) -> Result<Response, StencilError> {
    let context = guard.provider.authenticate(request.headers()).await?;

    if let AuthDecision::Denied(reason) = guard.policy.evaluate(&context) {
        tracing::debug!(
            path = %request.uri().path(),
            user = ?context.username(),
            %reason,
            "request denied"
        );
        return Err(reason.into());
    }

    request.extensions_mut().insert(context);
    Ok(next.run(request).await)
}

/// CORS for the configured origins; an empty list allows any origin
pub fn cors_layer(settings: &ServerSettings) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if settings.cors_origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = settings
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "ignoring unusable CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(origins)
}

/// Turn a failure of the timeout layer into an envelope
///
/// Mounted through `HandleErrorLayer` in front of `tower::timeout`.
pub fn timeout_response(err: BoxError, seconds: u64) -> Response {
    if err.is::<Elapsed>() {
        StencilError::from(RequestError::Timeout { seconds }).into_response()
    } else {
        StencilError::Internal(err.to_string()).into_response()
    }
}
