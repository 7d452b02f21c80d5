//! Router assembly

use super::context::AppContext;
use super::middleware::{cors_layer, timeout_response};
use crate::core::response::Envelope;
use crate::users;
use axum::error_handling::HandleErrorLayer;
use axum::extract::State;
use axum::routing::get;
use axum::{BoxError, Router};
use serde_json::{Value, json};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

pub const SERVICE_NAME: &str = "stencil";

/// GET /health
pub async fn health(State(ctx): State<AppContext>) -> Envelope<Value> {
    Envelope::ok(json!({
        "status": "ok",
        "service": SERVICE_NAME,
        "backend": ctx.store.backend(),
    }))
}

/// Compose the application routes and the shared layers
///
/// Custom routers are merged as-is and must already carry their state.
pub fn build_router(ctx: AppContext, custom_routes: Vec<Router>) -> Router {
    let mut app = Router::new()
        .route("/health", get(health))
        .route("/api", get(users::handlers::index))
        .route("/api/", get(users::handlers::index))
        .nest("/api", users::routes(&ctx))
        .with_state(ctx.clone());

    for routes in custom_routes {
        app = app.merge(routes);
    }

    let server = &ctx.settings.server;
    let seconds = server.request_timeout;
    app = app
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(move |err: BoxError| async move {
                    timeout_response(err, seconds)
                }))
                .timeout(Duration::from_secs(seconds)),
        )
        .layer(TraceLayer::new_for_http());
    if server.enable_cors {
        app = app.layer(cors_layer(server));
    }
    app
}
