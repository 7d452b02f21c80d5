//! User accounts: registration, login, logout and token refresh

pub mod forms;
pub mod handlers;
pub mod models;
pub mod schemas;
pub mod service;

pub use forms::{ListUsersQuery, LoginForm, RegisterForm};
pub use models::{Role, RoleMembership, User};
pub use schemas::{AccessTokenView, LoginView, RoleView, UserView};

use crate::core::auth::AuthPolicy;
use crate::server::AppContext;
use crate::server::middleware::{AuthGuard, require};
use axum::Router;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};

/// Routes mounted under `/api`
///
/// - `POST /user/register`
/// - `POST /user/login`, `GET /user/login` (access token)
/// - `POST /user/logout` (access token)
/// - `POST /user/refresh` (refresh token)
/// - `GET  /users` (role `admin`)
pub fn routes(ctx: &AppContext) -> Router<AppContext> {
    let guard = |policy: AuthPolicy| AuthGuard::shared(ctx.auth.clone(), policy);

    Router::new()
        .route("/user/register", post(handlers::register))
        .route(
            "/user/login",
            get(handlers::current_user)
                .route_layer(from_fn_with_state(guard(AuthPolicy::Authenticated), require))
                .post(handlers::login),
        )
        .route(
            "/user/logout",
            post(handlers::logout)
                .route_layer(from_fn_with_state(guard(AuthPolicy::Authenticated), require)),
        )
        .route(
            "/user/refresh",
            post(handlers::refresh).route_layer(from_fn_with_state(guard(AuthPolicy::Refresh), require)),
        )
        .route(
            "/users",
            get(handlers::list_users).route_layer(from_fn_with_state(
                guard(AuthPolicy::HasRole(vec!["admin".into()])),
                require,
            )),
        )
}
