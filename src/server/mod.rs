//! HTTP server: shared context, route guards and the application builder
//!
//! [`AppBuilder`] turns [`Settings`](crate::config::Settings) and a store
//! into an axum `Router`:
//! - `/api/...` user endpoints
//! - `/health` service status
//! - any custom routes

pub mod builder;
pub mod context;
pub mod middleware;
pub mod router;

pub use builder::AppBuilder;
pub use context::AppContext;
pub use middleware::{AuthGuard, require};
pub use router::build_router;
