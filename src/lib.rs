//! # stencil
//!
//! A web application scaffold: declarative request parsing, a generic
//! repository with upserts, JWT user accounts and scheduled tasks.
//!
//! ## Features
//!
//! - **Request parsing**: `JsonParser`/`Argument` with composable validators and filters
//! - **Repository**: CRUD, pagination, `get_or_create` and `update_or_create` over any store
//! - **Accounts**: register, login, logout and token refresh with argon2 and JWT
//! - **Uniform responses**: every endpoint answers `{data, code, error}`
//! - **Storage backends**: in-memory (default) and PostgreSQL (`postgres` feature)
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use stencil::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     stencil::telemetry::init(&settings.log)?;
//!     let addr = settings.server.bind_addr();
//!     AppBuilder::new().with_settings(settings).serve(&addr).await
//! }
//! ```

pub mod auth;
pub mod config;
pub mod core;
pub mod entities;
pub mod server;
pub mod storage;
pub mod tasks;
pub mod telemetry;
pub mod users;

/// Re-exports of commonly used types and traits
pub mod prelude {
    // === Core ===
    pub use crate::core::{
        ApiResult, AuthContext, AuthPolicy, AuthProvider, BusinessError, Envelope, Lookup, Model,
        Page, Pagination, Record, Repository, ResponseCode, Session, StencilError, Store,
        StoreError,
    };

    // === Request parsing ===
    pub use crate::core::validation::{
        Argument, Form, FormErrors, JsonParser, Parsed, ParsedForm, ParsedQuery, Validator,
    };

    // === Macros ===
    pub use crate::impl_model;

    // === Application ===
    pub use crate::config::{Environment, Settings};
    pub use crate::server::{AppBuilder, AppContext};
    pub use crate::storage::InMemoryStore;
    pub use crate::tasks::{Task, TaskRegistry};
    pub use crate::users::{Role, User, UserView};
}
