//! Core module containing the fundamental traits and types of the application

pub mod auth;
pub mod entity;
pub mod error;
pub mod pagination;
pub mod repository;
pub mod response;
pub mod store;
pub mod validation;

pub use auth::{AuthContext, AuthDecision, AuthPolicy, AuthProvider, DenyReason, NoAuthProvider, TokenKind};
pub use entity::{Lookup, Model, Record, TableSchema};
pub use error::{ApiResult, BusinessError, ConfigError, RequestError, StencilError};
pub use pagination::{Page, Pagination};
pub use repository::Repository;
pub use response::{Envelope, ResponseCode};
pub use store::{Query, Session, Store, StoreError};
