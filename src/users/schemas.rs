//! Response views of users and roles
//!
//! Views never carry the id or the password hash. Timestamps render as
//! `%Y-%m-%d %H:%M:%S`.

use super::models::{Role, User};
use crate::core::response::datetime_format;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleView {
    pub name: String,
    pub enabled: bool,
    #[serde(with = "datetime_format")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "datetime_format")]
    pub updated_at: DateTime<Utc>,
}

impl From<&Role> for RoleView {
    fn from(role: &Role) -> Self {
        Self {
            name: role.name.clone(),
            enabled: role.enabled,
            created_at: role.created_at,
            updated_at: role.updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserView {
    pub username: String,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub active: bool,
    pub enabled: bool,
    #[serde(with = "datetime_format")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "datetime_format")]
    pub updated_at: DateTime<Utc>,
    pub roles: Vec<RoleView>,
}

impl UserView {
    pub fn new(user: &User, roles: &[Role]) -> Self {
        Self {
            username: user.username.clone(),
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            active: user.active,
            enabled: user.enabled,
            created_at: user.created_at,
            updated_at: user.updated_at,
            roles: roles.iter().map(RoleView::from).collect(),
        }
    }
}

/// Login answer: the user plus both tokens
#[derive(Debug, Clone, Serialize)]
pub struct LoginView {
    #[serde(flatten)]
    pub user: UserView,
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AccessTokenView {
    pub access_token: String,
}
