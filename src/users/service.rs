//! User account operations
//!
//! Functions here borrow the caller's [`Session`] so a handler decides the
//! unit of work. Password hashing runs on the blocking pool.

use super::models::{Role, RoleMembership, User};
use crate::auth::PasswordHasher;
use crate::core::entity::{Lookup, Record};
use crate::core::error::{BusinessError, StencilError};
use crate::core::repository::Repository;
use crate::core::store::{Session, StoreError};
use serde::Deserialize;
use serde_json::Value;

/// Accepted registration input
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

fn by_username(username: &str) -> Lookup {
    Lookup::new().eq("username", username)
}

async fn hash_password(hasher: &PasswordHasher, password: String) -> Result<String, StencilError> {
    let hasher = hasher.clone();
    tokio::task::spawn_blocking(move || hasher.hash(&password))
        .await
        .map_err(|e| StencilError::Internal(format!("password hashing task failed: {}", e)))?
        .map_err(StencilError::from)
}

/// Create an active account
///
/// Fails with `DuplicateUsername` when the name is taken, including when a
/// concurrent registration wins between the check and the insert.
pub async fn register_user(
    session: &mut dyn Session,
    hasher: &PasswordHasher,
    input: NewUser,
) -> Result<User, StencilError> {
    let mut users = Repository::<User>::new(session);
    if users.get(&by_username(&input.username)).await?.is_some() {
        return Err(BusinessError::DuplicateUsername {
            username: input.username,
        }
        .into());
    }

    let hash = hash_password(hasher, input.password).await?;
    let fields = Record::from_iter([
        ("username".to_string(), Value::from(input.username.clone())),
        ("email".to_string(), Value::from(input.email)),
        ("password".to_string(), Value::from(hash)),
        ("active".to_string(), Value::Bool(true)),
    ]);

    match users.create(fields).await {
        Ok(user) => {
            tracing::info!(user_id = user.id, username = %user.username, "user registered");
            Ok(user)
        }
        Err(StoreError::UniqueViolation { .. }) => {
            users.rollback().await?;
            Err(BusinessError::DuplicateUsername {
                username: input.username,
            }
            .into())
        }
        Err(e) => Err(e.into()),
    }
}

/// Check credentials
///
/// Unknown users, wrong passwords and accounts that may not sign in all
/// produce the same `InvalidCredentials` answer.
pub async fn authenticate(
    session: &mut dyn Session,
    hasher: &PasswordHasher,
    username: &str,
    password: &str,
) -> Result<User, StencilError> {
    let Some(user) = Repository::<User>::new(session).get(&by_username(username)).await? else {
        tracing::debug!(username, "login for unknown user");
        return Err(BusinessError::InvalidCredentials.into());
    };

    let hasher = hasher.clone();
    let candidate = user.clone();
    let password = password.to_string();
    let verified = tokio::task::spawn_blocking(move || candidate.check_password(&hasher, &password))
        .await
        .map_err(|e| StencilError::Internal(format!("password check task failed: {}", e)))?;

    if !verified || !user.can_login() {
        tracing::debug!(user_id = user.id, "login rejected");
        return Err(BusinessError::InvalidCredentials.into());
    }
    Ok(user)
}

/// Roles granted to `user`, sorted by name
pub async fn roles_of(session: &mut dyn Session, user: &User) -> Result<Vec<Role>, StoreError> {
    let memberships = Repository::<RoleMembership>::new(&mut *session)
        .find(&Lookup::new().eq("user_id", user.id))
        .await?;

    let mut roles = Vec::with_capacity(memberships.len());
    let mut repo = Repository::<Role>::new(session);
    for membership in memberships {
        if let Some(role) = repo.get_by_id(membership.role_id).await? {
            roles.push(role);
        }
    }
    roles.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(roles)
}

/// Names of the enabled roles, as carried in tokens
pub fn role_names(roles: &[Role]) -> Vec<String> {
    roles
        .iter()
        .filter(|r| r.enabled)
        .map(|r| r.name.clone())
        .collect()
}

/// Grant the role `name` to `user`, creating the role when needed
pub async fn assign_role(session: &mut dyn Session, user: &User, name: &str) -> Result<Role, StoreError> {
    let (role, _) = Repository::<Role>::new(&mut *session)
        .get_or_create(Lookup::new().eq("name", name), Record::new())
        .await?;

    let (_, created) = Repository::<RoleMembership>::new(session)
        .get_or_create(
            Lookup::new().eq("user_id", user.id).eq("role_id", role.id),
            Record::new(),
        )
        .await?;
    if created {
        tracing::info!(user_id = user.id, role = %role.name, "role granted");
    }
    Ok(role)
}
