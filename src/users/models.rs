//! User, role and role membership models

use crate::auth::PasswordHasher;
use crate::impl_model;

impl_model!(
    /// A user of the app
    ///
    /// `password` holds an argon2 PHC hash, never the raw secret.
    User,
    "user",
    unique: [["username"]],
    {
        username: String,
        #[serde(default)]
        email: Option<String>,
        #[serde(default)]
        password: Option<String>,
        #[serde(default)]
        first_name: Option<String>,
        #[serde(default)]
        last_name: Option<String>,
        #[serde(default)]
        active: bool,
    }
);

impl User {
    /// First and last name separated by a space; missing parts are skipped
    pub fn full_name(&self) -> String {
        [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn check_password(&self, hasher: &PasswordHasher, raw: &str) -> bool {
        self.password
            .as_deref()
            .is_some_and(|hash| hasher.verify(raw, hash))
    }

    /// Whether the account may sign in
    pub fn can_login(&self) -> bool {
        self.enabled && self.active
    }
}

impl_model!(
    /// A named role granted to users
    Role,
    "role",
    unique: [["name"]],
    {
        name: String,
    }
);

impl_model!(
    /// Link between a user and a role
    RoleMembership,
    "third_role_users",
    unique: [["user_id", "role_id"]],
    {
        user_id: i64,
        role_id: i64,
    }
);
