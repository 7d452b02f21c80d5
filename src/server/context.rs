//! Application context shared by every handler
//!
//! Everything a request needs (settings, the store, credentials services)
//! is built once at startup and handed to handlers as axum state.

use crate::auth::{JwtAuthProvider, PasswordHasher, TokenBlocklist, TokenService};
use crate::config::Settings;
use crate::core::auth::AuthProvider;
use crate::core::error::StencilError;
use crate::core::store::{Session, Store, StoreError};
use crate::tasks::TaskRegistry;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppContext {
    pub settings: Arc<Settings>,
    pub store: Arc<dyn Store>,
    pub hasher: PasswordHasher,
    pub tokens: Arc<TokenService>,
    pub blocklist: Arc<dyn TokenBlocklist>,
    pub auth: Arc<dyn AuthProvider>,
    pub tasks: Arc<TaskRegistry>,
}

impl AppContext {
    /// Derive the credential services from `settings`
    pub fn new(
        settings: Settings,
        store: Arc<dyn Store>,
        blocklist: Arc<dyn TokenBlocklist>,
        tasks: Arc<TaskRegistry>,
    ) -> Result<Self, StencilError> {
        let hasher = PasswordHasher::new(settings.auth.hash_cost())?;
        let tokens = Arc::new(TokenService::new(
            settings.secret_key()?,
            chrono::Duration::seconds(settings.auth.access_token_ttl as i64),
            chrono::Duration::seconds(settings.auth.refresh_token_ttl as i64),
        ));
        let auth: Arc<dyn AuthProvider> =
            Arc::new(JwtAuthProvider::new(Arc::clone(&tokens), Arc::clone(&blocklist)));

        Ok(Self {
            settings: Arc::new(settings),
            store,
            hasher,
            tokens,
            blocklist,
            auth,
            tasks,
        })
    }

    /// Open a unit of work against the store
    pub async fn session(&self) -> Result<Box<dyn Session>, StoreError> {
        self.store.session().await
    }
}

impl std::fmt::Debug for AppContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppContext")
            .field("environment", &self.settings.environment)
            .field("backend", &self.store.backend())
            .finish_non_exhaustive()
    }
}
