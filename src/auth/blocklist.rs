//! Revoked token registry
//!
//! Logout adds the token's `jti` here until the token would have expired
//! anyway. Entries past their expiry are pruned on write.

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

#[async_trait]
pub trait TokenBlocklist: Send + Sync {
    /// Revoke `jti` until the unix timestamp `expires_at`
    async fn revoke(&self, jti: &str, expires_at: i64) -> Result<()>;

    async fn is_revoked(&self, jti: &str) -> Result<bool>;
}

/// Blocklist kept in process memory (the `simple` cache backend)
#[derive(Clone, Default)]
pub struct InMemoryBlocklist {
    entries: Arc<RwLock<HashMap<String, i64>>>,
}

impl InMemoryBlocklist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl TokenBlocklist for InMemoryBlocklist {
    async fn revoke(&self, jti: &str, expires_at: i64) -> Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;

        let now = Utc::now().timestamp();
        entries.retain(|_, exp| *exp > now);
        entries.insert(jti.to_string(), expires_at);
        Ok(())
    }

    async fn is_revoked(&self, jti: &str) -> Result<bool> {
        let entries = self
            .entries
            .read()
            .map_err(|e| anyhow!("Failed to acquire read lock: {}", e))?;

        Ok(entries.contains_key(jti))
    }
}
