//! Token revocation storage
//!
//! Logged-out tokens stay on this list until their own expiry, after which
//! they are rejected by signature validation anyway and can be dropped.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// In-memory list of revoked token ids (`jti`) and their expiry
pub struct TokenRevocationList {
    revoked: RwLock<HashMap<String, DateTime<Utc>>>,
}

impl TokenRevocationList {
    pub fn new() -> Self {
        Self {
            revoked: RwLock::new(HashMap::new()),
        }
    }

    /// Revoke a token until `expires_at`
    pub async fn revoke(&self, token_id: &str, expires_at: DateTime<Utc>) {
        self.revoked
            .write()
            .await
            .insert(token_id.to_string(), expires_at);
        log::info!("Token revoked: {} (until {})", token_id, expires_at);
    }

    pub async fn is_revoked(&self, token_id: &str) -> bool {
        self.revoked.read().await.contains_key(token_id)
    }

    /// Drop entries whose token has expired; returns how many were removed
    pub async fn cleanup_expired(&self) -> usize {
        let now = Utc::now();
        let mut revoked = self.revoked.write().await;
        let before = revoked.len();
        revoked.retain(|_, expires_at| *expires_at > now);
        before - revoked.len()
    }

    pub async fn len(&self) -> usize {
        self.revoked.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.revoked.read().await.is_empty()
    }

    /// Start background cleanup task
    pub fn start_cleanup_task(self: Arc<Self>, every: Duration) {
        let list = Arc::clone(&self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            // The first tick completes immediately
            interval.tick().await;
            loop {
                interval.tick().await;
                let removed = list.cleanup_expired().await;
                if removed > 0 {
                    log::info!("Cleaned up {} expired token revocations", removed);
                } else {
                    log::debug!("Token revocation cleanup found nothing to remove");
                }
            }
        });
    }
}

impl Default for TokenRevocationList {
    fn default() -> Self {
        Self::new()
    }
}
