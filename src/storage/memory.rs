//! In-memory user storage for development and testing
//!
//! Keeps account records in a map behind a tokio `RwLock`. Suitable for
//! development, tests and single-process deployments.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::RwLock;

use super::traits::{IdentityStore, UserId, UserIdentity, UserStatus};
use crate::error::{ChatHubError, Result};

/// Stored account data
#[derive(Debug, Clone, Serialize)]
pub struct UserRecord {
    pub id: UserId,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub status: UserStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserRecord {
    pub fn identity(&self) -> UserIdentity {
        UserIdentity::new(self.id, self.username.clone())
    }
}

/// In-memory user store
pub struct MemoryUserStore {
    users: RwLock<HashMap<UserId, UserRecord>>,
    next_id: AtomicI64,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
            next_id: AtomicI64::new(1),
        }
    }

    /// Create an account; usernames and emails are unique (case-insensitive)
    pub async fn create_user(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<UserRecord> {
        let mut users = self.users.write().await;

        let taken = users.values().any(|u| {
            u.username.eq_ignore_ascii_case(username) || u.email.eq_ignore_ascii_case(email)
        });
        if taken {
            return Err(ChatHubError::Conflict(
                "Username or email already in use".to_string(),
            ));
        }

        let now = Utc::now();
        let record = UserRecord {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            username: username.to_string(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            status: UserStatus::Offline,
            created_at: now,
            updated_at: now,
        };
        users.insert(record.id, record.clone());

        log::debug!("Created user {} ({})", record.id, record.username);
        Ok(record)
    }

    pub async fn get_user(&self, user_id: UserId) -> Result<UserRecord> {
        self.users
            .read()
            .await
            .get(&user_id)
            .cloned()
            .ok_or(ChatHubError::UserNotFound(user_id))
    }

    pub async fn find_by_username(&self, username: &str) -> Option<UserRecord> {
        self.users
            .read()
            .await
            .values()
            .find(|u| u.username == username)
            .cloned()
    }

    pub async fn status_of(&self, user_id: UserId) -> Option<UserStatus> {
        self.users.read().await.get(&user_id).map(|u| u.status)
    }

    pub async fn user_count(&self) -> usize {
        self.users.read().await.len()
    }
}

impl Default for MemoryUserStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdentityStore for MemoryUserStore {
    async fn lookup_user(&self, user_id: UserId) -> Result<UserIdentity> {
        self.users
            .read()
            .await
            .get(&user_id)
            .map(UserRecord::identity)
            .ok_or(ChatHubError::UserNotFound(user_id))
    }

    async fn set_status(&self, user_id: UserId, status: UserStatus) -> Result<()> {
        let mut users = self.users.write().await;
        let user = users
            .get_mut(&user_id)
            .ok_or(ChatHubError::UserNotFound(user_id))?;
        user.status = status;
        user.updated_at = Utc::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_and_lookup() {
        let store = MemoryUserStore::new();
        let alice = store
            .create_user("alice", "alice@example.com", "hash")
            .await
            .unwrap();
        let bob = store
            .create_user("bob", "bob@example.com", "hash")
            .await
            .unwrap();

        assert_eq!(alice.id, 1);
        assert_eq!(bob.id, 2);
        assert_eq!(alice.status, UserStatus::Offline);

        let identity = store.lookup_user(bob.id).await.unwrap();
        assert_eq!(identity, UserIdentity::new(2, "bob"));
        assert_eq!(store.user_count().await, 2);
    }

    #[tokio::test]
    async fn test_duplicate_username_or_email_conflicts() {
        let store = MemoryUserStore::new();
        store
            .create_user("alice", "alice@example.com", "hash")
            .await
            .unwrap();

        let dup_name = store.create_user("Alice", "other@example.com", "hash").await;
        assert!(matches!(dup_name, Err(ChatHubError::Conflict(_))));

        let dup_email = store.create_user("carol", "ALICE@example.com", "hash").await;
        assert!(matches!(dup_email, Err(ChatHubError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_set_status() {
        let store = MemoryUserStore::new();
        let alice = store
            .create_user("alice", "alice@example.com", "hash")
            .await
            .unwrap();

        store.set_status(alice.id, UserStatus::Online).await.unwrap();
        assert_eq!(store.status_of(alice.id).await, Some(UserStatus::Online));

        let missing = store.set_status(42, UserStatus::Online).await;
        assert!(matches!(missing, Err(ChatHubError::UserNotFound(42))));
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let record = UserRecord {
            id: 1,
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            password_hash: "secret-hash".to_string(),
            status: UserStatus::Online,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["status"], "online");
    }
}
