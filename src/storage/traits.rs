//! Identity store interface consumed by the hub
//!
//! The hub only needs two things from user persistence: turning a user id
//! into a display name, and recording whether that user is online.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::error::Result;

/// Numeric user identifier produced by authentication
pub type UserId = i64;

/// Presence flag persisted by the identity store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Online,
    Offline,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Online => "online",
            UserStatus::Offline => "offline",
        }
    }
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Public identity of a user, as shown to other clients
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserIdentity {
    pub id: UserId,
    pub username: String,
}

impl UserIdentity {
    pub fn new(id: UserId, username: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
        }
    }
}

/// User lookup and presence persistence
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Resolve a user id, failing with `UserNotFound` for unknown ids
    async fn lookup_user(&self, user_id: UserId) -> Result<UserIdentity>;

    /// Persist the user's online/offline flag
    async fn set_status(&self, user_id: UserId, status: UserStatus) -> Result<()>;
}

/// Identity store shared between the hub and session loops
pub type SharedIdentityStore = Arc<dyn IdentityStore>;
