//! Shared state handed to every HTTP and WebSocket handler

use log::info;
use serde::Serialize;
use std::sync::Arc;

use crate::auth::token::TokenManager;
use crate::config::ServerConfig;
use crate::core::connection::Connection;
use crate::core::hub::{Hub, HubHandle};
use crate::core::session::Session;
use crate::storage::{MemoryUserStore, SharedIdentityStore, UserId};

/// Counts read from the hub's latest registry snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HubStats {
    pub connections: usize,
    pub online_users: usize,
}

/// Owns the running hub together with the user store and token manager
pub struct ChatServer {
    hub: HubHandle,
    users: Arc<MemoryUserStore>,
    tokens: Arc<TokenManager>,
    config: Arc<ServerConfig>,
}

pub type SharedChatServer = Arc<ChatServer>;

impl ChatServer {
    /// Start a hub backed by a fresh in-memory user store
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(config: ServerConfig) -> Self {
        Self::with_store(config, Arc::new(MemoryUserStore::new()))
    }

    pub fn with_store(config: ServerConfig, users: Arc<MemoryUserStore>) -> Self {
        let identity: SharedIdentityStore = users.clone();
        let (hub, _task) = Hub::spawn(identity, &config.hub);
        let tokens = Arc::new(TokenManager::new(&config.jwt_secret));

        info!(
            "Hub ready (register {}, unregister {}, broadcast {} slots)",
            config.hub.register_capacity, config.hub.unregister_capacity, config.hub.broadcast_capacity
        );

        Self {
            hub,
            users,
            tokens,
            config: Arc::new(config),
        }
    }

    /// Start periodic maintenance tasks
    pub fn start_background_tasks(&self) {
        self.tokens
            .revocation_list()
            .start_cleanup_task(self.config.revocation_cleanup_interval);
    }

    pub fn hub(&self) -> &HubHandle {
        &self.hub
    }

    pub fn users(&self) -> &Arc<MemoryUserStore> {
        &self.users
    }

    pub fn identity_store(&self) -> SharedIdentityStore {
        self.users.clone()
    }

    pub fn tokens(&self) -> &Arc<TokenManager> {
        &self.tokens
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Build the session for a freshly authenticated connection
    pub fn accept(&self, connection: Connection, user_id: UserId) -> Session {
        Session::new(
            self.hub.clone(),
            self.identity_store(),
            connection,
            user_id,
            self.config.hub.max_message_length,
        )
    }

    pub fn stats(&self) -> HubStats {
        let snapshot = self.hub.snapshot();
        HubStats {
            connections: snapshot.len(),
            online_users: snapshot.distinct_user_ids().len(),
        }
    }
}
