//! Connection registry: who is connected right now
//!
//! Only the hub coordinator holds a `ConnectionRegistry`, so it needs no lock.
//! Everyone else sees immutable `RegistrySnapshot`s.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::core::connection::{Connection, ConnectionId};
use crate::storage::UserId;

/// A live connection and the user it belongs to
#[derive(Debug, Clone)]
pub struct ConnectedUser {
    pub connection: Connection,
    pub user_id: UserId,
}

/// Point-in-time copy of the registry, ordered by connection id
#[derive(Debug, Clone, Default)]
pub struct RegistrySnapshot {
    entries: Vec<ConnectedUser>,
}

impl RegistrySnapshot {
    pub fn pairs(&self) -> &[ConnectedUser] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.entries.iter().any(|e| e.connection.id() == id)
    }

    pub fn distinct_user_ids(&self) -> BTreeSet<UserId> {
        self.entries.iter().map(|e| e.user_id).collect()
    }
}

/// Mapping of live connections to user ids; keyed by connection
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    entries: BTreeMap<ConnectionId, ConnectedUser>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection; returns false if it was already present
    pub fn insert(&mut self, connection: Connection, user_id: UserId) -> bool {
        let id = connection.id();
        self.entries
            .insert(id, ConnectedUser { connection, user_id })
            .is_none()
    }

    /// Remove a connection, returning its entry if it was registered
    pub fn remove(&mut self, id: ConnectionId) -> Option<ConnectedUser> {
        self.entries.remove(&id)
    }

    /// True while at least one connection of `user_id` is registered
    pub fn has_user(&self, user_id: UserId) -> bool {
        self.entries.values().any(|e| e.user_id == user_id)
    }

    pub fn snapshot_pairs(&self) -> Arc<RegistrySnapshot> {
        Arc::new(RegistrySnapshot {
            entries: self.entries.values().cloned().collect(),
        })
    }

    pub fn distinct_user_ids(&self) -> BTreeSet<UserId> {
        self.entries.values().map(|e| e.user_id).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
