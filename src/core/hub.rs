//! Hub coordinator
//!
//! A single task owns the connection registry and processes register,
//! unregister and broadcast events one at a time, in the order they were
//! submitted. Because nothing else writes the registry, no two mutations can
//! race and every join/leave event is derived from a consistent view of who
//! is connected.

use log::{debug, error, info, warn};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::HubConfig;
use crate::core::connection::{Connection, ConnectionId};
use crate::core::fanout::{FanoutSender, FanoutWorker, Recipients};
use crate::core::intake::{self, Envelope, HubEvent, IntakeReceiver, IntakeSender, Registration};
use crate::core::message::{ChatEvent, OnlineUsersSnapshot};
use crate::core::registry::{ConnectionRegistry, RegistrySnapshot};
use crate::error::Result;
use crate::storage::{SharedIdentityStore, UserId, UserStatus};

/// Cloneable entry point into the hub's intake
#[derive(Clone)]
pub struct HubHandle {
    intake: IntakeSender,
    snapshot_rx: watch::Receiver<Arc<RegistrySnapshot>>,
}

impl HubHandle {
    /// Queue a registration; waits while the register slots are full
    pub async fn register(&self, connection: Connection, user_id: UserId) -> Result<()> {
        self.intake
            .send(HubEvent::Register(Registration {
                connection,
                user_id,
            }))
            .await
    }

    /// Queue an unregistration; unknown connections are ignored by the hub
    pub async fn unregister(&self, id: ConnectionId) -> Result<()> {
        self.intake.send(HubEvent::Unregister(id)).await
    }

    /// Queue an unregistration from a context that cannot await
    pub fn unregister_detached(&self, id: ConnectionId) {
        self.intake.send_detached(HubEvent::Unregister(id));
    }

    /// Queue a chat event for every connected client
    pub async fn broadcast(&self, event: ChatEvent) -> Result<()> {
        self.intake.send(HubEvent::Broadcast(event)).await
    }

    /// Latest registry snapshot published by the coordinator
    pub fn snapshot(&self) -> Arc<RegistrySnapshot> {
        Arc::clone(&self.snapshot_rx.borrow())
    }

    /// Watch channel that changes after every registry mutation
    pub fn subscribe(&self) -> watch::Receiver<Arc<RegistrySnapshot>> {
        self.snapshot_rx.clone()
    }
}

/// The coordinator; consumed by `run`
pub struct Hub {
    registry: ConnectionRegistry,
    store: SharedIdentityStore,
    fanout: FanoutSender,
    fanout_worker: Option<FanoutWorker>,
    snapshot_tx: watch::Sender<Arc<RegistrySnapshot>>,
    intake: IntakeReceiver,
}

impl Hub {
    /// Build a hub and the handle used to feed it
    pub fn new(store: SharedIdentityStore, config: &HubConfig) -> (Self, HubHandle) {
        let (intake_tx, intake_rx) = intake::channel(
            config.register_capacity,
            config.unregister_capacity,
            config.broadcast_capacity,
        );
        let (snapshot_tx, snapshot_rx) = watch::channel(Arc::new(RegistrySnapshot::default()));

        let (fanout, fanout_worker) = FanoutSender::new(
            config.broadcast_capacity,
            config.write_timeout,
            config.max_concurrent_sends,
            intake_tx.downgrade(),
        );

        let hub = Self {
            registry: ConnectionRegistry::new(),
            store,
            fanout,
            fanout_worker: Some(fanout_worker),
            snapshot_tx,
            intake: intake_rx,
        };
        let handle = HubHandle {
            intake: intake_tx,
            snapshot_rx,
        };
        (hub, handle)
    }

    /// Build a hub and run it on the current runtime
    pub fn spawn(store: SharedIdentityStore, config: &HubConfig) -> (HubHandle, JoinHandle<()>) {
        let (hub, handle) = Self::new(store, config);
        let task = tokio::spawn(hub.run());
        (handle, task)
    }

    /// Main loop; returns once every `HubHandle` has been dropped
    pub async fn run(mut self) {
        if let Some(worker) = self.fanout_worker.take() {
            tokio::spawn(worker.run());
        }
        info!("Chat hub started");

        while let Some(Envelope { event, slot }) = self.intake.recv().await {
            match event {
                HubEvent::Register(registration) => self.register_client(registration).await,
                HubEvent::Unregister(id) => self.unregister_client(id).await,
                HubEvent::Broadcast(event) => self.broadcast_event(&event, None).await,
            }
            drop(slot);
        }

        for entry in self.registry.snapshot_pairs().pairs() {
            entry.connection.close();
        }
        info!("Chat hub stopped");
    }

    async fn register_client(&mut self, registration: Registration) {
        let Registration {
            connection,
            user_id,
        } = registration;
        let conn_id = connection.id();

        let user = match self.store.lookup_user(user_id).await {
            Ok(user) => user,
            Err(e) => {
                warn!("Error getting user {} for {}: {}", user_id, conn_id, e);
                connection.close();
                return;
            }
        };

        if !self.registry.insert(connection, user_id) {
            debug!("{} was already registered", conn_id);
            return;
        }
        self.publish_snapshot();

        if let Err(e) = self.store.set_status(user.id, UserStatus::Online).await {
            warn!("Error updating status of user {}: {}", user.id, e);
        }

        info!(
            "Client connected: {} as {} ({}), {} connections",
            conn_id,
            user.username,
            user.id,
            self.registry.len()
        );

        self.broadcast_event(&ChatEvent::joined(&user), Some(conn_id)).await;
        self.send_online_users(conn_id).await;
    }

    async fn unregister_client(&mut self, id: ConnectionId) {
        let Some(entry) = self.registry.remove(id) else {
            debug!("Ignoring unregister for unknown connection {}", id);
            return;
        };
        self.publish_snapshot();
        entry.connection.close();

        info!(
            "Client disconnected: {} (user {}), {} connections",
            id,
            entry.user_id,
            self.registry.len()
        );

        let user = match self.store.lookup_user(entry.user_id).await {
            Ok(user) => user,
            Err(e) => {
                warn!("Error getting user {} after disconnect: {}", entry.user_id, e);
                return;
            }
        };

        // Another session of the same user keeps them online
        if !self.registry.has_user(user.id) {
            if let Err(e) = self.store.set_status(user.id, UserStatus::Offline).await {
                warn!("Error updating status of user {}: {}", user.id, e);
            }
        }

        self.broadcast_event(&ChatEvent::left(&user), None).await;
    }

    /// Serialize once and hand the payload to the fan-out
    ///
    /// Waits while the fan-out job queue is full.
    async fn broadcast_event(&self, event: &ChatEvent, except: Option<ConnectionId>) {
        let payload = match event.to_json() {
            Ok(json) => json,
            Err(e) => {
                error!("Error marshaling {} event: {}", event.kind(), e);
                return;
            }
        };

        self.fanout
            .dispatch(
                event.kind(),
                Arc::from(payload),
                self.registry.snapshot_pairs(),
                Recipients::All { except },
            )
            .await;
    }

    /// Send the list of online users to a single connection
    async fn send_online_users(&self, target: ConnectionId) {
        let user_ids = self.registry.distinct_user_ids();
        let mut online_users = Vec::with_capacity(user_ids.len());
        for user_id in user_ids {
            match self.store.lookup_user(user_id).await {
                Ok(user) => online_users.push(user),
                Err(e) => warn!("Error getting user {}: {}", user_id, e),
            }
        }

        let payload = match OnlineUsersSnapshot::new(online_users).to_json() {
            Ok(json) => json,
            Err(e) => {
                error!("Error marshaling online users message: {}", e);
                return;
            }
        };

        self.fanout
            .dispatch(
                "online_users",
                Arc::from(payload),
                self.registry.snapshot_pairs(),
                Recipients::Only(target),
            )
            .await;
    }

    fn publish_snapshot(&self) {
        self.snapshot_tx.send_replace(self.registry.snapshot_pairs());
    }
}
