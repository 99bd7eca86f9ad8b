//! Per-connection read loop
//!
//! A session registers its connection with the hub, turns every inbound
//! text frame into a chat message event and unregisters on the way out,
//! whatever the exit path.

use futures_util::stream::{Stream, StreamExt};
use log::{debug, info, warn};
use std::fmt;
use warp::ws::Message as WsMessage;

use crate::core::connection::{Connection, ConnectionId};
use crate::core::hub::HubHandle;
use crate::core::message::{ChatEvent, InboundMessage};
use crate::error::{ChatHubError, Result};
use crate::storage::{SharedIdentityStore, UserId};

/// Unregisters a connection when dropped unless released first
///
/// Normal exits call `release`, which waits for a free unregister slot.
/// Drop covers panics and cancelled sessions.
pub struct UnregisterGuard {
    hub: HubHandle,
    id: ConnectionId,
    armed: bool,
}

impl UnregisterGuard {
    pub fn new(hub: HubHandle, id: ConnectionId) -> Self {
        Self { hub, id, armed: true }
    }

    pub async fn release(mut self) {
        self.armed = false;
        if let Err(e) = self.hub.unregister(self.id).await {
            debug!("Could not unregister {}: {}", self.id, e);
        }
    }
}

impl Drop for UnregisterGuard {
    fn drop(&mut self) {
        if self.armed {
            self.hub.unregister_detached(self.id);
        }
    }
}

/// One authenticated client, from registration to unregistration
pub struct Session {
    hub: HubHandle,
    store: SharedIdentityStore,
    connection: Connection,
    user_id: UserId,
    max_message_length: usize,
}

impl Session {
    pub fn new(
        hub: HubHandle,
        store: SharedIdentityStore,
        connection: Connection,
        user_id: UserId,
        max_message_length: usize,
    ) -> Self {
        Self {
            hub,
            store,
            connection,
            user_id,
            max_message_length,
        }
    }

    /// Drive the session until the client goes away or the hub drops it
    pub async fn run<S, E>(self, mut inbound: S)
    where
        S: Stream<Item = std::result::Result<WsMessage, E>> + Unpin,
        E: fmt::Display,
    {
        let conn_id = self.connection.id();

        if let Err(e) = self.hub.register(self.connection.clone(), self.user_id).await {
            warn!("Could not register {}: {}", conn_id, e);
            return;
        }
        let guard = UnregisterGuard::new(self.hub.clone(), conn_id);

        loop {
            let next = tokio::select! {
                _ = self.connection.closed() => {
                    debug!("{} closed by the hub", conn_id);
                    break;
                }
                next = inbound.next() => next,
            };

            match next {
                Some(Ok(frame)) if frame.is_close() => {
                    debug!("{} sent a close frame", conn_id);
                    break;
                }
                Some(Ok(frame)) => {
                    if let Err(e) = self.handle_frame(frame).await {
                        warn!("Dropping frame from {}: {}", conn_id, e);
                    }
                }
                Some(Err(e)) => {
                    warn!("WebSocket error on {}: {}", conn_id, e);
                    break;
                }
                None => break,
            }
        }

        info!(
            "Session {} for user {} ended after {:?}",
            conn_id,
            self.user_id,
            self.connection.connection_duration()
        );
        guard.release().await;
    }

    async fn handle_frame(&self, frame: WsMessage) -> Result<()> {
        // Pings, pongs and binary frames carry no chat content
        let Ok(text) = frame.to_str() else {
            return Ok(());
        };

        if text.len() > self.max_message_length {
            return Err(ChatHubError::MessageTooLarge(text.len()));
        }

        let inbound = InboundMessage::parse(text)?;
        let user = self.store.lookup_user(self.user_id).await?;
        debug!("Message from {} ({} bytes)", user.username, inbound.content.len());

        self.hub.broadcast(ChatEvent::message(&user, inbound.content)).await
    }
}
