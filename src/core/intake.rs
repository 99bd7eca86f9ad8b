//! Ordered hub intake
//!
//! Register, unregister and broadcast requests travel through one FIFO queue,
//! so the coordinator handles them in the order they were submitted. Each
//! kind keeps its own slot budget: a producer waits for a free slot of its
//! kind before the request is queued, and the slot comes back once the
//! coordinator has handled the request.

use log::{debug, warn};
use std::sync::Arc;
use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore, TryAcquireError};

use crate::core::connection::{Connection, ConnectionId};
use crate::core::message::ChatEvent;
use crate::error::{ChatHubError, Result};
use crate::storage::UserId;

/// Request to attach an authenticated connection to the hub
#[derive(Debug)]
pub struct Registration {
    pub connection: Connection,
    pub user_id: UserId,
}

/// One request for the coordinator
#[derive(Debug)]
pub enum HubEvent {
    Register(Registration),
    Unregister(ConnectionId),
    Broadcast(ChatEvent),
}

/// A queued request and the slot it occupies
pub struct Envelope {
    pub(crate) event: HubEvent,
    pub(crate) slot: OwnedSemaphorePermit,
}

struct Slots {
    register: Arc<Semaphore>,
    unregister: Arc<Semaphore>,
    broadcast: Arc<Semaphore>,
}

impl Slots {
    fn for_event(&self, event: &HubEvent) -> Arc<Semaphore> {
        let slots = match event {
            HubEvent::Register(_) => &self.register,
            HubEvent::Unregister(_) => &self.unregister,
            HubEvent::Broadcast(_) => &self.broadcast,
        };
        Arc::clone(slots)
    }
}

fn hub_stopped() -> ChatHubError {
    ChatHubError::SystemError("Hub is not running".to_string())
}

/// Create the intake with the given slot budget per kind
pub fn channel(
    register_capacity: usize,
    unregister_capacity: usize,
    broadcast_capacity: usize,
) -> (IntakeSender, IntakeReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    let slots = Slots {
        register: Arc::new(Semaphore::new(register_capacity.max(1))),
        unregister: Arc::new(Semaphore::new(unregister_capacity.max(1))),
        broadcast: Arc::new(Semaphore::new(broadcast_capacity.max(1))),
    };
    let sender = IntakeSender {
        tx,
        slots: Arc::new(slots),
    };
    (sender, IntakeReceiver { rx })
}

#[derive(Clone)]
pub struct IntakeSender {
    tx: mpsc::UnboundedSender<Envelope>,
    slots: Arc<Slots>,
}

impl IntakeSender {
    /// Queue a request, waiting while every slot of its kind is taken
    pub async fn send(&self, event: HubEvent) -> Result<()> {
        if self.tx.is_closed() {
            return Err(hub_stopped());
        }
        let slot = self
            .slots
            .for_event(&event)
            .acquire_owned()
            .await
            .map_err(|_| hub_stopped())?;
        self.tx
            .send(Envelope { event, slot })
            .map_err(|_| hub_stopped())
    }

    /// Queue a request from a context that cannot await
    ///
    /// Falls back to a spawned send when no slot is free.
    pub fn send_detached(&self, event: HubEvent) {
        match self.slots.for_event(&event).try_acquire_owned() {
            Ok(slot) => {
                if self.tx.send(Envelope { event, slot }).is_err() {
                    debug!("Hub stopped before a detached request could be queued");
                }
            }
            Err(TryAcquireError::NoPermits) => match tokio::runtime::Handle::try_current() {
                Ok(runtime) => {
                    let sender = self.clone();
                    runtime.spawn(async move {
                        if let Err(e) = sender.send(event).await {
                            debug!("Detached request dropped: {}", e);
                        }
                    });
                }
                Err(_) => warn!("No runtime available to queue {:?}", event),
            },
            Err(TryAcquireError::Closed) => debug!("Hub intake closed, dropping {:?}", event),
        }
    }

    /// Handle that does not keep the coordinator alive
    pub fn downgrade(&self) -> WeakIntakeSender {
        WeakIntakeSender {
            tx: self.tx.downgrade(),
            slots: Arc::clone(&self.slots),
        }
    }
}

#[derive(Clone)]
pub struct WeakIntakeSender {
    tx: mpsc::WeakUnboundedSender<Envelope>,
    slots: Arc<Slots>,
}

impl WeakIntakeSender {
    pub fn upgrade(&self) -> Option<IntakeSender> {
        self.tx.upgrade().map(|tx| IntakeSender {
            tx,
            slots: Arc::clone(&self.slots),
        })
    }
}

pub struct IntakeReceiver {
    rx: mpsc::UnboundedReceiver<Envelope>,
}

impl IntakeReceiver {
    /// Next request in submission order; `None` once every sender is gone
    pub async fn recv(&mut self) -> Option<Envelope> {
        self.rx.recv().await
    }
}
