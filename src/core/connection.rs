//! WebSocket connection management
//! Handles the lifecycle of client connections

use futures_util::sink::{Sink, SinkExt};
use log::{debug, warn};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Notify};
use tokio::time::timeout;
use warp::ws::Message;

use crate::error::{ChatHubError, Result};

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique connection identifier; increases with creation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Handle to one client connection
///
/// Clones share the same outbound queue. The queue is drained by a single
/// writer task, so the socket never sees two writes at once.
#[derive(Clone)]
pub struct Connection {
    id: ConnectionId,
    sender: mpsc::Sender<Message>,
    closed: Arc<AtomicBool>,
    close_signal: Arc<Notify>,
    connected_at: Instant,
}

impl Connection {
    /// Create a new connection feeding the given outbound queue
    pub fn new(sender: mpsc::Sender<Message>) -> Self {
        Self {
            id: ConnectionId::next(),
            sender,
            closed: Arc::new(AtomicBool::new(false)),
            close_signal: Arc::new(Notify::new()),
            connected_at: Instant::now(),
        }
    }

    /// Create a connection together with the receiving end of its queue
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Message>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(tx), rx)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queue a text frame, waiting at most `deadline` for room in the queue
    pub async fn send_text(&self, text: &str, deadline: Duration) -> Result<()> {
        if self.is_closed() {
            return Err(ChatHubError::ConnectionClosed);
        }

        self.sender
            .send_timeout(Message::text(text), deadline)
            .await
            .map_err(|e| match e {
                mpsc::error::SendTimeoutError::Timeout(_) => ChatHubError::ConnectionError(
                    format!("{} did not accept a frame within {:?}", self.id, deadline),
                ),
                mpsc::error::SendTimeoutError::Closed(_) => ChatHubError::ConnectionClosed,
            })
    }

    /// Ask the owning session to stop; idempotent
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.close_signal.notify_one();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire) || self.sender.is_closed()
    }

    /// Resolves once `close` has been called
    pub async fn closed(&self) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        self.close_signal.notified().await;
    }

    /// Calculate the connection duration
    pub fn connection_duration(&self) -> Duration {
        self.connected_at.elapsed()
    }
}

impl PartialEq for Connection {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Connection {}

impl Hash for Connection {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Drain a connection's outbound queue into the transport sink
///
/// Each write is bounded by `write_timeout`. The task ends when every
/// `Connection` clone is gone or the sink fails, which closes the queue and
/// makes further sends fail.
pub async fn forward_outbound<S>(mut sink: S, mut outbound: mpsc::Receiver<Message>, write_timeout: Duration)
where
    S: Sink<Message> + Unpin,
    S::Error: fmt::Display,
{
    while let Some(message) = outbound.recv().await {
        match timeout(write_timeout, sink.send(message)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!("Failed to send WebSocket message: {}", e);
                break;
            }
            Err(_) => {
                warn!("WebSocket write timed out after {:?}", write_timeout);
                break;
            }
        }
    }

    outbound.close();
    if let Err(e) = sink.close().await {
        debug!("Error while closing WebSocket sink: {}", e);
    }
}
