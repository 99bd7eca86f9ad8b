//! Core functionality of the chat hub

pub mod connection;
pub mod fanout;
pub mod hub;
pub mod intake;
pub mod message;
pub mod registry;
pub mod server;
pub mod session;

// Re-export main components for convenience
pub use connection::{forward_outbound, Connection, ConnectionId};
pub use fanout::{DeliveryReport, FanoutSender, FanoutWorker, Recipients};
pub use hub::{Hub, HubHandle};
pub use intake::{HubEvent, Registration};
pub use message::{ChatEvent, EventBody, InboundMessage, OnlineUsersSnapshot};
pub use registry::{ConnectedUser, ConnectionRegistry, RegistrySnapshot};
pub use server::{ChatServer, HubStats, SharedChatServer};
pub use session::{Session, UnregisterGuard};
