//! Chat Hub - a real-time WebSocket chat server
//!
//! Authenticated connections are registered with a single hub coordinator
//! that owns the connection registry and fans every chat event out to all
//! connected clients.

pub mod auth;
pub mod config;
pub mod constants;
pub mod core;
pub mod error;
pub mod handlers;
pub mod storage;

// Re-export main components
pub use config::*;
pub use constants::*;
