use std::error::Error;
use std::fmt;

use crate::storage::UserId;

#[derive(Debug)]
pub enum ChatHubError {
    // Identity errors
    UserNotFound(UserId),
    StorageError(String),

    // Connection errors
    ConnectionError(String),
    ConnectionClosed,

    // Message errors
    MessageParseError(String),
    MessageTooLarge(usize),

    // Auth errors
    AuthError(String),
    Unauthorized,
    Conflict(String),

    // Validation errors
    ValidationError(String),

    // System errors
    SystemError(String),

    // Configuration errors
    ConfigError(String),
}

impl fmt::Display for ChatHubError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UserNotFound(id) => write!(f, "User not found: {}", id),
            Self::StorageError(msg) => write!(f, "Storage error: {}", msg),
            Self::ConnectionError(msg) => write!(f, "Connection error: {}", msg),
            Self::ConnectionClosed => write!(f, "Connection closed unexpectedly"),
            Self::MessageParseError(msg) => write!(f, "Message parse error: {}", msg),
            Self::MessageTooLarge(size) => write!(f, "Message too large: {} bytes", size),
            Self::AuthError(msg) => write!(f, "Authentication error: {}", msg),
            Self::Unauthorized => write!(f, "Unauthorized access"),
            Self::Conflict(msg) => write!(f, "Conflict: {}", msg),
            Self::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            Self::SystemError(msg) => write!(f, "System error: {}", msg),
            Self::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl Error for ChatHubError {}

impl From<serde_json::Error> for ChatHubError {
    fn from(err: serde_json::Error) -> Self {
        ChatHubError::MessageParseError(err.to_string())
    }
}

// Lets HTTP filters reject with the crate error and recover it in the rejection handler
impl warp::reject::Reject for ChatHubError {}

// Generic result type for the chat hub
pub type Result<T> = std::result::Result<T, ChatHubError>;
