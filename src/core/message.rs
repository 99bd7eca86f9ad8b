use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::storage::{UserId, UserIdentity};

/// Fields shared by every chat event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventBody {
    pub user_id: UserId,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl EventBody {
    fn new(user: &UserIdentity, content: Option<String>) -> Self {
        Self {
            user_id: user.id,
            username: user.username.clone(),
            content,
            timestamp: Utc::now(),
        }
    }
}

/// Event distributed to every connected client
///
/// Timestamped when constructed, not when delivered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ChatEvent {
    #[serde(rename = "user_joined")]
    Joined(EventBody),
    #[serde(rename = "user_left")]
    Left(EventBody),
    #[serde(rename = "message")]
    Message(EventBody),
}

impl ChatEvent {
    pub fn joined(user: &UserIdentity) -> Self {
        ChatEvent::Joined(EventBody::new(user, Some("joined the chat".to_string())))
    }

    pub fn left(user: &UserIdentity) -> Self {
        ChatEvent::Left(EventBody::new(user, Some("left the chat".to_string())))
    }

    pub fn message(user: &UserIdentity, content: String) -> Self {
        ChatEvent::Message(EventBody::new(user, Some(content)))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ChatEvent::Joined(_) => "user_joined",
            ChatEvent::Left(_) => "user_left",
            ChatEvent::Message(_) => "message",
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// List of users online at one point in time, sent only to a joining client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "online_users")]
pub struct OnlineUsersSnapshot {
    pub online_users: Vec<UserIdentity>,
    pub timestamp: DateTime<Utc>,
}

impl OnlineUsersSnapshot {
    pub fn new(online_users: Vec<UserIdentity>) -> Self {
        Self {
            online_users,
            timestamp: Utc::now(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Payload a client sends to post a chat message
#[derive(Debug, Clone, Deserialize)]
pub struct InboundMessage {
    pub content: String,
}

impl InboundMessage {
    pub fn parse(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}
