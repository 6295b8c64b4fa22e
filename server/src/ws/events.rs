//! Wire-visible event codes and notification payloads.
//!
//! Outbound frames are JSON text of shape `{"message": <data>, "code": <code>}`.

use serde::{Deserialize, Serialize};

/// Event codes pushed to realtime clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventCode {
    NewMessage,
    UpdateMessage,
    DeleteMessage,
    JoinActivity,
    LeaveActivity,
}

/// Message fragment of a notification payload. `id` is absent for the
/// synthetic join/leave announcements, which have no stored comment behind
/// them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationInfo {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SenderInfo {
    pub id: String,
    pub username: String,
}

/// Payload of one outbound event. Immutable once constructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventData {
    pub message: MessageInfo,
    pub conversation: ConversationInfo,
    pub sender: SenderInfo,
    /// Unix milliseconds
    pub date: i64,
}

impl EventData {
    /// Stamp a payload with the current time. Used by the domain event
    /// producers after a successful mutation.
    pub fn new(message: MessageInfo, conversation: ConversationInfo, sender: SenderInfo) -> Self {
        Self {
            message,
            conversation,
            sender,
            date: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// The frame written to the socket.
#[derive(Debug, Serialize, Deserialize)]
pub struct OutboundFrame {
    pub message: EventData,
    pub code: EventCode,
}
