use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ConnectionStatus {
    Disconnected {
        reason: String,
    },
    Connecting {
        attempt: u32,
    },
    Authenticated {
        connection_id: String,
    },
    Watching,
    Reconnecting {
        reason: String,
        failed_attempt: u32,
        retry_in: Duration,
    },
    Terminated,
}

/// Routing for the one channel this process serves, as resolved by the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelInfo {
    pub channel_type: String,
    pub channel_id: String,
    pub owner_identity: String,
}

impl ChannelInfo {
    /// The `type:id` form the event socket uses to scope events.
    pub fn cid(&self) -> String {
        format!("{}:{}", self.channel_type, self.channel_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundChatMessage {
    pub cid: String,
    pub message_id: String,
    /// Lower-cased sender address.
    pub sender_identity: String,
    pub sender_name: String,
    pub text: String,
    pub pinned: bool,
    pub received_at: DateTime<Utc>,
}
