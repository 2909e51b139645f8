use super::error::{ChatError, Result as ChatResult};
use super::types::InboundChatMessage;
use chrono::Utc;
use serde::Deserialize;

pub const EVENT_MESSAGE_NEW: &str = "message.new";
pub const HEALTH_CHECK_FRAME: &str = r#"[{"type":"health.check"}]"#;

#[derive(Debug, Deserialize)]
struct RawFrame {
    #[serde(rename = "type")]
    kind: Option<String>,
    cid: Option<String>,
    connection_id: Option<String>,
    message: Option<RawMessage>,
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    id: Option<String>,
    text: Option<String>,
    pinned: Option<bool>,
    user: Option<RawUser>,
}

#[derive(Debug, Deserialize)]
struct RawUser {
    id: Option<String>,
    name: Option<String>,
}

#[derive(Debug, Clone)]
pub enum StreamFrame {
    /// Any frame carrying a `connection_id`. The first one completes the handshake.
    ConnectionEstablished { connection_id: String },
    NewMessage(InboundChatMessage),
    Other { kind: Option<String> },
}

pub fn decode_frame(raw: &str) -> ChatResult<StreamFrame> {
    let frame: RawFrame =
        serde_json::from_str(raw).map_err(|e| ChatError::ParseError(e.to_string()))?;

    if frame.kind.as_deref() == Some(EVENT_MESSAGE_NEW) {
        return to_inbound_message(frame).map(StreamFrame::NewMessage);
    }

    if let Some(connection_id) = frame.connection_id.filter(|id| !id.is_empty()) {
        return Ok(StreamFrame::ConnectionEstablished { connection_id });
    }

    Ok(StreamFrame::Other { kind: frame.kind })
}

fn to_inbound_message(frame: RawFrame) -> ChatResult<InboundChatMessage> {
    let cid = frame
        .cid
        .ok_or_else(|| ChatError::ParseError("message.new without cid".to_string()))?;
    let message = frame
        .message
        .ok_or_else(|| ChatError::ParseError("message.new without message body".to_string()))?;
    let user = message.user.unwrap_or(RawUser {
        id: None,
        name: None,
    });

    let sender_identity = user.id.unwrap_or_default().trim().to_lowercase();
    if sender_identity.is_empty() {
        return Err(ChatError::ParseError(
            "message.new without sender id".to_string(),
        ));
    }
    let sender_name = user
        .name
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| sender_identity.clone());

    Ok(InboundChatMessage {
        cid,
        message_id: message.id.unwrap_or_default(),
        sender_identity,
        sender_name,
        text: message.text.unwrap_or_default(),
        pinned: message.pinned.unwrap_or(false),
        received_at: Utc::now(),
    })
}
