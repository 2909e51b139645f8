use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("HTTP request failed: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("JSON deserialization failed: {0}")]
    SerdeJson(#[from] serde_json::Error),
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Chat service rejected credentials: {0}")]
    Unauthorized(String),
    #[error("Chat API error (HTTP {status}): {body}")]
    Api { status: u16, body: String },
    #[error("Directory lookup failed: {0}")]
    Directory(String),
    #[error("Connection error: {0}")]
    Connection(String),
    #[error("Frame parsing error: {0}")]
    ParseError(String),
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),
    #[error("Actor communication error: {0}")]
    ActorComm(String),
}

impl ChatError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ChatError::Unauthorized(_))
    }
}

pub type Result<T, E = ChatError> = std::result::Result<T, E>;
