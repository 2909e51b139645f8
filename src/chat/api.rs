use super::error::{ChatError, Result as ChatResult};
use super::types::ChannelInfo;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

/// Request/response half of the chat transport.
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// Posts a message and returns the id the service assigned to it, if any.
    async fn send_message(&self, channel: &ChannelInfo, text: &str) -> ChatResult<Option<String>>;

    /// Subscribes the socket identified by `connection_id` to channel events.
    async fn watch_channel(&self, channel: &ChannelInfo, connection_id: &str) -> ChatResult<()>;
}

#[derive(Deserialize, Debug)]
struct SendMessageResponse {
    message: Option<SentMessage>,
}

#[derive(Deserialize, Debug)]
struct SentMessage {
    id: Option<String>,
}

pub struct StreamChatClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    auth_token: String,
}

impl StreamChatClient {
    pub fn new(base_url: &str, api_key: &str, auth_token: &str) -> ChatResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            auth_token: auth_token.to_string(),
        })
    }

    fn channel_url(&self, channel: &ChannelInfo, action: &str) -> String {
        format!(
            "{}/channels/{}/{}/{}",
            self.base_url, channel.channel_type, channel.channel_id, action
        )
    }

    fn auth_params(&self) -> [(&'static str, &str); 3] {
        [
            ("api_key", self.api_key.as_str()),
            ("authorization", self.auth_token.as_str()),
            ("stream-auth-type", "jwt"),
        ]
    }
}

async fn check_status(response: reqwest::Response) -> ChatResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error body".to_string());
    if status == StatusCode::UNAUTHORIZED {
        return Err(ChatError::Unauthorized(body));
    }
    Err(ChatError::Api {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl ChatApi for StreamChatClient {
    async fn send_message(&self, channel: &ChannelInfo, text: &str) -> ChatResult<Option<String>> {
        let response = self
            .client
            .post(self.channel_url(channel, "message"))
            .query(&self.auth_params())
            .json(&json!({ "message": { "text": text } }))
            .send()
            .await?;
        let response = check_status(response).await?;
        let body = response.json::<SendMessageResponse>().await?;
        Ok(body.message.and_then(|m| m.id))
    }

    async fn watch_channel(&self, channel: &ChannelInfo, connection_id: &str) -> ChatResult<()> {
        let response = self
            .client
            .post(self.channel_url(channel, "query"))
            .query(&self.auth_params())
            .query(&[("connection_id", connection_id)])
            .json(&json!({ "watch": true, "presence": true, "state": true }))
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }
}
