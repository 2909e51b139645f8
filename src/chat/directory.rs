use super::error::ChatError;
use super::types::ChannelInfo;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct StreamerResponse {
    chat_channel_id: String,
    streamer: StreamerOwner,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct StreamerOwner {
    wallet_address: String,
}

/// Resolves a channel handle to the routing the chat service needs.
#[async_trait]
pub trait ChannelDirectory: Send + Sync {
    async fn lookup(&self, handle: &str) -> Result<ChannelInfo, ChatError>;
}

pub struct PortalDirectory {
    client: reqwest::Client,
    base_url: String,
    channel_type: String,
}

impl PortalDirectory {
    pub fn new(base_url: &str, channel_type: &str) -> Result<Self, ChatError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            channel_type: channel_type.to_string(),
        })
    }

    fn streamer_url(&self, handle: &str) -> Result<reqwest::Url, ChatError> {
        let mut url = reqwest::Url::parse(&self.base_url)
            .map_err(|e| ChatError::Directory(format!("Invalid directory URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| ChatError::Directory(format!("Directory URL '{}' cannot take a path", self.base_url)))?
            .pop_if_empty()
            .extend(["api", "streamer", handle]);
        Ok(url)
    }
}

#[async_trait]
impl ChannelDirectory for PortalDirectory {
    async fn lookup(&self, handle: &str) -> Result<ChannelInfo, ChatError> {
        let url = self.streamer_url(handle)?;
        tracing::info!(directory.url = %url, "Fetching channel info");

        let response = self.client.get(url.clone()).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error body".to_string());
            tracing::error!(
                directory.url = %url,
                http.status = %status,
                "Directory lookup failed"
            );
            return Err(ChatError::Directory(format!(
                "Lookup for '{}' failed (HTTP {}): {}",
                handle, status, error_body
            )));
        }

        let data = response.json::<StreamerResponse>().await?;
        tracing::info!(
            channel.id = %data.chat_channel_id,
            channel.owner = %data.streamer.wallet_address,
            "Fetched channel info"
        );
        Ok(ChannelInfo {
            channel_type: self.channel_type.clone(),
            channel_id: data.chat_channel_id,
            owner_identity: data.streamer.wallet_address.to_lowercase(),
        })
    }
}
