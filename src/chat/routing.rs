use super::directory::ChannelDirectory;
use super::error::ChatError;
use super::types::ChannelInfo;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared view of the channel routing. The dispatcher and the connection manager
/// both refresh it when the chat service rejects the current routing.
#[derive(Clone)]
pub struct ChannelRoutingProvider {
    current: Arc<RwLock<ChannelInfo>>,
    directory: Arc<dyn ChannelDirectory>,
    handle: Arc<str>,
}

impl ChannelRoutingProvider {
    /// Performs the initial lookup. A failure here is fatal for startup.
    pub async fn new(
        directory: Arc<dyn ChannelDirectory>,
        handle: &str,
    ) -> Result<Self, ChatError> {
        let initial = directory.lookup(handle).await?;
        Ok(Self::with_initial(directory, handle, initial))
    }

    pub fn with_initial(
        directory: Arc<dyn ChannelDirectory>,
        handle: &str,
        initial: ChannelInfo,
    ) -> Self {
        Self {
            current: Arc::new(RwLock::new(initial)),
            directory,
            handle: Arc::from(handle),
        }
    }

    pub async fn current(&self) -> ChannelInfo {
        self.current.read().await.clone()
    }

    pub async fn refresh(&self) -> Result<ChannelInfo, ChatError> {
        tracing::info!(directory.handle = %self.handle, "Refreshing channel routing");
        match self.directory.lookup(&self.handle).await {
            Ok(info) => {
                let mut guard = self.current.write().await;
                if *guard != info {
                    tracing::warn!(
                        channel.old = %guard.cid(),
                        channel.new = %info.cid(),
                        "Channel routing changed"
                    );
                }
                *guard = info.clone();
                Ok(info)
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to refresh channel routing");
                Err(e)
            }
        }
    }
}
