use futures_util::{Sink, SinkExt, Stream, StreamExt};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{self, Message as WsMessage};

use super::api::ChatApi;
use super::error::{ChatError, Result as ChatResult};
use super::frame::{HEALTH_CHECK_FRAME, StreamFrame, decode_frame};
use super::routing::ChannelRoutingProvider;
use super::types::{ConnectionStatus, InboundChatMessage};
use crate::config::{ChatConfig, ConnectionConfig};
use crate::shutdown;
use crate::store::{Direction, Journal};

/// `base * 2^(attempt-1)`, capped at `max`.
pub fn backoff_delay(attempt: u32, base: Duration, max: Duration) -> Duration {
    let factor = 2u32.checked_pow(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
    base.checked_mul(factor).unwrap_or(max).min(max)
}

/// Owns the event socket for the configured channel and keeps it watching.
pub struct ChatConnection {
    ws_url: String,
    api_key: String,
    auth_token: String,
    bot_identity: String,
    config: ConnectionConfig,
    api: Arc<dyn ChatApi>,
    routing: ChannelRoutingProvider,
    journal: Journal,
    inbound_tx: mpsc::Sender<InboundChatMessage>,
    status_tx: watch::Sender<ConnectionStatus>,
}

impl ChatConnection {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        chat: &ChatConfig,
        config: ConnectionConfig,
        api: Arc<dyn ChatApi>,
        routing: ChannelRoutingProvider,
        journal: Journal,
        inbound_tx: mpsc::Sender<InboundChatMessage>,
        status_tx: watch::Sender<ConnectionStatus>,
    ) -> Self {
        Self {
            ws_url: chat.ws_url.clone(),
            api_key: chat.api_key.clone(),
            auth_token: chat.auth_token.clone(),
            bot_identity: chat.bot_identity.to_lowercase(),
            config,
            api,
            routing,
            journal,
            inbound_tx,
            status_tx,
        }
    }

    fn publish(&self, status: ConnectionStatus) {
        self.status_tx.send_replace(status);
    }

    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        tracing::info!(bot.identity = %self.bot_identity, "Chat connection task started");
        let base = Duration::from_secs(self.config.backoff_base_secs);
        let max = Duration::from_secs(self.config.backoff_max_secs);
        let mut attempt = 0u32;

        loop {
            if shutdown::is_raised(&shutdown_rx) {
                break;
            }
            attempt = attempt.saturating_add(1);
            self.publish(ConnectionStatus::Connecting { attempt });

            let reason = tokio::select! {
                _ = shutdown::requested(&mut shutdown_rx) => {
                    tracing::info!("Shutdown signal received. Closing chat connection");
                    break;
                }
                result = self.run_session(attempt) => match result {
                    Ok(()) => "Connection closed gracefully".to_string(),
                    Err(e) => {
                        tracing::warn!(attempt, error = %e, "Chat connection failed");
                        e.to_string()
                    }
                },
            };

            if self.inbound_tx.is_closed() {
                tracing::error!("Bot engine is gone. Chat connection loop shutting down");
                break;
            }

            self.publish(ConnectionStatus::Disconnected {
                reason: reason.clone(),
            });
            let delay = backoff_delay(attempt, base, max);
            self.publish(ConnectionStatus::Reconnecting {
                reason,
                failed_attempt: attempt,
                retry_in: delay,
            });
            tracing::info!(attempt, delay = ?delay, "Reconnecting after delay");

            tokio::select! {
                _ = shutdown::requested(&mut shutdown_rx) => {
                    tracing::info!("Shutdown signal received during reconnect delay");
                    break;
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }

        self.publish(ConnectionStatus::Terminated);
        tracing::info!("Chat connection task finished");
    }

    fn connect_url(&self) -> ChatResult<String> {
        let handshake = json!({
            "user_id": self.bot_identity,
            "user_details": { "id": self.bot_identity },
            "client_request_id": format!("prizebot-{}", self.bot_identity),
        })
        .to_string();
        let url = reqwest::Url::parse_with_params(
            &self.ws_url,
            &[
                ("json", handshake.as_str()),
                ("api_key", self.api_key.as_str()),
                ("authorization", self.auth_token.as_str()),
                ("stream-auth-type", "jwt"),
            ],
        )
        .map_err(|e| ChatError::Connection(format!("Invalid socket URL: {}", e)))?;
        Ok(url.into())
    }

    async fn run_session(&self, attempt: u32) -> ChatResult<()> {
        let url = self.connect_url()?;
        let connect_timeout = Duration::from_secs(self.config.connect_timeout_secs);
        tracing::info!(attempt, "Connecting to chat event socket");

        let (socket, _response) = tokio::time::timeout(connect_timeout, connect_async(url))
            .await
            .map_err(|_| ChatError::Timeout(connect_timeout))??;
        let (sink, stream) = socket.split();
        self.drive_session(sink, stream).await
    }

    /// Reads frames until the socket closes or the keep-alive fails.
    async fn drive_session<S, St>(&self, sink: S, mut stream: St) -> ChatResult<()>
    where
        S: Sink<WsMessage, Error = tungstenite::Error> + Unpin,
        St: Stream<Item = Result<WsMessage, tungstenite::Error>> + Unpin,
    {
        let keepalive = keepalive_loop(
            sink,
            Duration::from_secs(self.config.keepalive_secs),
            self.journal.clone(),
        );
        tokio::pin!(keepalive);

        let mut connection_id: Option<String> = None;
        loop {
            tokio::select! {
                result = &mut keepalive => {
                    let reason = match result {
                        Err(e) => e.to_string(),
                        Ok(()) => "keep-alive stopped".to_string(),
                    };
                    return Err(ChatError::Connection(format!("Keep-alive failed: {}", reason)));
                }
                frame = stream.next() => match frame {
                    None => return Ok(()),
                    Some(Err(e)) => return Err(e.into()),
                    Some(Ok(WsMessage::Text(text))) => {
                        self.handle_text(text.as_str(), &mut connection_id).await?;
                    }
                    Some(Ok(WsMessage::Close(frame))) => {
                        tracing::info!(close = ?frame, "Chat service closed the socket");
                        return Ok(());
                    }
                    Some(Ok(_)) => {}
                },
            }
        }
    }

    async fn handle_text(&self, text: &str, connection_id: &mut Option<String>) -> ChatResult<()> {
        self.journal.raw(Direction::Recv, text);

        let frame = match decode_frame(text) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::debug!(error = %e, "Skipping undecodable frame");
                return Ok(());
            }
        };

        match frame {
            StreamFrame::ConnectionEstablished { connection_id: id } if connection_id.is_none() => {
                tracing::info!(connection.id = %id, "Chat socket authenticated");
                self.publish(ConnectionStatus::Authenticated {
                    connection_id: id.clone(),
                });
                self.watch(&id).await;
                *connection_id = Some(id);
            }
            StreamFrame::NewMessage(message) => {
                if connection_id.is_none() {
                    return Ok(());
                }
                let expected = self.routing.current().await.cid();
                if message.cid != expected {
                    tracing::trace!(message.cid = %message.cid, "Ignoring event for another channel");
                    return Ok(());
                }
                self.inbound_tx
                    .send(message)
                    .await
                    .map_err(|_| ChatError::ActorComm("Bot engine inbox closed".to_string()))?;
            }
            _ => {}
        }
        Ok(())
    }

    async fn watch(&self, connection_id: &str) {
        let channel = self.routing.current().await;
        match self.api.watch_channel(&channel, connection_id).await {
            Ok(()) => {
                tracing::info!(channel.cid = %channel.cid(), "Watching channel");
                self.publish(ConnectionStatus::Watching);
            }
            Err(e) if e.is_unauthorized() => {
                tracing::warn!(
                    channel.cid = %channel.cid(),
                    error = %e,
                    "Watch request unauthorized. Refreshing routing"
                );
                let _ = self.routing.refresh().await;
            }
            Err(e) => {
                tracing::error!(channel.cid = %channel.cid(), error = %e, "Watch request failed");
            }
        }
    }
}

async fn keepalive_loop<S>(mut sink: S, every: Duration, journal: Journal) -> ChatResult<()>
where
    S: Sink<WsMessage, Error = tungstenite::Error> + Unpin,
{
    loop {
        tokio::time::sleep(every).await;
        sink.send(WsMessage::Text(HEALTH_CHECK_FRAME.into())).await?;
        journal.raw(Direction::Send, HEALTH_CHECK_FRAME);
        tracing::trace!("Sent health check");
    }
}
