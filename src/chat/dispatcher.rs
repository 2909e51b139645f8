use super::api::ChatApi;
use super::error::{ChatError, Result as ChatResult};
use super::routing::ChannelRoutingProvider;
use super::types::ChannelInfo;
use crate::config::DispatcherConfig;
use crate::store::{Direction, Journal};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc, oneshot};

#[derive(Debug)]
pub enum Outbound {
    Text(String),
    /// Acknowledged once everything queued before it has been handled.
    Drain(oneshot::Sender<()>),
}

/// Enqueue side of the outbound queue. Cloned into every component that speaks
/// to the channel.
#[derive(Clone, Debug)]
pub struct Outbox {
    tx: mpsc::UnboundedSender<Outbound>,
}

impl Outbox {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn say(&self, text: impl Into<String>) {
        if self.tx.send(Outbound::Text(text.into())).is_err() {
            tracing::warn!("Outbound dispatcher is gone, dropping message");
        }
    }

    /// Resolves once every message enqueued before this call was sent or abandoned.
    pub async fn drain(&self) {
        let (respond_to, done) = oneshot::channel();
        if self.tx.send(Outbound::Drain(respond_to)).is_err() {
            return;
        }
        let _ = done.await;
    }
}

/// Bounded set of ids the dispatcher got back for its own messages.
#[derive(Clone)]
pub struct SelfEchoFilter {
    inner: Arc<Mutex<EchoIds>>,
}

struct EchoIds {
    order: VecDeque<String>,
    ids: HashSet<String>,
    capacity: usize,
}

impl SelfEchoFilter {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(EchoIds {
                order: VecDeque::new(),
                ids: HashSet::new(),
                capacity: capacity.max(1),
            })),
        }
    }

    pub async fn record(&self, message_id: String) {
        let mut guard = self.inner.lock().await;
        if !guard.ids.insert(message_id.clone()) {
            return;
        }
        guard.order.push_back(message_id);
        while guard.order.len() > guard.capacity {
            if let Some(evicted) = guard.order.pop_front() {
                guard.ids.remove(&evicted);
            }
        }
    }

    pub async fn contains(&self, message_id: &str) -> bool {
        !message_id.is_empty() && self.inner.lock().await.ids.contains(message_id)
    }
}

/// Single consumer of the outbound queue.
pub struct Dispatcher {
    api: Arc<dyn ChatApi>,
    routing: ChannelRoutingProvider,
    echo: SelfEchoFilter,
    journal: Journal,
    config: DispatcherConfig,
}

impl Dispatcher {
    pub fn new(
        api: Arc<dyn ChatApi>,
        routing: ChannelRoutingProvider,
        echo: SelfEchoFilter,
        journal: Journal,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            api,
            routing,
            echo,
            journal,
            config,
        }
    }

    /// Runs until every `Outbox` clone has been dropped.
    pub async fn run(self, mut rx: mpsc::UnboundedReceiver<Outbound>) {
        tracing::info!(
            dispatcher.min_interval_ms = self.config.min_interval_ms,
            "Outbound dispatcher started"
        );
        while let Some(item) = rx.recv().await {
            match item {
                Outbound::Text(text) => {
                    tokio::time::sleep(self.config.min_interval()).await;
                    self.deliver(&text).await;
                }
                Outbound::Drain(respond_to) => {
                    let _ = respond_to.send(());
                }
            }
        }
        tracing::info!("Outbound queue closed. Dispatcher exiting");
    }

    async fn deliver(&self, text: &str) {
        let channel = self.routing.current().await;
        match self.attempt(&channel, text).await {
            Ok(message_id) => self.on_sent(message_id, text, false).await,
            Err(e) if e.is_unauthorized() => {
                tracing::warn!(
                    channel.cid = %channel.cid(),
                    "Send rejected as unauthorized. Refreshing routing and retrying once"
                );
                let channel = match self.routing.refresh().await {
                    Ok(channel) => channel,
                    Err(e) => {
                        tracing::error!(error = %e, "Routing refresh failed. Dropping message");
                        return;
                    }
                };
                match self.attempt(&channel, text).await {
                    Ok(message_id) => self.on_sent(message_id, text, true).await,
                    Err(e) => tracing::error!(
                        channel.cid = %channel.cid(),
                        error = %e,
                        "Retry after unauthorized also failed. Dropping message"
                    ),
                }
            }
            Err(e) => tracing::error!(
                channel.cid = %channel.cid(),
                error = %e,
                "Send failed. Dropping message"
            ),
        }
    }

    async fn attempt(&self, channel: &ChannelInfo, text: &str) -> ChatResult<Option<String>> {
        let timeout = self.config.send_timeout();
        tokio::time::timeout(timeout, self.api.send_message(channel, text))
            .await
            .map_err(|_| ChatError::Timeout(timeout))?
    }

    async fn on_sent(&self, message_id: Option<String>, text: &str, retried: bool) {
        if let Some(id) = message_id {
            self.echo.record(id).await;
        }
        let label = if retried {
            "SENT BOT MESSAGE (retry)"
        } else {
            "SENT BOT MESSAGE"
        };
        self.journal
            .raw(Direction::Send, &format!("{}: {}", label, text));
        tracing::debug!(text = %text, retried, "Bot message sent");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::testing::{FakeChatApi, ScriptedDirectory, channel};

    fn config() -> DispatcherConfig {
        DispatcherConfig {
            min_interval_ms: 10,
            send_timeout_secs: 5,
            echo_capacity: 16,
        }
    }

    struct Harness {
        outbox: Outbox,
        api: Arc<FakeChatApi>,
        directory: Arc<ScriptedDirectory>,
        echo: SelfEchoFilter,
        _dir: tempfile::TempDir,
    }

    fn spawn_dispatcher(ids: &[&str]) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let journal = Journal::open(dir.path()).unwrap();
        let api = Arc::new(FakeChatApi::default());
        let directory = Arc::new(ScriptedDirectory::new(ids));
        let routing = ChannelRoutingProvider::with_initial(directory.clone(), "streamer", channel("first"));
        let echo = SelfEchoFilter::new(16);
        let (outbox, rx) = Outbox::channel();
        let dispatcher = Dispatcher::new(api.clone(), routing, echo.clone(), journal, config());
        tokio::spawn(dispatcher.run(rx));
        Harness {
            outbox,
            api,
            directory,
            echo,
            _dir: dir,
        }
    }

    #[tokio::test]
    async fn test_sends_in_order_and_records_echo_ids() {
        let h = spawn_dispatcher(&["first"]);
        h.outbox.say("one");
        h.outbox.say("two");
        h.outbox.say("three");
        h.outbox.drain().await;

        assert_eq!(h.api.sent_texts(), vec!["one", "two", "three"]);
        assert!(h.echo.contains("srv-1").await);
        assert!(h.echo.contains("srv-3").await);
        assert!(!h.echo.contains("srv-4").await);
    }

    #[tokio::test]
    async fn test_unauthorized_refreshes_and_retries_once() {
        let h = spawn_dispatcher(&["second"]);
        h.api.fail_next_send(ChatError::Unauthorized("expired".to_string()));
        h.outbox.say("hello");
        h.outbox.drain().await;

        assert_eq!(
            h.api.sent(),
            vec![("messaging:second".to_string(), "hello".to_string())]
        );
        assert_eq!(h.directory.lookups(), 1);
    }

    #[tokio::test]
    async fn test_second_failure_drops_message_and_continues() {
        let h = spawn_dispatcher(&["second"]);
        h.api.fail_next_send(ChatError::Unauthorized("expired".to_string()));
        h.api.fail_next_send(ChatError::Unauthorized("still expired".to_string()));
        h.outbox.say("lost");
        h.outbox.say("next");
        h.outbox.drain().await;

        assert_eq!(h.api.sent_texts(), vec!["next"]);
        assert_eq!(h.directory.lookups(), 1);
    }

    #[tokio::test]
    async fn test_other_errors_are_not_retried() {
        let h = spawn_dispatcher(&["second"]);
        h.api.fail_next_send(ChatError::Api {
            status: 500,
            body: "boom".to_string(),
        });
        h.outbox.say("lost");
        h.outbox.say("next");
        h.outbox.drain().await;

        assert_eq!(h.api.sent_texts(), vec!["next"]);
        assert_eq!(h.directory.lookups(), 0);
    }

    #[tokio::test]
    async fn test_echo_filter_is_bounded() {
        let echo = SelfEchoFilter::new(2);
        echo.record("a".to_string()).await;
        echo.record("b".to_string()).await;
        echo.record("c".to_string()).await;
        assert!(!echo.contains("a").await);
        assert!(echo.contains("b").await);
        assert!(echo.contains("c").await);
        assert!(!echo.contains("").await);
    }
}
