use crate::audio::AudioCues;
use crate::chat::{InboundChatMessage, Outbox, SelfEchoFilter};
use crate::commands::{self, OperatorCommand, UserCommand};
use crate::config::{BotConfig, GiveawayConfig};
use crate::error::{AppError, Result as AppResult};
use crate::giveaway::{CountdownEvent, CountdownRegistry, GiveawayBook, ScheduledAction};
use crate::leveling::{UserTable, level_up_notice, rank_reply};
use crate::scoring::{CHAT_XP, ChatXpThrottle, DonationLedger, detect_donation};
use crate::store::{Journal, MessageEvent, Store};
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;

/// Level jumps longer than this are announced once, at the final level.
const MAX_LEVEL_UP_NOTICES: usize = 10;

#[derive(Debug)]
pub enum BotMessage {
    SchedulerTick { now: DateTime<Utc> },
    Countdown(CountdownEvent),
    Shutdown { respond_to: oneshot::Sender<()> },
}

impl From<CountdownEvent> for BotMessage {
    fn from(event: CountdownEvent) -> Self {
        BotMessage::Countdown(event)
    }
}

/// Collaborators the bot shares with the rest of the process.
pub struct BotDeps {
    pub store: Arc<dyn Store>,
    pub journal: Journal,
    pub outbox: Outbox,
    pub echo: SelfEchoFilter,
    pub audio: AudioCues,
    pub shutdown_tx: watch::Sender<bool>,
}

#[derive(Clone, Debug)]
pub struct BotHandle {
    sender: mpsc::Sender<BotMessage>,
}

impl BotHandle {
    /// Spawns the bot actor. Returns its handle and the sender the connection
    /// forwards inbound chat into.
    pub fn new(
        config: BotConfig,
        giveaway_config: &GiveawayConfig,
        deps: BotDeps,
        buffer_size: usize,
    ) -> (Self, mpsc::Sender<InboundChatMessage>) {
        let (sender, control_rx) = mpsc::channel(buffer_size);
        let (chat_tx, chat_rx) = mpsc::channel(buffer_size);
        let actor = BotActor::new(
            config,
            giveaway_config,
            deps,
            control_rx,
            chat_rx,
            sender.clone(),
        );
        tokio::spawn(run_bot_actor(actor));
        (Self { sender }, chat_tx)
    }

    pub async fn tick(&self, now: DateTime<Utc>) -> AppResult<()> {
        self.sender
            .send(BotMessage::SchedulerTick { now })
            .await
            .map_err(|e| AppError::Bot(format!("Failed to send SchedulerTick to bot: {}", e)))
    }

    /// Announces shutdown, saves every table and raises the shutdown signal.
    pub async fn shutdown(&self) -> AppResult<()> {
        let (respond_to, done) = oneshot::channel();
        self.sender
            .send(BotMessage::Shutdown { respond_to })
            .await
            .map_err(|e| AppError::Bot(format!("Failed to send Shutdown to bot: {}", e)))?;
        done.await
            .map_err(|e| AppError::Bot(format!("Bot failed to respond to Shutdown: {}", e)))
    }
}

/// Sends a scheduler tick every `every` until shutdown.
pub async fn run_scheduler(handle: BotHandle, every: Duration, mut shutdown_rx: watch::Receiver<bool>) {
    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            biased;
            _ = crate::shutdown::requested(&mut shutdown_rx) => break,
            _ = interval.tick() => {
                if let Err(e) = handle.tick(Utc::now()).await {
                    tracing::warn!(error = %e, "Scheduler lost the bot");
                    break;
                }
            }
        }
    }
    tracing::debug!("Scheduler stopped");
}

/// Sole owner of users, giveaways, operators, the ignore list and donations.
struct BotActor {
    control_rx: mpsc::Receiver<BotMessage>,
    chat_rx: mpsc::Receiver<InboundChatMessage>,
    config: BotConfig,
    users: UserTable,
    book: GiveawayBook,
    admins: BTreeSet<String>,
    ignored: BTreeSet<String>,
    donations: DonationLedger,
    throttle: ChatXpThrottle,
    countdowns: CountdownRegistry<BotMessage>,
    store: Arc<dyn Store>,
    journal: Journal,
    outbox: Outbox,
    echo: SelfEchoFilter,
    audio: AudioCues,
    shutdown_tx: watch::Sender<bool>,
    stopped: bool,
}

impl BotActor {
    fn new(
        config: BotConfig,
        giveaway_config: &GiveawayConfig,
        deps: BotDeps,
        control_rx: mpsc::Receiver<BotMessage>,
        chat_rx: mpsc::Receiver<InboundChatMessage>,
        self_sender: mpsc::Sender<BotMessage>,
    ) -> Self {
        let BotDeps {
            store,
            journal,
            outbox,
            echo,
            audio,
            shutdown_tx,
        } = deps;

        let users = store.load_users();
        let mut admins = store.load_admins();
        admins.extend(config.bootstrap_admins.iter().cloned());
        let ignored = store.load_ignored();
        let donations = store.load_donations();
        let book = GiveawayBook::load(
            store.clone(),
            journal.clone(),
            outbox.clone(),
            giveaway_config,
        );
        tracing::info!(
            users.count = users.len(),
            admins.count = admins.len(),
            ignored.count = ignored.len(),
            "Bot state loaded"
        );

        Self {
            control_rx,
            chat_rx,
            config,
            users,
            book,
            admins,
            ignored,
            donations,
            throttle: ChatXpThrottle::default(),
            countdowns: CountdownRegistry::new(self_sender),
            store,
            journal,
            outbox,
            echo,
            audio,
            shutdown_tx,
            stopped: false,
        }
    }

    async fn handle_control(&mut self, message: BotMessage) {
        match message {
            BotMessage::SchedulerTick { now } => self.on_tick(now).await,
            BotMessage::Countdown(CountdownEvent::Step {
                giveaway_id,
                run_id,
                remaining,
                respond_to,
            }) => {
                let keep_going = self.countdowns.is_current(giveaway_id, run_id)
                    && self.book.announce_countdown(giveaway_id, remaining);
                if !keep_going {
                    self.countdowns.finish(giveaway_id, run_id);
                }
                let _ = respond_to.send(keep_going);
            }
            BotMessage::Countdown(CountdownEvent::Elapsed {
                giveaway_id,
                run_id,
            }) => {
                if !self.countdowns.finish(giveaway_id, run_id) {
                    tracing::debug!(giveaway.id = %giveaway_id, countdown.run = %run_id, "Ignoring stale countdown");
                    return;
                }
                let entry_token = self
                    .book
                    .find_by_id(giveaway_id)
                    .filter(|giveaway| giveaway.is_active())
                    .map(|giveaway| giveaway.entry_token.clone());
                if let Some(entry_token) = entry_token {
                    if let Err(e) = self.book.end(&entry_token, Utc::now()) {
                        tracing::warn!(giveaway.entry = %entry_token, error = %e, "Countdown could not end giveaway");
                    }
                }
            }
            BotMessage::Shutdown { respond_to } => {
                self.shut_down().await;
                let _ = respond_to.send(());
            }
        }
    }

    async fn on_tick(&mut self, now: DateTime<Utc>) {
        for action in self.book.scan(now) {
            match action {
                ScheduledAction::StartCountdown {
                    giveaway_id,
                    seconds,
                } => {
                    self.countdowns.start(giveaway_id, seconds).await;
                }
                ScheduledAction::End {
                    giveaway_id,
                    entry_token,
                } => {
                    self.countdowns.stop(giveaway_id).await;
                    if let Err(e) = self.book.end(&entry_token, now) {
                        tracing::warn!(giveaway.entry = %entry_token, error = %e, "Scheduled end failed");
                    }
                }
            }
        }
    }

    fn is_ignored(&self, identity: &str, name: &str) -> bool {
        self.ignored.contains(identity)
            || (!name.is_empty() && self.ignored.contains(&format!("@{}", name.to_lowercase())))
    }

    async fn handle_chat(&mut self, message: InboundChatMessage) {
        let identity = message.sender_identity.to_lowercase();
        let name = message.sender_name.trim().to_string();
        if identity.is_empty() || self.is_ignored(&identity, &name) {
            tracing::trace!(chat.sender = %identity, "Ignoring message");
            return;
        }

        self.journal.message_event(&MessageEvent {
            timestamp: message.received_at,
            message_id: &message.message_id,
            identity: &identity,
            name: &name,
            content: &message.text,
        });

        if self.echo.contains(&message.message_id).await {
            tracing::trace!(chat.message_id = %message.message_id, "Skipping own message");
            return;
        }

        self.score(&identity, &name, &message);

        if self.admins.contains(&identity) {
            match commands::parse_operator_command(&message.text) {
                Ok(Some(command)) => self.run_operator_command(&identity, command).await,
                Ok(None) => {}
                Err(e) => self.outbox.say(e.to_string()),
            }
            if self.stopped {
                return;
            }
        }

        match commands::parse_user_command(&message.text) {
            Ok(Some(command)) => self.run_user_command(&identity, &name, command),
            Ok(None) => {}
            Err(e) => self.outbox.say(e.to_string()),
        }
    }

    /// Donation XP or spaced chat XP, never both for one message.
    fn score(&mut self, identity: &str, name: &str, message: &InboundChatMessage) {
        let known_users = self.users.len();
        self.users.get_or_create(identity, name);

        let donation = detect_donation(message.pinned, &message.text, &self.config.donation_unit)
            .filter(|&amount| amount > 0);
        let awarded = match donation {
            Some(amount) => {
                self.donations.record(identity, amount);
                tracing::info!(
                    chat.sender = %identity,
                    amount,
                    total = self.donations.total_for(identity),
                    "Donation received"
                );
                if let Err(e) = self.store.save_donations(&self.donations) {
                    tracing::error!(error = %e, "Failed to save donations");
                }
                self.audio.donation(amount);
                self.throttle.observe(identity, Instant::now());
                amount
            }
            None if self.throttle.observe(identity, Instant::now()) => CHAT_XP,
            None => 0,
        };

        let reached = if awarded > 0 {
            self.users.award_xp(identity, awarded)
        } else {
            0..0
        };
        if awarded > 0 || self.users.len() != known_users {
            self.save_users();
        }
        if let Some(user) = self.users.get(identity) {
            if reached.len() > MAX_LEVEL_UP_NOTICES {
                tracing::info!(chat.sender = %identity, levels = reached.len(), "Large level jump announced once");
                self.outbox.say(level_up_notice(user.name(), user.level));
            } else {
                for level in reached {
                    self.outbox.say(level_up_notice(user.name(), level));
                }
            }
        }
    }

    async fn run_operator_command(&mut self, identity: &str, command: OperatorCommand) {
        let now = Utc::now();
        tracing::info!(operator = %identity, command = ?command, "Operator command");
        match command {
            OperatorCommand::AddAdmin(target) => {
                self.admins.insert(target.clone());
                self.save_admins();
                self.outbox.say(format!("Added admin {}.", target));
            }
            OperatorCommand::RemoveAdmin(target) => {
                if self.admins.remove(&target) {
                    self.save_admins();
                    self.outbox.say(format!("Removed admin {}.", target));
                } else {
                    self.outbox.say(format!("{} is not an admin.", target));
                }
            }
            OperatorCommand::Ignore(target) => {
                self.ignored.insert(target.clone());
                if let Err(e) = self.store.save_ignored(&self.ignored) {
                    tracing::error!(error = %e, "Failed to save ignore list");
                }
                self.outbox.say(format!(
                    "'{}' has been added to the blacklist and will be ignored.",
                    target
                ));
            }
            OperatorCommand::CreatePrizeList { name, prizes } => {
                if let Err(e) = self.book.create_prize_list(&name, prizes) {
                    tracing::debug!(error = %e, "Prize list rejected");
                }
            }
            OperatorCommand::CreateGiveaway(request) => match self.book.create(identity, request, now) {
                Ok(created) => {
                    if let Some(replaced) = created.replaced {
                        self.countdowns.stop(replaced).await;
                    }
                }
                Err(e) => tracing::debug!(error = %e, "Giveaway rejected"),
            },
            OperatorCommand::EndGiveaway { entry_token } => {
                let running = self
                    .book
                    .get(&entry_token)
                    .filter(|giveaway| giveaway.is_active())
                    .map(|giveaway| giveaway.id);
                if let Some(id) = running {
                    self.countdowns.stop(id).await;
                }
                if let Err(e) = self.book.end(&entry_token, now) {
                    tracing::debug!(error = %e, "End rejected");
                }
            }
            OperatorCommand::SetEndIn {
                entry_token,
                seconds,
            } => match self.book.set_end_in(&entry_token, seconds, now) {
                Ok(id) => {
                    self.countdowns.stop(id).await;
                }
                Err(e) => tracing::debug!(error = %e, "Reschedule rejected"),
            },
            OperatorCommand::CancelGiveaway { entry_token } => {
                match self.book.cancel(&entry_token, now) {
                    Ok(id) => {
                        self.countdowns.stop(id).await;
                    }
                    Err(e) => tracing::debug!(error = %e, "Cancel rejected"),
                }
            }
            OperatorCommand::Shutdown => self.shut_down().await,
        }
    }

    fn run_user_command(&mut self, identity: &str, name: &str, command: UserCommand) {
        match command {
            UserCommand::Rank => {
                if let Some(user) = self.users.get(identity) {
                    self.outbox.say(rank_reply(user, self.users.rank(identity)));
                }
            }
            UserCommand::TimeLeft { entry_token } => {
                self.book.report_time_left(&entry_token, Utc::now());
            }
            UserCommand::Winners { entry_token } => {
                self.book.report_winners(&entry_token);
            }
            UserCommand::Enter { entry_token } => {
                let level = self.users.level_of(identity);
                self.book
                    .enter(identity, name, level, &entry_token, Utc::now());
            }
        }
    }

    fn save_users(&self) {
        if let Err(e) = self.store.save_users(&self.users) {
            tracing::error!(error = %e, "Failed to save users");
        }
    }

    fn save_admins(&self) {
        if let Err(e) = self.store.save_admins(&self.admins) {
            tracing::error!(error = %e, "Failed to save admins");
        }
    }

    async fn shut_down(&mut self) {
        if self.stopped {
            return;
        }
        self.outbox.say(format!(
            "The {} XP / Prize bot is shutting down...",
            self.config.display_name
        ));
        tracing::info!(countdowns.running = self.countdowns.len(), "Stopping countdowns");
        self.countdowns.stop_all().await;

        self.save_admins();
        if let Err(e) = self.store.save_ignored(&self.ignored) {
            tracing::error!(error = %e, "Failed to save ignore list");
        }
        self.save_users();
        if let Err(e) = self.store.save_donations(&self.donations) {
            tracing::error!(error = %e, "Failed to save donations");
        }
        self.book.save();

        self.stopped = true;
        self.shutdown_tx.send_replace(true);
        tracing::info!("Shutdown requested");
    }
}

async fn run_bot_actor(mut actor: BotActor) {
    actor.outbox.say(format!(
        "The {} XP / Prize bot is starting up!",
        actor.config.display_name
    ));
    tracing::info!("Bot actor started");

    while !actor.stopped {
        tokio::select! {
            biased;
            Some(message) = actor.control_rx.recv() => actor.handle_control(message).await,
            Some(message) = actor.chat_rx.recv() => actor.handle_chat(message).await,
            else => break,
        }
    }

    actor.countdowns.stop_all().await;
    tracing::info!("Bot actor stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::dispatcher::Outbound;
    use crate::store::JsonFileStore;

    struct Harness {
        handle: BotHandle,
        chat_tx: mpsc::Sender<InboundChatMessage>,
        rx: mpsc::UnboundedReceiver<Outbound>,
        shutdown_rx: watch::Receiver<bool>,
        store: Arc<JsonFileStore>,
        echo: SelfEchoFilter,
        next_id: u32,
        _dir: tempfile::TempDir,
    }

    impl Harness {
        async fn start() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let store = Arc::new(JsonFileStore::open(dir.path()).unwrap());
            let journal = Journal::open(dir.path()).unwrap();
            let (outbox, rx) = Outbox::channel();
            let (shutdown_tx, shutdown_rx) = watch::channel(false);
            let echo = SelfEchoFilter::new(16);
            let config = BotConfig {
                display_name: "Prize".to_string(),
                donation_unit: "PENGU".to_string(),
                bootstrap_admins: BTreeSet::from(["0xadmin".to_string()]),
            };
            let deps = BotDeps {
                store: store.clone(),
                journal,
                outbox,
                echo: echo.clone(),
                audio: AudioCues::disabled(),
                shutdown_tx,
            };
            let (handle, chat_tx) = BotHandle::new(config, &GiveawayConfig::default(), deps, 32);
            let mut harness = Self {
                handle,
                chat_tx,
                rx,
                shutdown_rx,
                store,
                echo,
                next_id: 0,
                _dir: dir,
            };
            assert_eq!(harness.next_text().await, "The Prize XP / Prize bot is starting up!");
            harness
        }

        async fn send_as(&mut self, identity: &str, name: &str, text: &str, pinned: bool) -> String {
            self.next_id += 1;
            let message_id = format!("msg-{}", self.next_id);
            self.chat_tx
                .send(InboundChatMessage {
                    cid: "messaging:test".to_string(),
                    message_id: message_id.clone(),
                    sender_identity: identity.to_string(),
                    sender_name: name.to_string(),
                    text: text.to_string(),
                    pinned,
                    received_at: Utc::now(),
                })
                .await
                .unwrap();
            message_id
        }

        async fn send(&mut self, identity: &str, name: &str, text: &str) {
            self.send_as(identity, name, text, false).await;
        }

        async fn next_text(&mut self) -> String {
            loop {
                match self.rx.recv().await {
                    Some(Outbound::Text(text)) => return text,
                    Some(Outbound::Drain(respond_to)) => {
                        let _ = respond_to.send(());
                    }
                    None => panic!("outbox closed"),
                }
            }
        }

        async fn create_foam(&mut self) {
            self.send("0xadmin", "boss", "!creategiveaway, Foam, !foam, 0.1")
                .await;
            assert_eq!(
                self.next_text().await,
                "New GA 'Foam' created with entry '!foam'. (Min level: 1)"
            );
            self.send("0xa", "alice", "!foam").await;
            assert_eq!(self.next_text().await, "alice entered GA Foam.");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_chat_xp_is_spaced_per_identity() {
        let mut h = Harness::start().await;
        h.send("0xA", "alice", "hello").await;
        tokio::time::sleep(Duration::from_millis(300)).await;
        h.send("0xa", "alice", "hello again").await;
        tokio::time::sleep(Duration::from_millis(300)).await;
        h.send("0xa", "alice", "!rank").await;

        assert_eq!(h.next_text().await, "alice: Rank #1, Level 1, XP: 1/155");
        assert_eq!(h.store.load_users().get("0xa").unwrap().xp, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_donation_awards_amount() {
        let mut h = Harness::start().await;
        h.send_as("0xb", "bob", "Tipped 250 PENGU — thanks!", true)
            .await;
        assert_eq!(h.next_text().await, "Congrats bob! You leveled up to level 2!");

        h.send("0xb", "bob", "!rank").await;
        assert_eq!(h.next_text().await, "bob: Rank #1, Level 2, XP: 96/220");
        assert_eq!(h.store.load_donations().total_for("0xb"), 250);
        assert_eq!(h.store.load_users().get("0xb").unwrap().xp, 251);
    }

    #[tokio::test(start_paused = true)]
    async fn test_donation_restarts_chat_spacing() {
        let mut h = Harness::start().await;
        h.send_as("0xb", "bob", "tipped 5 PENGU", true).await;
        tokio::time::sleep(Duration::from_millis(300)).await;
        h.send("0xb", "bob", "thanks all").await;
        tokio::time::sleep(Duration::from_millis(300)).await;
        h.send("0xb", "bob", "!rank").await;

        assert_eq!(h.next_text().await, "bob: Rank #1, Level 1, XP: 5/155");
        assert_eq!(h.store.load_users().get("0xb").unwrap().xp, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_saturating_donation_is_announced_once() {
        let mut h = Harness::start().await;
        h.send_as("0xb", "bob", "tipped 18446744073709551615 PENGU", true)
            .await;
        assert_eq!(
            h.next_text().await,
            "Congrats bob! You leveled up to level 2228552!"
        );

        h.send("0xb", "bob", "!rank").await;
        assert_eq!(
            h.next_text().await,
            "bob: Rank #1, Level 2228552, XP: 1084693956335/24832331511220"
        );
        assert_eq!(h.store.load_users().get("0xb").unwrap().xp, u64::MAX);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduled_giveaway_counts_down_and_ends() {
        let mut h = Harness::start().await;
        h.create_foam().await;

        h.handle
            .tick(Utc::now() + chrono::TimeDelta::seconds(7))
            .await
            .unwrap();
        for i in (1..=10).rev() {
            assert_eq!(h.next_text().await, format!("Foam winner(s) picked in {}..", i));
        }
        assert_eq!(h.next_text().await, "GA 'Foam' ended! Winners: alice");

        h.send("0xc", "carol", "!winners !foam").await;
        assert_eq!(h.next_text().await, "Foam winners => alice");
        assert!(!h.store.load_giveaways()["!foam"].is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_countdown() {
        let mut h = Harness::start().await;
        h.create_foam().await;

        h.handle
            .tick(Utc::now() + chrono::TimeDelta::seconds(7))
            .await
            .unwrap();
        assert_eq!(h.next_text().await, "Foam winner(s) picked in 10..");
        h.send("0xadmin", "boss", "!cancelgiveaway !foam").await;
        assert_eq!(h.next_text().await, "Canceled GA Foam.");
        h.send("0xa", "alice", "!winners !foam").await;
        assert_eq!(h.next_text().await, "No giveaway found for !foam.");

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(h.rx.try_recv().is_err());
        assert!(h.store.load_giveaways().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_operator_commands_need_operator() {
        let mut h = Harness::start().await;
        h.send("0xa", "alice", "!addadmin 0xa").await;
        h.send("0xa", "alice", "!cancelgiveaway").await;
        h.send("0xadmin", "boss", "!cancelgiveaway").await;
        assert_eq!(h.next_text().await, "Usage: !cancelgiveaway !entry");

        h.send("0xadmin", "boss", "!addadmin 0xA").await;
        assert_eq!(h.next_text().await, "Added admin 0xa.");
        h.send("0xa", "alice", "!removeadmin 0xnobody").await;
        assert_eq!(h.next_text().await, "0xnobody is not an admin.");
        assert!(h.store.load_admins().contains("0xa"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ignored_and_echoed_messages_are_dropped() {
        let mut h = Harness::start().await;
        h.send("0xadmin", "boss", "!blacklist @Spammer").await;
        assert_eq!(
            h.next_text().await,
            "'@spammer' has been added to the blacklist and will be ignored."
        );

        h.echo.record("msg-2".to_string()).await;
        h.send("0xbot", "Prize", "!rank").await;
        h.send("0xs", "Spammer", "!rank").await;
        h.send("0xc", "carol", "!rank").await;
        assert_eq!(h.next_text().await, "carol: Rank #2, Level 1, XP: 1/155");
        assert!(h.store.load_users().get("0xs").is_none());
        assert!(h.store.load_users().get("0xbot").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_command_saves_and_signals() {
        let mut h = Harness::start().await;
        h.create_foam().await;
        h.send("0xadmin", "boss", "!shutdown").await;
        assert_eq!(h.next_text().await, "The Prize XP / Prize bot is shutting down...");

        h.shutdown_rx.wait_for(|stop| *stop).await.unwrap();
        assert!(h.store.load_giveaways()["!foam"].is_active());
        assert!(h.store.load_admins().contains("0xadmin"));
        assert_eq!(h.store.load_users().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_through_handle() {
        let mut h = Harness::start().await;
        h.handle.shutdown().await.unwrap();
        assert_eq!(h.next_text().await, "The Prize XP / Prize bot is shutting down...");
        assert!(crate::shutdown::is_raised(&h.shutdown_rx));
    }
}
