use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod audio;
mod bot;
mod chat;
mod commands;
mod config;
mod error;
mod giveaway;
mod leveling;
mod promotions;
mod scoring;
mod shutdown;
mod store;

use crate::audio::AudioCues;
use crate::bot::{BotDeps, BotHandle, run_scheduler};
use crate::chat::{
    ChannelRoutingProvider, ChatConnection, ConnectionStatus, Dispatcher, Outbox, PortalDirectory,
    SelfEchoFilter, StreamChatClient,
};
use crate::config::load_settings;
use crate::error::Result as AppResult;
use crate::store::{JsonFileStore, Journal};

const BOT_BUFFER_SIZE: usize = 256;

#[tokio::main]
async fn main() -> AppResult<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{}=info", env!("CARGO_PKG_NAME")).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = load_settings()?;
    tracing::info!(
        channel.handle = %settings.chat.streamer_handle,
        data_dir = %settings.storage.data_dir.display(),
        "Configuration loaded"
    );

    let directory = Arc::new(PortalDirectory::new(
        &settings.chat.directory_base_url,
        &settings.chat.channel_type,
    )?);
    let routing = ChannelRoutingProvider::new(directory, &settings.chat.streamer_handle).await?;
    let channel = routing.current().await;
    tracing::info!(channel.cid = %channel.cid(), channel.owner = %channel.owner_identity, "Channel resolved");

    let store = Arc::new(JsonFileStore::open(&settings.storage.data_dir)?);
    let journal = Journal::open(&settings.storage.data_dir)?;
    let api = Arc::new(StreamChatClient::new(
        &settings.chat.api_base_url,
        &settings.chat.api_key,
        &settings.chat.auth_token,
    )?);

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let (outbox, outbound_rx) = Outbox::channel();
    let echo = SelfEchoFilter::new(settings.dispatcher.echo_capacity);
    let dispatcher = Dispatcher::new(
        api.clone(),
        routing.clone(),
        echo.clone(),
        journal.clone(),
        settings.dispatcher.clone(),
    );
    tokio::spawn(dispatcher.run(outbound_rx));

    let audio = AudioCues::spawn(&settings.audio, shutdown_rx.clone());
    let (bot, inbound_tx) = BotHandle::new(
        settings.bot.clone(),
        &settings.giveaways,
        BotDeps {
            store,
            journal: journal.clone(),
            outbox: outbox.clone(),
            echo,
            audio,
            shutdown_tx,
        },
        BOT_BUFFER_SIZE,
    );
    tokio::spawn(run_scheduler(
        bot.clone(),
        Duration::from_secs(settings.giveaways.tick_secs),
        shutdown_rx.clone(),
    ));

    let (status_tx, mut status_rx) = watch::channel(ConnectionStatus::Disconnected {
        reason: "not started".to_string(),
    });
    let connection = ChatConnection::new(
        &settings.chat,
        settings.connection.clone(),
        api,
        routing,
        journal,
        inbound_tx,
        status_tx,
    );
    tokio::spawn(connection.run(shutdown_rx.clone()));
    tokio::spawn(async move {
        while status_rx.changed().await.is_ok() {
            let status = status_rx.borrow_and_update().clone();
            tracing::debug!(status = ?status, "Connection status changed");
        }
    });

    promotions::spawn(&settings.promotions, outbox.clone(), shutdown_rx.clone());

    tokio::select! {
        _ = shutdown::requested(&mut shutdown_rx) => {}
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            }
            tracing::info!("Ctrl-C received");
            if let Err(e) = bot.shutdown().await {
                tracing::error!(error = %e, "Bot did not shut down cleanly");
            }
        }
    }

    outbox.drain().await;
    tracing::info!("Outbound queue drained. Exiting");
    Ok(())
}
