use crate::chat::Outbox;
use crate::config::PromotionsConfig;
use std::path::Path;
use std::time::Duration;
use tokio::sync::watch;

/// Non-empty, trimmed lines of the promotions file. A missing file means no promotions.
pub fn load_promotions(path: &Path) -> Vec<String> {
    match std::fs::read_to_string(path) {
        Ok(content) => content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect(),
        Err(e) => {
            tracing::info!(promotions.file = %path.display(), error = %e, "Promotions file not readable");
            Vec::new()
        }
    }
}

/// Posts each promotion in turn, the first one right away, until shutdown.
pub async fn run_promotions(
    promotions: Vec<String>,
    every: Duration,
    outbox: Outbox,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    if promotions.is_empty() || every.is_zero() {
        return;
    }
    tracing::info!(promotions.count = promotions.len(), interval_secs = every.as_secs(), "Promotion poster started");

    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    for promotion in promotions.iter().cycle() {
        tokio::select! {
            biased;
            _ = crate::shutdown::requested(&mut shutdown_rx) => break,
            _ = interval.tick() => outbox.say(promotion.clone()),
        }
    }
    tracing::debug!("Promotion poster stopped");
}

/// Spawns the poster when promotions are enabled and the file has any.
pub fn spawn(config: &PromotionsConfig, outbox: Outbox, shutdown_rx: watch::Receiver<bool>) {
    if !config.enabled {
        tracing::info!("Promotions disabled");
        return;
    }
    let promotions = load_promotions(&config.file);
    if promotions.is_empty() {
        tracing::info!(promotions.file = %config.file.display(), "No promotions to post");
        return;
    }
    tokio::spawn(run_promotions(
        promotions,
        Duration::from_secs(config.interval_secs),
        outbox,
        shutdown_rx,
    ));
}
