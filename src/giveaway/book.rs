use super::draw::{pick_winner_indices, take_prize};
use super::{Entry, Giveaway, GiveawayError, GiveawayStatus, Result as GiveawayResult, Winner};
use crate::chat::Outbox;
use crate::commands::is_reserved_token;
use crate::config::GiveawayConfig;
use crate::store::{GiveawayTable, Journal, Store, is_valid_prize_list_name};
use chrono::{DateTime, TimeDelta, Utc};
use rand::rngs::OsRng;
use rand::{CryptoRng, Rng};
use std::collections::BTreeSet;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub struct CreateGiveaway {
    pub name: String,
    pub entry_token: String,
    /// Fractional minutes until auto-end; `None` means the giveaway only ends by command.
    pub minutes: Option<f64>,
    pub whitelist: Option<String>,
    pub prize_list: Option<String>,
    pub winner_count: u32,
    pub min_level: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryOutcome {
    Entered,
    NotWhitelisted,
    /// No live giveaway, level too low, or already entered.
    Ignored,
}

/// Time-driven transitions found by [`GiveawayBook::scan`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduledAction {
    StartCountdown { giveaway_id: Uuid, seconds: u64 },
    End { giveaway_id: Uuid, entry_token: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Created {
    pub id: Uuid,
    /// The giveaway that used the same entry token before, now discarded.
    pub replaced: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Concluded {
    pub id: Uuid,
    pub winners: Vec<Winner>,
}

/// Owns every giveaway, keyed by entry token. Each mutation is written through to
/// the store before its notice is queued.
pub struct GiveawayBook {
    giveaways: GiveawayTable,
    store: Arc<dyn Store>,
    journal: Journal,
    outbox: Outbox,
    warning_thresholds: Vec<u64>,
    final_countdown_secs: u64,
}

fn window_end(now: DateTime<Utc>, window_ms: i64) -> Option<DateTime<Utc>> {
    TimeDelta::try_milliseconds(window_ms).and_then(|delta| now.checked_add_signed(delta))
}

fn split_hms(total_secs: i64) -> (i64, i64, i64) {
    let total = total_secs.max(0);
    (total / 3600, (total % 3600) / 60, total % 60)
}

impl GiveawayBook {
    pub fn load(
        store: Arc<dyn Store>,
        journal: Journal,
        outbox: Outbox,
        config: &GiveawayConfig,
    ) -> Self {
        let giveaways = store.load_giveaways();
        tracing::info!(giveaways.count = giveaways.len(), "Loaded giveaways");
        Self {
            giveaways,
            store,
            journal,
            outbox,
            warning_thresholds: config.warning_thresholds_secs(),
            final_countdown_secs: config.final_countdown_secs,
        }
    }

    pub fn get(&self, entry_token: &str) -> Option<&Giveaway> {
        self.giveaways.get(&entry_token.to_lowercase())
    }

    pub fn find_by_id(&self, id: Uuid) -> Option<&Giveaway> {
        self.giveaways.values().find(|giveaway| giveaway.id == id)
    }

    pub fn save(&self) {
        if let Err(e) = self.store.save_giveaways(&self.giveaways) {
            tracing::error!(error = %e, "Failed to save giveaways");
        }
    }

    fn reject<T>(&self, error: GiveawayError) -> GiveawayResult<T> {
        self.outbox.say(error.to_string());
        Err(error)
    }

    /// Thresholds longer than the window would be announced falsely, so they start out fired.
    fn presuppressed_warnings(&self, window_ms: i64) -> BTreeSet<u64> {
        self.warning_thresholds
            .iter()
            .copied()
            .filter(|&threshold| i128::from(window_ms) < i128::from(threshold) * 1000)
            .collect()
    }

    pub fn create(
        &mut self,
        creator: &str,
        request: CreateGiveaway,
        now: DateTime<Utc>,
    ) -> GiveawayResult<Created> {
        let name = request.name.trim();
        let typed_token = request.entry_token.trim();
        let entry_token = typed_token.to_lowercase();
        if name.is_empty() || !entry_token.starts_with('!') || entry_token.len() < 2 {
            return self.reject(GiveawayError::InvalidDefinition);
        }
        if is_reserved_token(&entry_token) {
            return self.reject(GiveawayError::ReservedToken(typed_token.to_string()));
        }

        let replaced = self.giveaways.remove(&entry_token).map(|old| {
            tracing::info!(giveaway.entry = %entry_token, giveaway.id = %old.id, "Replacing giveaway");
            self.journal.giveaway_activity(&format!(
                "Auto-cancel GA with entry={} replaced by new one.",
                entry_token
            ));
            old.id
        });

        let (ends_at, warned_for) = match request.minutes.filter(|m| m.is_finite()) {
            Some(minutes) => {
                let window_ms = (minutes * 60_000.0).round() as i64;
                match window_end(now, window_ms) {
                    Some(end) => (Some(end), self.presuppressed_warnings(window_ms)),
                    None => (None, BTreeSet::new()),
                }
            }
            None => (None, BTreeSet::new()),
        };

        let min_level = request.min_level.max(1);
        let giveaway = Giveaway {
            id: Uuid::new_v4(),
            name: name.to_string(),
            entry_token: entry_token.clone(),
            created_at: now,
            creator: creator.to_string(),
            whitelist: request.whitelist,
            prize_list: request.prize_list,
            winner_count: request.winner_count,
            min_level,
            entries: Vec::new(),
            ends_at,
            status: GiveawayStatus::Active {
                warned_for,
                in_final_countdown: false,
            },
        };
        let id = giveaway.id;
        let notice = format!(
            "New GA '{}' created with entry '{}'. (Min level: {})",
            giveaway.name, entry_token, min_level
        );
        self.journal.giveaway_activity(&format!(
            "Created GA: name='{}', entry='{}', uuid={}",
            giveaway.name, entry_token, id
        ));
        tracing::info!(giveaway.entry = %entry_token, giveaway.id = %id, ends_at = ?ends_at, "Giveaway created");

        self.giveaways.insert(entry_token, giveaway);
        self.save();
        self.outbox.say(notice);
        Ok(Created { id, replaced })
    }

    pub fn enter(
        &mut self,
        identity: &str,
        display_name: &str,
        level: u32,
        entry_token: &str,
        now: DateTime<Utc>,
    ) -> EntryOutcome {
        let Some(giveaway) = self.giveaways.get_mut(&entry_token.to_lowercase()) else {
            return EntryOutcome::Ignored;
        };
        if !giveaway.is_active() || level < giveaway.min_level || giveaway.has_entry(identity) {
            return EntryOutcome::Ignored;
        }

        let who = if display_name.is_empty() {
            identity
        } else {
            display_name
        };
        if let Some(whitelist) = giveaway.whitelist.as_deref() {
            if !self.store.whitelist_allows(whitelist, identity) {
                self.outbox
                    .say(format!("{} not whitelisted for {}", who, giveaway.name));
                return EntryOutcome::NotWhitelisted;
            }
        }

        giveaway.entries.push(Entry {
            identity: identity.to_string(),
            display_name: display_name.to_string(),
            entered_at: now,
        });
        let notice = format!("{} entered GA {}.", who, giveaway.name);
        self.save();
        self.outbox.say(notice);
        EntryOutcome::Entered
    }

    pub fn end(&mut self, entry_token: &str, now: DateTime<Utc>) -> GiveawayResult<Concluded> {
        self.end_with(entry_token, now, &mut OsRng)
    }

    pub fn end_with<R>(
        &mut self,
        entry_token: &str,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> GiveawayResult<Concluded>
    where
        R: Rng + CryptoRng + ?Sized,
    {
        let key = entry_token.to_lowercase();
        let giveaway = match self.giveaways.get(&key) {
            None => return self.reject(GiveawayError::NotFound(entry_token.to_string())),
            Some(giveaway) if !giveaway.is_active() => {
                return self.reject(GiveawayError::NotActive(giveaway.name.clone()));
            }
            Some(giveaway) => giveaway,
        };
        let id = giveaway.id;
        let name = giveaway.name.clone();
        let prize_list = giveaway.prize_list.clone();
        let mut winners: Vec<Winner> = pick_winner_indices(
            giveaway.entries.len(),
            giveaway.winner_count as usize,
            rng,
        )
        .into_iter()
        .map(|i| {
            let entry = &giveaway.entries[i];
            Winner {
                identity: entry.identity.clone(),
                display_name: entry.display_name.clone(),
                prize: None,
            }
        })
        .collect();

        if let Some(list_name) = prize_list.as_deref() {
            if !winners.is_empty() {
                self.award_prizes(list_name, &name, &mut winners, rng);
            }
        }

        if let Some(giveaway) = self.giveaways.get_mut(&key) {
            giveaway.status = GiveawayStatus::Ended {
                ended_at: now,
                winners: winners.clone(),
            };
        }
        self.save();

        let summary = if winners.is_empty() {
            format!("'{}' GA ended! No entries... no winners!", name)
        } else {
            let listed: Vec<String> = winners.iter().map(Winner::summary).collect();
            format!("GA '{}' ended! Winners: {}", name, listed.join(", "))
        };
        self.outbox.say(summary);

        let names: Vec<&str> = winners.iter().map(|w| w.identity.as_str()).collect();
        self.journal.giveaway_activity(&format!(
            "Ended GA entry='{}', winners={:?}",
            key, names
        ));
        tracing::info!(giveaway.entry = %key, winners = winners.len(), "Giveaway ended");
        Ok(Concluded { id, winners })
    }

    fn award_prizes<R>(&self, list_name: &str, giveaway_name: &str, winners: &mut [Winner], rng: &mut R)
    where
        R: Rng + CryptoRng + ?Sized,
    {
        let stored = self.store.load_prize_list(list_name);
        let exists = stored.is_some();
        let mut prizes = stored.unwrap_or_default();

        for winner in winners.iter_mut() {
            match take_prize(&mut prizes, rng) {
                Some(prize) => {
                    self.outbox.say(format!(
                        "{} has won '{}' in GA '{}'!",
                        winner.name(),
                        prize,
                        giveaway_name
                    ));
                    winner.prize = Some(prize);
                }
                None => self.outbox.say(format!(
                    "{} won, but no more prizes were available for '{}'!",
                    winner.name(),
                    giveaway_name
                )),
            }
        }

        if exists {
            if let Err(e) = self.store.save_prize_list(list_name, &prizes) {
                tracing::error!(prize_list.name = %list_name, error = %e, "Failed to save prize list");
            }
        }
    }

    /// Cancels an active giveaway without drawing and discards it.
    pub fn cancel(&mut self, entry_token: &str, now: DateTime<Utc>) -> GiveawayResult<Uuid> {
        let key = entry_token.to_lowercase();
        if !self.giveaways.get(&key).is_some_and(Giveaway::is_active) {
            return self.reject(GiveawayError::NothingToCancel(entry_token.to_string()));
        }
        let Some(mut giveaway) = self.giveaways.remove(&key) else {
            return self.reject(GiveawayError::NothingToCancel(entry_token.to_string()));
        };
        giveaway.status = GiveawayStatus::Canceled { ended_at: now };
        self.save();

        self.outbox.say(format!("Canceled GA {}.", giveaway.name));
        self.journal
            .giveaway_activity(&format!("Canceled {} - {}", key, giveaway.name));
        tracing::info!(giveaway.entry = %key, giveaway.id = %giveaway.id, "Giveaway canceled");
        Ok(giveaway.id)
    }

    /// Moves the end of an active giveaway to `now + seconds` and re-arms its
    /// warnings and final countdown.
    pub fn set_end_in(
        &mut self,
        entry_token: &str,
        seconds: i64,
        now: DateTime<Utc>,
    ) -> GiveawayResult<Uuid> {
        let key = entry_token.to_lowercase();
        let name = match self.giveaways.get(&key) {
            None => return self.reject(GiveawayError::NotFound(entry_token.to_string())),
            Some(giveaway) if !giveaway.is_active() => {
                return self.reject(GiveawayError::CannotReschedule(giveaway.name.clone()));
            }
            Some(giveaway) => giveaway.name.clone(),
        };

        let window_ms = seconds.saturating_mul(1000);
        let Some(ends_at) = window_end(now, window_ms) else {
            return self.reject(GiveawayError::CannotReschedule(name));
        };
        let warned_for = self.presuppressed_warnings(window_ms);

        let Some(giveaway) = self.giveaways.get_mut(&key) else {
            return self.reject(GiveawayError::NotFound(entry_token.to_string()));
        };
        giveaway.ends_at = Some(ends_at);
        giveaway.status = GiveawayStatus::Active {
            warned_for,
            in_final_countdown: false,
        };
        let id = giveaway.id;
        self.save();

        self.outbox.say(format!(
            "Updated GA '{}' to end in {} second(s) from now.",
            name, seconds
        ));
        self.journal.giveaway_activity(&format!(
            "Updated end time for GA '{}' => now + {} seconds.",
            key, seconds
        ));
        Ok(id)
    }

    pub fn report_time_left(&self, entry_token: &str, now: DateTime<Utc>) -> String {
        let notice = match self.get(entry_token) {
            None => format!("No active GA for {}", entry_token),
            Some(giveaway) => match (giveaway.ended_at(), giveaway.ends_at) {
                (Some(ended_at), _) => {
                    let (h, m, s) = split_hms(now.signed_duration_since(ended_at).num_seconds());
                    format!("GA {} ended {}h {}m {}s ago.", giveaway.name, h, m, s)
                }
                (None, None) => format!("GA {} has no auto-end time.", giveaway.name),
                (None, Some(ends_at)) => {
                    let left = ends_at.signed_duration_since(now);
                    if left.num_milliseconds() <= 0 {
                        format!(
                            "GA {} auto-end time passed, but not forcibly ended.",
                            giveaway.name
                        )
                    } else {
                        let (h, m, s) = split_hms(left.num_seconds());
                        format!("{} ends in {}h {}m {}s", giveaway.name, h, m, s)
                    }
                }
            },
        };
        self.outbox.say(notice.clone());
        notice
    }

    pub fn report_winners(&self, entry_token: &str) -> String {
        let notice = match self.get(entry_token) {
            None => format!("No giveaway found for {}.", entry_token),
            Some(giveaway) => match &giveaway.status {
                GiveawayStatus::Active { .. } => format!(
                    "The giveaway '{}' hasn't ended yet (or was never ended).",
                    giveaway.name
                ),
                GiveawayStatus::Ended { winners, .. } if !winners.is_empty() => {
                    let listed: Vec<String> = winners.iter().map(Winner::summary).collect();
                    format!("{} winners => {}", giveaway.name, listed.join(", "))
                }
                GiveawayStatus::Ended { .. } | GiveawayStatus::Canceled { .. } => {
                    format!("'{}' had no winners or was canceled.", giveaway.name)
                }
            },
        };
        self.outbox.say(notice.clone());
        notice
    }

    /// Announces one step of a final countdown. Returns `false` once the giveaway
    /// is gone or no longer active, which stops the countdown.
    pub fn announce_countdown(&self, giveaway_id: Uuid, remaining: u64) -> bool {
        match self.find_by_id(giveaway_id) {
            Some(giveaway) if giveaway.is_active() => {
                self.outbox
                    .say(format!("{} winner(s) picked in {}..", giveaway.name, remaining));
                true
            }
            _ => false,
        }
    }

    /// One scheduler pass over the timed, active giveaways. Countdown flags and
    /// warning marks are set here, before the caller acts on the returned actions.
    pub fn scan(&mut self, now: DateTime<Utc>) -> Vec<ScheduledAction> {
        let final_window_ms = i64::try_from(self.final_countdown_secs.saturating_mul(1000))
            .unwrap_or(i64::MAX);
        let mut actions = Vec::new();
        let mut warnings = Vec::new();
        let mut changed = false;

        for giveaway in self.giveaways.values_mut() {
            let Some(ends_at) = giveaway.ends_at else {
                continue;
            };
            let GiveawayStatus::Active {
                warned_for,
                in_final_countdown,
            } = &mut giveaway.status
            else {
                continue;
            };
            let left_ms = ends_at.signed_duration_since(now).num_milliseconds();

            if left_ms <= 0 {
                if self.final_countdown_secs == 0 || *in_final_countdown {
                    actions.push(ScheduledAction::End {
                        giveaway_id: giveaway.id,
                        entry_token: giveaway.entry_token.clone(),
                    });
                } else {
                    *in_final_countdown = true;
                    changed = true;
                    actions.push(ScheduledAction::StartCountdown {
                        giveaway_id: giveaway.id,
                        seconds: self.final_countdown_secs,
                    });
                }
                continue;
            }

            if self.final_countdown_secs > 0 && left_ms <= final_window_ms {
                if !*in_final_countdown {
                    *in_final_countdown = true;
                    changed = true;
                    actions.push(ScheduledAction::StartCountdown {
                        giveaway_id: giveaway.id,
                        seconds: self.final_countdown_secs,
                    });
                }
                continue;
            }

            for &threshold in &self.warning_thresholds {
                let threshold_ms = i64::try_from(threshold.saturating_mul(1000)).unwrap_or(i64::MAX);
                if left_ms <= threshold_ms && warned_for.insert(threshold) {
                    let minutes = threshold / 60;
                    warnings.push(format!(
                        "{} ends in {} minute{}! Type {} to enter!",
                        giveaway.name,
                        minutes,
                        if minutes == 1 { "" } else { "s" },
                        giveaway.entry_token
                    ));
                    changed = true;
                }
            }
        }

        if changed {
            self.save();
        }
        for warning in warnings {
            self.outbox.say(warning);
        }
        actions
    }

    pub fn create_prize_list(&self, name: &str, prizes: Vec<String>) -> GiveawayResult<usize> {
        let name = name.trim();
        if name.is_empty() {
            return self.reject(GiveawayError::MissingPrizeListName);
        }
        if !is_valid_prize_list_name(name) {
            return self.reject(GiveawayError::InvalidPrizeListName);
        }
        if self.store.prize_list_exists(name) {
            return self.reject(GiveawayError::PrizeListExists(name.to_string()));
        }

        let cleaned: Vec<String> = prizes
            .into_iter()
            .map(|prize| prize.trim().to_string())
            .filter(|prize| !prize.is_empty())
            .collect();
        if let Err(e) = self.store.save_prize_list(name, &cleaned) {
            tracing::error!(prize_list.name = %name, error = %e, "Failed to write prize list");
            return self.reject(GiveawayError::PrizeListNotSaved(name.to_string()));
        }

        if cleaned.is_empty() {
            self.outbox
                .say(format!("Creating empty prizelist '{}' (no prizes).", name));
        } else {
            self.outbox.say(format!(
                "Creating new prizelist '{}' with {} prize(s).",
                name,
                cleaned.len()
            ));
        }
        Ok(cleaned.len())
    }
}
