pub mod book;
pub mod countdown;
pub mod draw;

pub use book::{CreateGiveaway, EntryOutcome, GiveawayBook, ScheduledAction};
pub use countdown::{CountdownEvent, CountdownRegistry};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub identity: String,
    pub display_name: String,
    pub entered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Winner {
    pub identity: String,
    pub display_name: String,
    pub prize: Option<String>,
}

impl Winner {
    pub fn name(&self) -> &str {
        if self.display_name.is_empty() {
            &self.identity
        } else {
            &self.display_name
        }
    }

    /// `name` or `name (prize)`.
    pub fn summary(&self) -> String {
        match &self.prize {
            Some(prize) => format!("{} ({})", self.name(), prize),
            None => self.name().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum GiveawayStatus {
    Active {
        /// Warning thresholds, in seconds before the end, already announced or suppressed.
        warned_for: BTreeSet<u64>,
        in_final_countdown: bool,
    },
    Ended {
        ended_at: DateTime<Utc>,
        winners: Vec<Winner>,
    },
    Canceled {
        ended_at: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Giveaway {
    pub id: Uuid,
    pub name: String,
    /// Lower-cased, including the leading `!`.
    pub entry_token: String,
    pub created_at: DateTime<Utc>,
    pub creator: String,
    pub whitelist: Option<String>,
    pub prize_list: Option<String>,
    pub winner_count: u32,
    pub min_level: u32,
    pub entries: Vec<Entry>,
    pub ends_at: Option<DateTime<Utc>>,
    pub status: GiveawayStatus,
}

impl Giveaway {
    pub fn is_active(&self) -> bool {
        matches!(self.status, GiveawayStatus::Active { .. })
    }

    pub fn has_entry(&self, identity: &str) -> bool {
        self.entries.iter().any(|entry| entry.identity == identity)
    }

    pub fn in_final_countdown(&self) -> bool {
        matches!(
            self.status,
            GiveawayStatus::Active {
                in_final_countdown: true,
                ..
            }
        )
    }

    /// Countdown tasks do not survive a restart, so a loaded giveaway must not
    /// claim one is running.
    pub fn clear_countdown_flag(&mut self) {
        if let GiveawayStatus::Active {
            in_final_countdown, ..
        } = &mut self.status
        {
            *in_final_countdown = false;
        }
    }

    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        match &self.status {
            GiveawayStatus::Active { .. } => None,
            GiveawayStatus::Ended { ended_at, .. } | GiveawayStatus::Canceled { ended_at } => {
                Some(*ended_at)
            }
        }
    }
}

/// Rejections of giveaway and prize list operations. The message is the chat notice.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GiveawayError {
    #[error("GA creation failed: missing name or entry command not starting with !.")]
    InvalidDefinition,
    #[error("Cannot use {0} as a GA command; it is reserved.")]
    ReservedToken(String),
    #[error("No active GA for {0}")]
    NotFound(String),
    #[error("GA {0} not active.")]
    NotActive(String),
    #[error("GA '{0}' is not active, cannot update end time.")]
    CannotReschedule(String),
    #[error("No GA found for {0}")]
    NothingToCancel(String),
    #[error("No prizelist name found. Usage: !createprizelist listName, item1, item2, ...")]
    MissingPrizeListName,
    #[error(
        "Invalid prize list name. Must be 1-15 chars, cannot contain Windows-invalid characters, cannot contain \"..\", and cannot end with \".\" or space."
    )]
    InvalidPrizeListName,
    #[error("Prizelist '{0}' already exists! Can't overwrite.")]
    PrizeListExists(String),
    #[error("Could not save prizelist '{0}'.")]
    PrizeListNotSaved(String),
}

pub type Result<T, E = GiveawayError> = std::result::Result<T, E>;
