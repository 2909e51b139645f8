use super::Result as StoreResult;
use crate::error::StoreError;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const LOGS_DIR: &str = "logs";
const GIVEAWAY_ACTIVITY_FILE: &str = "giveaways_log.txt";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Recv,
    Send,
}

impl Direction {
    fn as_str(self) -> &'static str {
        match self {
            Direction::Recv => "recv",
            Direction::Send => "send",
        }
    }
}

/// One accepted inbound chat message, as written to the structured event log.
#[derive(Debug, Serialize)]
pub struct MessageEvent<'a> {
    pub timestamp: DateTime<Utc>,
    pub message_id: &'a str,
    pub identity: &'a str,
    pub name: &'a str,
    pub content: &'a str,
}

/// Append-only data files: the raw transcript, the structured message log and
/// the giveaway activity log. Write failures are logged and never propagated.
#[derive(Clone)]
pub struct Journal {
    logs_dir: Arc<PathBuf>,
    activity_path: Arc<PathBuf>,
}

impl Journal {
    pub fn open(data_dir: &Path) -> StoreResult<Self> {
        let logs_dir = data_dir.join(LOGS_DIR);
        fs::create_dir_all(&logs_dir).map_err(|source| StoreError::Write {
            path: logs_dir.clone(),
            source,
        })?;
        Ok(Self {
            logs_dir: Arc::new(logs_dir),
            activity_path: Arc::new(data_dir.join(GIVEAWAY_ACTIVITY_FILE)),
        })
    }

    fn dated_path(&self, now: DateTime<Utc>, suffix: &str) -> PathBuf {
        self.logs_dir
            .join(format!("{}_{}", now.format("%Y-%m-%d"), suffix))
    }

    pub fn raw(&self, direction: Direction, payload: &str) {
        let now = Utc::now();
        let line = format!(
            "{} [{}] {}",
            now.to_rfc3339_opts(SecondsFormat::Micros, true),
            direction.as_str(),
            payload
        );
        append_line(&self.dated_path(now, "raw_message.log"), &line);
    }

    pub fn message_event(&self, event: &MessageEvent<'_>) {
        match serde_json::to_string(event) {
            Ok(line) => append_line(&self.dated_path(event.timestamp, "messages.log"), &line),
            Err(e) => tracing::error!(error = %e, "Failed to encode message event"),
        }
    }

    pub fn giveaway_activity(&self, activity: &str) {
        let line = format!(
            "{} {}",
            Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            activity
        );
        append_line(&self.activity_path, &line);
    }
}

fn append_line(path: &Path, line: &str) {
    let result = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .and_then(|mut file| writeln!(file, "{}", line));
    if let Err(e) = result {
        tracing::error!(journal.path = %path.display(), error = %e, "Failed to append journal line");
    }
}
