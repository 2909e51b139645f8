use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::OnceLock;
use std::time::Duration;
use tokio::time::Instant;

pub const CHAT_XP: u64 = 1;
pub const CHAT_XP_SPACING: Duration = Duration::from_secs(1);

/// Per-identity spacing for plain chat XP. Every observed message moves the
/// identity's clock, whether or not it earned anything.
#[derive(Debug, Default)]
pub struct ChatXpThrottle {
    last_seen: HashMap<String, Instant>,
}

impl ChatXpThrottle {
    /// Records a message at `now` and returns whether it earns chat XP.
    pub fn observe(&mut self, identity: &str, now: Instant) -> bool {
        let earns = match self.last_seen.get(identity) {
            Some(&last) => now.saturating_duration_since(last) >= CHAT_XP_SPACING,
            None => true,
        };
        self.last_seen.insert(identity.to_string(), now);
        earns
    }
}

fn donation_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)^\s*tipped\s+(-?\d+)\s+(\S+)").expect("Failed to compile donation regex")
    })
}

/// Amount donated by a pinned `tipped <n> <unit> ...` message. Negative amounts
/// clamp to zero; anything else is not a donation.
pub fn detect_donation(pinned: bool, text: &str, unit: &str) -> Option<u64> {
    if !pinned {
        return None;
    }
    let captures = donation_pattern().captures(text)?;
    let token = captures.get(2)?.as_str();
    if !token
        .trim_end_matches(|c: char| !c.is_alphanumeric())
        .eq_ignore_ascii_case(unit)
    {
        return None;
    }
    let raw = captures.get(1)?.as_str();
    if raw.starts_with('-') {
        return Some(0);
    }
    raw.parse::<u64>().ok()
}

/// Lifetime donation totals by identity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DonationLedger {
    totals: BTreeMap<String, u64>,
}

impl DonationLedger {
    pub fn record(&mut self, identity: &str, amount: u64) {
        let total = self.totals.entry(identity.to_string()).or_insert(0);
        *total = total.saturating_add(amount);
    }

    pub fn total_for(&self, identity: &str) -> u64 {
        self.totals.get(identity).copied().unwrap_or(0)
    }
}
