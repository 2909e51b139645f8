pub mod file_store;
pub mod journal;

pub use file_store::JsonFileStore;
pub use journal::{Direction, Journal, MessageEvent};

use crate::error::StoreError;
use crate::giveaway::Giveaway;
use crate::leveling::UserTable;
use crate::scoring::DonationLedger;
use std::collections::{BTreeMap, BTreeSet};

pub type Result<T, E = StoreError> = std::result::Result<T, E>;

/// Giveaways keyed by their lower-cased entry token.
pub type GiveawayTable = BTreeMap<String, Giveaway>;

/// Whole-snapshot persistence for every table the bot owns.
///
/// Loads never fail: a missing snapshot is empty state and a corrupt one is logged
/// and treated as empty. Saves replace the previous snapshot.
pub trait Store: Send + Sync {
    fn load_admins(&self) -> BTreeSet<String>;
    fn save_admins(&self, admins: &BTreeSet<String>) -> Result<()>;

    fn load_ignored(&self) -> BTreeSet<String>;
    fn save_ignored(&self, ignored: &BTreeSet<String>) -> Result<()>;

    fn load_users(&self) -> UserTable;
    fn save_users(&self, users: &UserTable) -> Result<()>;

    fn load_donations(&self) -> DonationLedger;
    fn save_donations(&self, ledger: &DonationLedger) -> Result<()>;

    fn load_giveaways(&self) -> GiveawayTable;
    fn save_giveaways(&self, giveaways: &GiveawayTable) -> Result<()>;

    fn prize_list_exists(&self, name: &str) -> bool;
    /// `None` when no list with that name exists.
    fn load_prize_list(&self, name: &str) -> Option<Vec<String>>;
    fn save_prize_list(&self, name: &str, prizes: &[String]) -> Result<()>;

    /// A whitelist that does not exist imposes no restriction.
    fn whitelist_allows(&self, name: &str, identity: &str) -> bool;
}

const MAX_PRIZE_LIST_NAME_LEN: usize = 15;
const FORBIDDEN_NAME_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Prize list names double as file names and must be portable.
pub fn is_valid_prize_list_name(name: &str) -> bool {
    let len = name.chars().count();
    if len == 0 || len > MAX_PRIZE_LIST_NAME_LEN {
        return false;
    }
    if name
        .chars()
        .any(|c| c.is_control() || FORBIDDEN_NAME_CHARS.contains(&c))
    {
        return false;
    }
    if name.contains("..") {
        return false;
    }
    !name.ends_with('.') && !name.ends_with(' ')
}
