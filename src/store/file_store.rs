use super::{GiveawayTable, Result as StoreResult, Store, is_valid_prize_list_name};
use crate::error::StoreError;
use crate::leveling::UserTable;
use crate::scoring::DonationLedger;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

const ADMINS_FILE: &str = "admins.txt";
const IGNORED_FILE: &str = "ignored.txt";
const USERS_FILE: &str = "users.json";
const DONATIONS_FILE: &str = "donations.json";
const GIVEAWAYS_FILE: &str = "giveaways.json";
const PRIZE_LISTS_DIR: &str = "prizelists";
const WHITELISTS_DIR: &str = "whitelists";

/// Plain files under one data directory: line-per-entry text for sets, pretty JSON
/// for tables, one text file per prize list and whitelist.
pub struct JsonFileStore {
    root: PathBuf,
}

impl JsonFileStore {
    pub fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        for dir in [root.clone(), root.join(PRIZE_LISTS_DIR), root.join(WHITELISTS_DIR)] {
            fs::create_dir_all(&dir).map_err(|source| StoreError::Write {
                path: dir.clone(),
                source,
            })?;
        }
        tracing::info!(store.root = %root.display(), "Opened data directory");
        Ok(Self { root })
    }

    fn prize_list_path(&self, name: &str) -> PathBuf {
        self.root.join(PRIZE_LISTS_DIR).join(format!("{}.txt", name))
    }

    fn whitelist_path(&self, name: &str) -> PathBuf {
        self.root.join(WHITELISTS_DIR).join(format!("{}.txt", name))
    }

    fn load_set(&self, file: &str) -> BTreeSet<String> {
        read_optional(&self.root.join(file))
            .map(|content| {
                content
                    .lines()
                    .map(|line| line.trim().to_lowercase())
                    .filter(|line| !line.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn save_set(&self, file: &str, set: &BTreeSet<String>) -> StoreResult<()> {
        let mut content = String::new();
        for item in set {
            content.push_str(item);
            content.push('\n');
        }
        write_replace(&self.root.join(file), content.as_bytes())
    }

    fn load_json<T: DeserializeOwned + Default>(&self, file: &str) -> T {
        let path = self.root.join(file);
        let Some(content) = read_optional(&path) else {
            return T::default();
        };
        match serde_json::from_str(&content) {
            Ok(value) => value,
            Err(e) => {
                tracing::error!(
                    store.path = %path.display(),
                    error = %e,
                    "Malformed snapshot, starting from empty state"
                );
                T::default()
            }
        }
    }

    fn save_json<T: Serialize>(&self, file: &str, value: &T) -> StoreResult<()> {
        let path = self.root.join(file);
        let encoded = serde_json::to_vec_pretty(value).map_err(|source| StoreError::Encode {
            path: path.clone(),
            source,
        })?;
        write_replace(&path, &encoded)
    }
}

fn read_optional(path: &Path) -> Option<String> {
    match fs::read_to_string(path) {
        Ok(content) => Some(content),
        Err(e) if e.kind() == ErrorKind::NotFound => None,
        Err(e) => {
            tracing::error!(store.path = %path.display(), error = %e, "Failed to read file");
            None
        }
    }
}

/// Writes to a sibling temp file and renames it over the target.
fn write_replace(path: &Path, bytes: &[u8]) -> StoreResult<()> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, bytes).map_err(|source| StoreError::Write {
        path: tmp.clone(),
        source,
    })?;
    fs::rename(&tmp, path).map_err(|source| StoreError::Write {
        path: path.to_path_buf(),
        source,
    })
}

impl Store for JsonFileStore {
    fn load_admins(&self) -> BTreeSet<String> {
        self.load_set(ADMINS_FILE)
    }

    fn save_admins(&self, admins: &BTreeSet<String>) -> StoreResult<()> {
        self.save_set(ADMINS_FILE, admins)
    }

    fn load_ignored(&self) -> BTreeSet<String> {
        self.load_set(IGNORED_FILE)
    }

    fn save_ignored(&self, ignored: &BTreeSet<String>) -> StoreResult<()> {
        self.save_set(IGNORED_FILE, ignored)
    }

    fn load_users(&self) -> UserTable {
        self.load_json(USERS_FILE)
    }

    fn save_users(&self, users: &UserTable) -> StoreResult<()> {
        self.save_json(USERS_FILE, users)
    }

    fn load_donations(&self) -> DonationLedger {
        self.load_json(DONATIONS_FILE)
    }

    fn save_donations(&self, ledger: &DonationLedger) -> StoreResult<()> {
        self.save_json(DONATIONS_FILE, ledger)
    }

    fn load_giveaways(&self) -> GiveawayTable {
        let mut giveaways: GiveawayTable = self.load_json(GIVEAWAYS_FILE);
        for giveaway in giveaways.values_mut() {
            giveaway.clear_countdown_flag();
        }
        giveaways
    }

    fn save_giveaways(&self, giveaways: &GiveawayTable) -> StoreResult<()> {
        self.save_json(GIVEAWAYS_FILE, giveaways)
    }

    fn prize_list_exists(&self, name: &str) -> bool {
        is_valid_prize_list_name(name) && self.prize_list_path(name).is_file()
    }

    fn load_prize_list(&self, name: &str) -> Option<Vec<String>> {
        if !is_valid_prize_list_name(name) {
            tracing::warn!(prize_list.name = %name, "Refusing to read prize list with invalid name");
            return None;
        }
        read_optional(&self.prize_list_path(name)).map(|content| {
            content
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect()
        })
    }

    fn save_prize_list(&self, name: &str, prizes: &[String]) -> StoreResult<()> {
        let mut content = prizes.join("\n");
        if !content.is_empty() {
            content.push('\n');
        }
        write_replace(&self.prize_list_path(name), content.as_bytes())
    }

    fn whitelist_allows(&self, name: &str, identity: &str) -> bool {
        if !is_valid_prize_list_name(name) {
            tracing::warn!(whitelist.name = %name, "Ignoring whitelist with invalid name");
            return true;
        }
        match read_optional(&self.whitelist_path(name)) {
            Some(content) => content
                .split_whitespace()
                .any(|entry| entry.eq_ignore_ascii_case(identity)),
            None => true,
        }
    }
}
