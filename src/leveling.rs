use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::ops::Range;

pub const STARTING_LEVEL: u32 = 1;

/// Highest level whose cumulative threshold fits in a `u64`. Every XP total maps to a
/// level at or below it.
pub const MAX_LEVEL: u32 = 2_228_552;

/// XP needed to advance from `level` to `level + 1`.
pub fn xp_for_next_level(level: u32) -> u64 {
    let l = u64::from(level);
    5 * l * l + 50 * l + 100
}

/// Cumulative XP at which `level` is reached: the sum of `xp_for_next_level(1..level)`.
pub fn total_xp_to_reach_level(level: u32) -> u64 {
    let n = u128::from(level.saturating_sub(1));
    let total = 5 * n * (n + 1) * (2 * n + 1) / 6 + 25 * n * (n + 1) + 100 * n;
    u64::try_from(total).unwrap_or(u64::MAX)
}

/// The unique level whose cumulative threshold is reached by `xp` while the next one is not.
pub fn level_for_xp(xp: u64) -> u32 {
    let (mut low, mut high) = (STARTING_LEVEL, MAX_LEVEL);
    while low < high {
        let mid = low + (high - low).div_ceil(2);
        if total_xp_to_reach_level(mid) <= xp {
            low = mid;
        } else {
            high = mid - 1;
        }
    }
    low
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub identity: String,
    pub display_name: String,
    pub xp: u64,
    pub level: u32,
}

impl UserRecord {
    fn new(identity: &str, display_name: &str) -> Self {
        Self {
            identity: identity.to_string(),
            display_name: display_name.to_string(),
            xp: 0,
            level: STARTING_LEVEL,
        }
    }

    /// Display name, or the identity when no name has been seen.
    pub fn name(&self) -> &str {
        if self.display_name.is_empty() {
            &self.identity
        } else {
            &self.display_name
        }
    }

    /// `(xp earned inside the current level, xp the current level requires)`.
    pub fn progress(&self) -> (u64, u64) {
        (
            self.xp.saturating_sub(total_xp_to_reach_level(self.level)),
            xp_for_next_level(self.level),
        )
    }
}

/// Every user the bot has seen, in first-seen order.
#[derive(Debug, Clone, Default)]
pub struct UserTable {
    users: Vec<UserRecord>,
    index: HashMap<String, usize>,
}

impl UserTable {
    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    pub fn get(&self, identity: &str) -> Option<&UserRecord> {
        self.index.get(identity).map(|&i| &self.users[i])
    }

    pub fn level_of(&self, identity: &str) -> u32 {
        self.get(identity).map_or(STARTING_LEVEL, |user| user.level)
    }

    /// Returns the user, creating it at level 1 if absent. A non-empty name replaces
    /// the stored one.
    pub fn get_or_create(&mut self, identity: &str, display_name: &str) -> &UserRecord {
        let i = match self.index.get(identity) {
            Some(&i) => {
                let user = &mut self.users[i];
                if !display_name.is_empty() && user.display_name != display_name {
                    user.display_name = display_name.to_string();
                }
                i
            }
            None => {
                self.users.push(UserRecord::new(identity, display_name));
                let i = self.users.len() - 1;
                self.index.insert(identity.to_string(), i);
                i
            }
        };
        &self.users[i]
    }

    /// Adds XP and returns the levels reached by this award, in order.
    pub fn award_xp(&mut self, identity: &str, amount: u64) -> Range<u32> {
        let Some(&i) = self.index.get(identity) else {
            return 0..0;
        };
        let user = &mut self.users[i];
        user.xp = user.xp.saturating_add(amount);

        let previous = user.level;
        user.level = level_for_xp(user.xp).max(previous);
        previous + 1..user.level + 1
    }

    /// 1-based position by XP descending, ties in first-seen order. An unknown
    /// identity ranks last, at the population size.
    pub fn rank(&self, identity: &str) -> usize {
        let Some(&target) = self.index.get(identity) else {
            return self.users.len();
        };
        let xp = self.users[target].xp;
        let ahead = self
            .users
            .iter()
            .enumerate()
            .filter(|(i, user)| user.xp > xp || (user.xp == xp && *i < target))
            .count();
        ahead + 1
    }
}

impl Serialize for UserTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.users.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for UserTable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let records = Vec::<UserRecord>::deserialize(deserializer)?;
        let mut table = UserTable::default();
        for mut record in records {
            record.identity = record.identity.to_lowercase();
            if table.index.contains_key(&record.identity) {
                continue;
            }
            record.level = level_for_xp(record.xp);
            table.index.insert(record.identity.clone(), table.users.len());
            table.users.push(record);
        }
        Ok(table)
    }
}

pub fn rank_reply(user: &UserRecord, rank: usize) -> String {
    let (in_level, needed) = user.progress();
    format!(
        "{}: Rank #{}, Level {}, XP: {}/{}",
        user.name(),
        rank,
        user.level,
        in_level,
        needed
    )
}

pub fn level_up_notice(name: &str, level: u32) -> String {
    format!("Congrats {}! You leveled up to level {}!", name, level)
}
