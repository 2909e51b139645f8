use crate::error::{ConfigError, Result as AppResult};
use config::{Config, Environment, File};
use serde::{Deserialize, Deserializer};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct ChatConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub auth_token: String,
    #[serde(default)]
    pub bot_identity: String,
    #[serde(default)]
    pub streamer_handle: String,
    pub channel_type: String,
    pub api_base_url: String,
    pub ws_url: String,
    pub directory_base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DispatcherConfig {
    pub min_interval_ms: u64,
    pub send_timeout_secs: u64,
    pub echo_capacity: usize,
}

impl DispatcherConfig {
    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_secs(self.send_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionConfig {
    pub backoff_base_secs: u64,
    pub backoff_max_secs: u64,
    pub keepalive_secs: u64,
    pub connect_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GiveawayConfig {
    pub warning_minutes: Vec<u64>,
    pub final_countdown_secs: u64,
    pub tick_secs: u64,
}

impl GiveawayConfig {
    /// Warning thresholds in seconds, largest first.
    pub fn warning_thresholds_secs(&self) -> Vec<u64> {
        let mut thresholds: Vec<u64> = self
            .warning_minutes
            .iter()
            .map(|minutes| minutes * 60)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        thresholds.reverse();
        thresholds
    }
}

impl Default for GiveawayConfig {
    fn default() -> Self {
        Self {
            warning_minutes: vec![10, 5, 4, 3, 2, 1],
            final_countdown_secs: 10,
            tick_secs: 2,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
    pub display_name: String,
    pub donation_unit: String,
    #[serde(default, deserialize_with = "deserialize_string_or_list_to_set_lowercase")]
    pub bootstrap_admins: BTreeSet<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PromotionsConfig {
    pub enabled: bool,
    pub interval_secs: u64,
    pub file: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DonationCue {
    pub min_amount: u64,
    pub sound_path: PathBuf,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AudioConfig {
    #[serde(default)]
    pub player_command: Option<String>,
    #[serde(default)]
    pub donation_cues: Vec<DonationCue>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppSettings {
    pub chat: ChatConfig,
    pub dispatcher: DispatcherConfig,
    pub connection: ConnectionConfig,
    pub giveaways: GiveawayConfig,
    pub bot: BotConfig,
    pub storage: StorageConfig,
    pub promotions: PromotionsConfig,
    #[serde(default)]
    pub audio: AudioConfig,
}

impl AppSettings {
    fn validate(self) -> Result<Self, ConfigError> {
        let required = [
            ("chat.api_key", &self.chat.api_key),
            ("chat.auth_token", &self.chat.auth_token),
            ("chat.bot_identity", &self.chat.bot_identity),
            ("chat.streamer_handle", &self.chat.streamer_handle),
        ];
        for (key, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::Missing(key.to_string()));
            }
        }
        if self.giveaways.tick_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "giveaways.tick_secs must be at least 1".to_string(),
            ));
        }
        if self.connection.backoff_base_secs == 0
            || self.connection.backoff_max_secs < self.connection.backoff_base_secs
        {
            return Err(ConfigError::InvalidValue(
                "connection backoff must satisfy 0 < base <= max".to_string(),
            ));
        }
        Ok(self)
    }
}

pub fn load_settings() -> AppResult<AppSettings> {
    let builder = Config::builder()
        .set_default("chat.channel_type", "messaging")?
        .set_default("chat.api_base_url", "https://chat.stream-io-api.com")?
        .set_default("chat.ws_url", "wss://chat.stream-io-api.com/connect")?
        .set_default("chat.directory_base_url", "https://backend.portal.abs.xyz")?
        .set_default("dispatcher.min_interval_ms", 10)?
        .set_default("dispatcher.send_timeout_secs", 5)?
        .set_default("dispatcher.echo_capacity", 2048)?
        .set_default("connection.backoff_base_secs", 1)?
        .set_default("connection.backoff_max_secs", 60)?
        .set_default("connection.keepalive_secs", 25)?
        .set_default("connection.connect_timeout_secs", 15)?
        .set_default("giveaways.warning_minutes", vec![10, 5, 4, 3, 2, 1])?
        .set_default("giveaways.final_countdown_secs", 10)?
        .set_default("giveaways.tick_secs", 2)?
        .set_default("bot.display_name", "Prize")?
        .set_default("bot.donation_unit", "PENGU")?
        .set_default("storage.data_dir", ".")?
        .set_default("promotions.enabled", false)?
        .set_default("promotions.interval_secs", 600)?
        .set_default("promotions.file", "promotions.txt")?
        .add_source(File::with_name("config").required(false))
        .add_source(
            Environment::with_prefix("PRIZEBOT")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("giveaways.warning_minutes")
                .with_list_parse_key("bot.bootstrap_admins")
                .try_parsing(true),
        );

    let settings = builder
        .build()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    let settings: AppSettings = settings
        .try_deserialize()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    Ok(settings.validate()?)
}

fn deserialize_string_or_list_to_set_lowercase<'de, D>(
    deserializer: D,
) -> Result<BTreeSet<String>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;
    use serde_json::Value;

    let value = Value::deserialize(deserializer)?;
    let mut set = BTreeSet::new();

    match value {
        Value::String(s) => {
            for item in s.split(',') {
                let item = item.trim().to_lowercase();
                if !item.is_empty() {
                    set.insert(item);
                }
            }
        }
        Value::Array(arr) => {
            for item in arr {
                if let Value::String(s) = item {
                    let s = s.trim().to_lowercase();
                    if !s.is_empty() {
                        set.insert(s);
                    }
                } else {
                    return Err(D::Error::custom("Array must contain only strings"));
                }
            }
        }
        Value::Null => {}
        _ => return Err(D::Error::custom("Expected string or array of strings")),
    }

    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warning_thresholds_are_deduplicated_and_descending() {
        let config = GiveawayConfig {
            warning_minutes: vec![1, 5, 10, 5, 2],
            final_countdown_secs: 10,
            tick_secs: 2,
        };
        assert_eq!(config.warning_thresholds_secs(), vec![600, 300, 120, 60]);
    }

    #[test]
    fn test_bootstrap_admins_accepts_comma_string() {
        let value = serde_json::json!({
            "display_name": "Prize",
            "donation_unit": "PENGU",
            "bootstrap_admins": "0xABC, 0xdef ,"
        });
        let bot: BotConfig = serde_json::from_value(value).unwrap();
        let admins: Vec<_> = bot.bootstrap_admins.into_iter().collect();
        assert_eq!(admins, vec!["0xabc".to_string(), "0xdef".to_string()]);
    }

    #[test]
    fn test_bootstrap_admins_rejects_non_string_items() {
        let value = serde_json::json!({
            "display_name": "Prize",
            "donation_unit": "PENGU",
            "bootstrap_admins": ["ok", 3]
        });
        assert!(serde_json::from_value::<BotConfig>(value).is_err());
    }
}
