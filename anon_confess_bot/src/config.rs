use std::path::{Path, PathBuf};

use serde::Deserialize;
use teloxide::types::ChatId;

/// Telegram's limit on message text, in characters.
const TELEGRAM_MESSAGE_LIMIT: usize = 4096;

/// Room left for the `Anon #N` footer, which is under 32 characters for any number.
pub const FOOTER_ROOM: usize = 32;

/// Highest `max_message_length` that still fits into one message with the footer.
pub const MAX_MESSAGE_LENGTH_LIMIT: usize = TELEGRAM_MESSAGE_LIMIT - FOOTER_ROOM;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not parse config file {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("max_message_length must be above zero")]
    ZeroMessageLength,
    #[error("max_message_length is {0}, but can be at most {MAX_MESSAGE_LENGTH_LIMIT}")]
    MessageLengthTooLarge(usize),
}

/// Settings of the bot, read from a JSON file like this:
///
/// ```json
/// {
///     "channel_id": -1001234567890,
///     "ledger_path": "storage.json",
///     "max_message_length": 4000
/// }
/// ```
///
/// Only `channel_id` is required.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// The channel confessions are posted into.
    /// Its administrators are the ones allowed to block and unblock.
    pub channel_id: ChatId,
    /// Where the ledger is stored.
    #[serde(default = "default_ledger_path")]
    pub ledger_path: PathBuf,
    /// Longest confession text accepted, in characters.
    #[serde(default = "default_max_message_length")]
    pub max_message_length: usize,
}

fn default_ledger_path() -> PathBuf {
    PathBuf::from("storage.json")
}

fn default_max_message_length() -> usize {
    4000
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_owned(),
            source,
        })?;
        Self::from_json(&data).map_err(|e| match e {
            ConfigError::Json { source, .. } => ConfigError::Json {
                path: path.to_owned(),
                source,
            },
            e => e,
        })
    }

    fn from_json(data: &str) -> Result<Config, ConfigError> {
        let config: Config = serde_json::from_str(data).map_err(|source| ConfigError::Json {
            path: PathBuf::new(),
            source,
        })?;

        if config.max_message_length == 0 {
            return Err(ConfigError::ZeroMessageLength);
        }
        if config.max_message_length > MAX_MESSAGE_LENGTH_LIMIT {
            return Err(ConfigError::MessageLengthTooLarge(config.max_message_length));
        }

        Ok(config)
    }
}
