//! Source code for a bot that posts anonymous confessions into a channel,
//! and lets the channel's administrators block anonymous posters by number.

/// Bot settings loaded at startup.
mod config;

/// The ledger of anonymous posting numbers and who's blocked.
pub mod ledger;

/// Functions that handle events from Telegram.
mod handlers;

/// Entry function that starts the bot.
mod entry;
pub use entry::*;

pub use config::{Config, ConfigError};

/// Where the bot's settings are read from.
pub const CONFIG_PATH: &str = "anon_confess_bot.json";
