//! Boilerplate shared by the bots in this workspace: logger and runtime
//! setup, admin checks, and a few convenience methods over teloxide types.

use std::future::Future;

use teloxide::{
    prelude::*,
    types::{ChatMember, User},
    RequestError,
};

pub mod useful_methods;

/// Initialize logging and start the `closure` in an async runtime.
///
/// Logging uses the filter in the environment variable `RUST_LOG`, or
/// `default_filter` if it's unset or not unicode. This uses the crate
/// [pretty_env_logger][] internally, see its documentation for more details.
///
/// Timestamps are left out when running as a systemd service, as journald
/// adds its own.
///
/// [pretty_env_logger]: https://docs.rs/pretty_env_logger
pub fn start_everything(default_filter: &str, closure: impl Future<Output = ()>) {
    let log_filter = std::env::var_os("RUST_LOG")
        .and_then(|x| x.into_string().ok())
        .unwrap_or_else(|| default_filter.to_string());

    let running_as_systemd_service = std::env::var_os("JOURNAL_STREAM").is_some();

    let mut builder = match running_as_systemd_service {
        true => pretty_env_logger::formatted_builder(),
        false => pretty_env_logger::formatted_timed_builder(),
    };

    builder.parse_filters(&log_filter);

    if builder.try_init().is_err() {
        log::error!("Tried to init logger twice!");
    }

    log::info!("hi");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("Could not build the tokio runtime!")
        .block_on(closure);
}

/// Find out if a user of this ID is an owner or administrator of the chat of that ID.
///
/// The bot has to be able to see the chat's members for this to work, so for
/// channels it needs to be an administrator itself.
pub async fn is_admin_of(bot: &Bot, user: UserId, chat: ChatId) -> Result<bool, RequestError> {
    let ChatMember { kind, .. } = bot.get_chat_member(chat, user).await?;
    Ok(kind.is_privileged())
}

/// Tries to print the user in the prettiest way possible, with either `@username` or full name.
/// Optionally allows including user ID.
#[must_use]
pub fn user_name_prettyprint(user: &User, with_id: bool) -> String {
    let mut name = if let Some(username) = &user.username {
        format!("@{username}")
    } else {
        user.full_name()
    };

    if with_id {
        use std::fmt::Write;
        write!(name, " (userid {})", user.id).expect("Writing to a String never fails");
    }

    name
}
