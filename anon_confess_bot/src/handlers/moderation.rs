use std::sync::Arc;

use bot_commons::{is_admin_of, useful_methods::BotArchSendMsg, user_name_prettyprint};
use teloxide::{
    payloads::{AnswerCallbackQuerySetters, EditMessageTextSetters, SendMessageSetters},
    prelude::*,
    sugar::request::RequestReplyExt,
    types::{InlineKeyboardButton, InlineKeyboardMarkup, User},
    RequestError,
};

use crate::{
    ledger::{LedgerError, LedgerStore, PostingNumber},
    Config,
};

/// Telegram allows at most 100 buttons on an inline keyboard. Leave room for "Cancel".
const MAX_UNBLOCK_BUTTONS: usize = 96;
const BUTTONS_PER_ROW: usize = 4;

const UNBLOCK_CALLBACK_PREFIX: &str = "UNBLOCK ";
const CANCEL_CALLBACK: &str = "UNBLOCK_CANCEL";

/// Check if whoever sent this message may block and unblock, and tell them off if not.
async fn authenticate_admin(
    bot: &Bot,
    message: &Message,
    config: &Config,
) -> Result<Option<User>, RequestError> {
    let Some(user) = &message.from else {
        return Ok(None);
    };

    if is_admin_of(bot, user.id, config.channel_id).await? {
        return Ok(Some(user.clone()));
    }

    log::info!(
        "Non-admin tried to moderate: {}",
        user_name_prettyprint(user, true)
    );
    bot.archsendmsg(
        message.chat.id,
        "Only administrators of the channel can do this.",
        message.id,
    )
    .await?;
    Ok(None)
}

/// Human-readable reason for why blocking or unblocking failed.
fn rejection_text(error: &LedgerError, unblocking: bool) -> String {
    match error {
        LedgerError::NotFound(number) if unblocking => {
            format!("The anon id <b>{number}</b> is not blocked.")
        }
        LedgerError::NotFound(number) => format!("The anon id <b>{number}</b> does not exist."),
        e if e.is_rejection() => html_escape::encode_text(&e.to_string()).into_owned(),
        _ => "Oops! Something went wrong. Please try again later.".to_string(),
    }
}

pub async fn handle_block_command(
    bot: &Bot,
    message: &Message,
    params: &str,
    store: &LedgerStore,
    config: &Config,
) -> Result<(), RequestError> {
    let Some(user) = authenticate_admin(bot, message, config).await? else {
        return Ok(());
    };

    if params.is_empty() {
        bot.archsendmsg(
            message.chat.id,
            "Usage: /block <code>number</code>",
            message.id,
        )
        .await?;
        return Ok(());
    }

    let result = match params.parse::<PostingNumber>() {
        Ok(number) => store.block(number).await.map(|submitter| (number, submitter)),
        Err(e) => Err(e),
    };

    let response = match result {
        Ok((number, submitter)) => {
            log::info!(
                "{} blocked anon id {} (userid {})",
                user_name_prettyprint(&user, true),
                number,
                submitter
            );
            format!("The anon id <b>{number}</b> is now blocked from sending further messages.")
        }
        Err(e) => {
            if !e.is_rejection() {
                log::error!("Failed to block: {}", e);
            }
            rejection_text(&e, false)
        }
    };

    bot.archsendmsg(message.chat.id, response.as_str(), message.id)
        .await?;
    Ok(())
}

pub async fn handle_unblock_command(
    bot: &Bot,
    message: &Message,
    params: &str,
    store: &LedgerStore,
    config: &Config,
) -> Result<(), RequestError> {
    let Some(user) = authenticate_admin(bot, message, config).await? else {
        return Ok(());
    };

    if params.is_empty() {
        return send_unblock_keyboard(bot, message, store).await;
    }

    let response = match params.parse::<PostingNumber>() {
        Ok(number) => unblock(store, &user, number).await,
        Err(e) => rejection_text(&e, true),
    };

    bot.archsendmsg(message.chat.id, response.as_str(), message.id)
        .await?;
    Ok(())
}

/// Unblocks and returns the response to show.
async fn unblock(store: &LedgerStore, user: &User, number: PostingNumber) -> String {
    match store.unblock(number).await {
        Ok(submitter) => {
            log::info!(
                "{} unblocked anon id {} (userid {})",
                user_name_prettyprint(user, true),
                number,
                submitter
            );
            format!("The anon id <b>{number}</b> is now unblocked.")
        }
        Err(e) => {
            if !e.is_rejection() {
                log::error!("Failed to unblock: {}", e);
            }
            rejection_text(&e, true)
        }
    }
}

/// Keyboard with a button per blocked number, newest first, and a "Cancel" button.
fn unblock_keyboard(blocked: &[PostingNumber]) -> InlineKeyboardMarkup {
    let buttons = blocked
        .iter()
        .rev()
        .take(MAX_UNBLOCK_BUTTONS)
        .map(|number| {
            InlineKeyboardButton::callback(
                number.to_string(),
                format!("{}{}", UNBLOCK_CALLBACK_PREFIX, number.0),
            )
        })
        .collect::<Vec<_>>();

    let mut rows = buttons
        .chunks(BUTTONS_PER_ROW)
        .map(<[InlineKeyboardButton]>::to_vec)
        .collect::<Vec<_>>();

    rows.push(vec![InlineKeyboardButton::callback(
        "Cancel".to_string(),
        CANCEL_CALLBACK.to_string(),
    )]);

    InlineKeyboardMarkup::new(rows)
}

async fn send_unblock_keyboard(
    bot: &Bot,
    message: &Message,
    store: &LedgerStore,
) -> Result<(), RequestError> {
    let blocked = store.blocked_numbers().await;

    if blocked.is_empty() {
        bot.archsendmsg(message.chat.id, "No anon to unblock currently.", message.id)
            .await?;
        return Ok(());
    }

    let text = if blocked.len() > MAX_UNBLOCK_BUTTONS {
        format!(
            "Choose the anon id to unblock. Showing the {} most recent out of {}; \
            use /unblock <code>number</code> for the rest.",
            MAX_UNBLOCK_BUTTONS,
            blocked.len()
        )
    } else {
        "Choose the anon id to unblock.".to_string()
    };

    bot.send_message(message.chat.id, text)
        .parse_mode(teloxide::types::ParseMode::Html)
        .reply_markup(unblock_keyboard(&blocked))
        .reply_to(message.id)
        .await?;
    Ok(())
}

/// What a button press on the unblock keyboard asks for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum UnblockCallback {
    Unblock(PostingNumber),
    Cancel,
}

impl UnblockCallback {
    fn parse(data: &str) -> Option<UnblockCallback> {
        if data == CANCEL_CALLBACK {
            return Some(UnblockCallback::Cancel);
        }
        let number = data.strip_prefix(UNBLOCK_CALLBACK_PREFIX)?.parse().ok()?;
        Some(UnblockCallback::Unblock(number))
    }
}

pub async fn handle_callback_query(
    bot: Bot,
    query: CallbackQuery,
    store: Arc<LedgerStore>,
    config: Arc<Config>,
) -> Result<(), RequestError> {
    macro_rules! goodbye {
        ($text:expr) => {
            bot.answer_callback_query(query.id.clone())
                .text($text)
                .await?;
            return Ok(());
        };
        () => {
            bot.answer_callback_query(query.id.clone()).await?;
            return Ok(());
        };
    }

    let Some(callback) = query.data.as_deref().and_then(UnblockCallback::parse) else {
        goodbye!("Invalid query data.");
    };

    if !is_admin_of(&bot, query.from.id, config.channel_id).await? {
        log::info!(
            "Non-admin tried to press unblock buttons: {}",
            user_name_prettyprint(&query.from, true)
        );
        goodbye!("Access denied.");
    }

    let response = match callback {
        UnblockCallback::Cancel => "Cancelled!".to_string(),
        UnblockCallback::Unblock(number) => unblock(&store, &query.from, number).await,
    };

    let Some(message) = query.regular_message() else {
        // May happen if the message is too old
        goodbye!("Done.");
    };

    bot.edit_message_text(message.chat.id, message.id, response)
        .parse_mode(teloxide::types::ParseMode::Html)
        .reply_markup(InlineKeyboardMarkup::default())
        .await?;

    goodbye!();
}
