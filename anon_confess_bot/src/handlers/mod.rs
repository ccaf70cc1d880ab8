use std::sync::Arc;

use bot_commons::useful_methods::*;
use html_escape::encode_text;
use teloxide::{
    payloads::{SendMessageSetters, SendPhotoSetters},
    prelude::*,
    sugar::request::RequestReplyExt,
    types::{ForceReply, InputFile, Me, PhotoSize},
    RequestError,
};

use crate::{
    config::FOOTER_ROOM,
    ledger::{LedgerError, LedgerStore, PostingNumber},
    Config,
};

mod moderation;
pub use moderation::handle_callback_query;

/// Telegram's limit on photo captions.
const MAX_CAPTION_LENGTH: usize = 1024;

/// Sent when `/confess` has nothing to post. Replies to it are taken as confessions.
const CONFESS_PROMPT: &str = "Reply to this message with the text of your anonymous message. \
You can attach a photo too.";

const HELP: &str = "This bot posts anonymous messages into a channel.

/confess <code>text</code> - send an anonymous message. \
Attach a photo with the command as its caption, or reply to one, to include it. \
Send just /confess to write a longer message.

Channel administrators can also use:
/block <code>number</code> - block whoever sent anon message #number from sending more.
/unblock [<code>number</code>] - lift a block. Without a number, pick from a list.";

pub async fn handle_message(
    bot: Bot,
    me: Me,
    message: Message,
    store: Arc<LedgerStore>,
    config: Arc<Config>,
) -> Result<(), RequestError> {
    // Bot ignores messages made by itself.
    if message.from.as_ref().map(|from| from.id) == Some(me.id) {
        return Ok(());
    }

    let Some(text) = message.text_full() else {
        // Could still be a photo replying to the prompt.
        if is_reply_to_prompt(&message, &me) {
            return submit_confession(&bot, &message, "", &store, &config).await;
        }
        return Ok(());
    };

    let Some(command) = CommandText::parse(text, me.username()) else {
        if is_reply_to_prompt(&message, &me) {
            return submit_confession(&bot, &message, text, &store, &config).await;
        }
        return Ok(());
    };

    if command.is("/start") || command.is("/help") {
        if message.chat.is_private() {
            bot.archsendmsg(message.chat.id, HELP, None).await?;
        }
    } else if command.is("/confess") {
        handle_confess(&bot, &message, command.params(), &store, &config).await?;
    } else if command.is("/block") {
        moderation::handle_block_command(&bot, &message, command.params(), &store, &config)
            .await?;
    } else if command.is("/unblock") {
        moderation::handle_unblock_command(&bot, &message, command.params(), &store, &config)
            .await?;
    }

    Ok(())
}

fn is_reply_to_prompt(message: &Message, me: &Me) -> bool {
    message.chat.is_private()
        && message.reply_to_message().is_some_and(|reply_to| {
            reply_to.from.as_ref().map(|from| from.id) == Some(me.id)
                && reply_to.text() == Some(CONFESS_PROMPT)
        })
}

async fn handle_confess(
    bot: &Bot,
    message: &Message,
    params: &str,
    store: &LedgerStore,
    config: &Config,
) -> Result<(), RequestError> {
    // Anyone seeing who sent the command would know who the confession is from.
    if !message.chat.is_private() {
        bot.archsendmsg(
            message.chat.id,
            "Please send /confess to me in private messages, to stay anonymous.",
            message.id,
        )
        .await?;
        return Ok(());
    }

    if params.is_empty() && message.find_biggest_photo_or_replied().is_none() {
        // No point in having them write it all out first.
        if let Some(user) = &message.from {
            if store.is_blocked(user.id.into()).await {
                bot.archsendmsg(
                    message.chat.id,
                    LedgerError::Blocked.to_string().as_str(),
                    message.id,
                )
                .await?;
                return Ok(());
            }
        }

        bot.send_message(message.chat.id, CONFESS_PROMPT)
            .reply_markup(ForceReply::new())
            .reply_to(message.id)
            .await?;
        return Ok(());
    }

    submit_confession(bot, message, params, store, config).await
}

/// Puts the confession into the ledger and posts it into the channel.
async fn submit_confession(
    bot: &Bot,
    message: &Message,
    content: &str,
    store: &LedgerStore,
    config: &Config,
) -> Result<(), RequestError> {
    let Some(user) = &message.from else {
        return Ok(());
    };

    let content = content.trim();
    let photo = message.find_biggest_photo_or_replied();

    if content.is_empty() && photo.is_none() {
        bot.archsendmsg(
            message.chat.id,
            "There's nothing to post. Send some text or a photo.",
            message.id,
        )
        .await?;
        return Ok(());
    }

    let length = content.chars().count();
    if length > config.max_message_length {
        bot.archsendmsg(
            message.chat.id,
            format!(
                "Your message is too long: {} characters, while the limit is {}.",
                length, config.max_message_length
            )
            .as_str(),
            message.id,
        )
        .await?;
        return Ok(());
    }

    let number = match store.submit(user.id.into()).await {
        Ok(number) => number,
        Err(e @ (LedgerError::Blocked | LedgerError::Exhausted)) => {
            log::debug!("Turned down a confession from {}: {}", user.id, e);
            bot.archsendmsg(message.chat.id, e.to_string().as_str(), message.id)
                .await?;
            return Ok(());
        }
        Err(e) => {
            log::error!("Failed to record a confession: {}", e);
            bot.archsendmsg(
                message.chat.id,
                "Oops! Something went wrong. Please try again later.",
                message.id,
            )
            .await?;
            return Ok(());
        }
    };

    if let Err(e) = post_to_channel(bot, config, content, photo, number).await {
        // The number stays taken. That's fine, numbers are never reused anyway.
        log::error!("Failed to post anon id {} into the channel: {}", number, e);
        bot.archsendmsg(
            message.chat.id,
            "Oops! Something went wrong while posting your message.",
            message.id,
        )
        .await?;
        return Ok(());
    }

    bot.archsendmsg(message.chat.id, "Done, your message is posted.", message.id)
        .await?;

    Ok(())
}

/// HTML text of a confession, with the anon number below it.
fn format_confession(content: &str, number: PostingNumber) -> String {
    let footer = format!("<i>Anon {}</i>", number);
    if content.is_empty() {
        footer
    } else {
        format!("{}\n\n{}", encode_text(content), footer)
    }
}

async fn post_to_channel(
    bot: &Bot,
    config: &Config,
    content: &str,
    photo: Option<&PhotoSize>,
    number: PostingNumber,
) -> Result<(), RequestError> {
    let text = format_confession(content, number);

    let Some(photo) = photo else {
        bot.archsendmsg(config.channel_id, text.as_str(), None)
            .await?;
        return Ok(());
    };

    let photo = InputFile::file_id(photo.file.id.clone());

    // Room for the footer.
    if content.chars().count() + FOOTER_ROOM <= MAX_CAPTION_LENGTH {
        bot.send_photo(config.channel_id, photo)
            .caption(text)
            .parse_mode(teloxide::types::ParseMode::Html)
            .await?;
    } else {
        // Doesn't fit into a caption. Post the photo with the number on it,
        // and the text right under it.
        let photo_message = bot
            .send_photo(config.channel_id, photo)
            .caption(format_confession("", number))
            .parse_mode(teloxide::types::ParseMode::Html)
            .await?;
        bot.archsendmsg(config.channel_id, text.as_str(), photo_message.id)
            .await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confession_formatting() {
        assert_eq!(
            format_confession("i <3 rust & tea", PostingNumber(12)),
            "i &lt;3 rust &amp; tea\n\n<i>Anon #12</i>"
        );
        assert_eq!(format_confession("", PostingNumber(1)), "<i>Anon #1</i>");
    }

    #[test]
    fn footer_fits_its_room() {
        let posted = format_confession("x", PostingNumber(u64::MAX));
        // Entities aren't counted by Telegram.
        let shown = posted.replace("<i>", "").replace("</i>", "");
        assert!(shown.chars().count() - 1 <= FOOTER_ROOM);
    }
}
