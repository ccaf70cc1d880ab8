use std::{future::Future, time::Duration};

use teloxide::{
    payloads::SendMessageSetters,
    requests::Requester,
    sugar::request::{RequestLinkPreviewExt, RequestReplyExt},
    types::{Message, MessageId, Recipient},
    Bot, RequestError,
};

pub trait BotArchSendMsg {
    /// Opinionated method to send a message, with HTML markup, no link previews,
    /// and retries due to flood waiting or any other issues.
    fn archsendmsg<'a>(
        &'a self,
        to_where: impl Into<Recipient> + Send,
        text: impl Into<&'a str> + Send,
        reply_to: impl Into<Option<MessageId>> + Send,
    ) -> impl Future<Output = Result<Message, RequestError>> + Send;
}

impl BotArchSendMsg for Bot {
    async fn archsendmsg<'a>(
        &'a self,
        to_where: impl Into<Recipient> + Send,
        text: impl Into<&'a str> + Send,
        reply_to: impl Into<Option<MessageId>> + Send,
    ) -> Result<Message, RequestError> {
        let to_where: Recipient = to_where.into();
        let text = text.into();
        let reply_to = reply_to.into();

        // Try up to 3 times lol
        let mut looped: u8 = 0;
        loop {
            looped += 1;
            let mut request = self
                .send_message(to_where.clone(), text)
                .parse_mode(teloxide::types::ParseMode::Html)
                .disable_link_preview(true);
            if let Some(reply_to) = reply_to {
                request = request.reply_to(reply_to);
            }
            match request.await {
                Ok(message) => return Ok(message),
                Err(e) if looped >= 3 => return Err(e),
                Err(RequestError::RetryAfter(duration)) => {
                    log::debug!("Flood waiting for {:?} before resending.", duration);
                    tokio::time::sleep(duration.duration()).await;
                }
                Err(e) => {
                    log::warn!("Failed to send a message, retrying: {}", e);
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
    }
}
