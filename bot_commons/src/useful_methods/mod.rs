mod command;
mod send_msg;
pub use command::*;
pub use send_msg::*;

use teloxide::types::{Message, PhotoSize};

pub trait MessageStuff {
    /// Text of the message, or its caption if it's media.
    fn text_full(&self) -> Option<&str>;
    /// Biggest available size of the photo in this message, if it has one.
    fn find_biggest_photo(&self) -> Option<&PhotoSize>;
    /// Same as [`MessageStuff::find_biggest_photo`], but falls back
    /// to the message this one replies to.
    fn find_biggest_photo_or_replied(&self) -> Option<&PhotoSize>;
}

impl MessageStuff for Message {
    fn text_full(&self) -> Option<&str> {
        self.text().or_else(|| self.caption())
    }
    fn find_biggest_photo(&self) -> Option<&PhotoSize> {
        self.photo()?.iter().max_by_key(|x| x.width + x.height)
    }
    fn find_biggest_photo_or_replied(&self) -> Option<&PhotoSize> {
        self.find_biggest_photo().or_else(|| {
            self.reply_to_message()
                .and_then(|reply_to| reply_to.find_biggest_photo())
        })
    }
}
