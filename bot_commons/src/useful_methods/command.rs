/// A `/command` split out of message text.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CommandText<'a> {
    callname: &'a str,
    params: &'a str,
}

impl<'a> CommandText<'a> {
    /// Parses message text as a command.
    ///
    /// Returns [`None`] if the text is not a command, or if it is a
    /// `/command@SomeOtherBot` addressed to a bot that isn't `bot_username`.
    #[must_use]
    pub fn parse(text: &'a str, bot_username: &str) -> Option<Self> {
        if !text.starts_with('/') {
            return None;
        }

        let command = text.split_whitespace().next()?;

        if !command.is_ascii() {
            // Telegram commands must be ASCII.
            // See https://core.telegram.org/bots/api#botcommand
            return None;
        }

        // If the command is "/confess@Some_Bot", trim the "@" and everything after it,
        // checking that it's actually us.
        let callname = if let Some(username_start) = command.find('@') {
            // Bot names are guaranteed ASCII, so ignore ASCII case specifically.
            if !command[username_start + '@'.len_utf8()..].eq_ignore_ascii_case(bot_username) {
                return None;
            }
            &command[..username_start]
        } else {
            command
        };

        Some(CommandText {
            callname,
            params: text[command.len()..].trim(),
        })
    }

    /// The command itself, like `/confess`.
    #[must_use]
    pub fn callname(&self) -> &'a str {
        self.callname
    }

    /// Everything after the command, trimmed.
    ///
    /// If the input is `/Hewwo everypony bazinga`,
    /// this will be the substring `everypony bazinga`.
    #[must_use]
    pub fn params(&self) -> &'a str {
        self.params
    }

    /// Case-insensitive check of the callname, like `is("/start")`.
    #[must_use]
    pub fn is(&self, callname: &str) -> bool {
        self.callname.eq_ignore_ascii_case(callname)
    }
}
