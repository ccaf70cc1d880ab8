use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};
use teloxide::types::UserId;

/// Sequential number of one anonymous posting, shown as `Anon #N`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PostingNumber(pub u64);

impl PostingNumber {
    /// The posting number after this one, or [`None`] if they ran out.
    #[must_use]
    pub fn next(self) -> Option<PostingNumber> {
        self.0.checked_add(1).map(PostingNumber)
    }
}

impl Display for PostingNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl FromStr for PostingNumber {
    type Err = LedgerError;

    /// Parses `12` or `#12`. Zero isn't a posting number.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let digits = s.strip_prefix('#').unwrap_or(s);

        let number: u64 = digits
            .parse()
            .map_err(|_| LedgerError::InvalidArgument(format!("\"{s}\" is not an anon number")))?;

        if number == 0 {
            return Err(LedgerError::InvalidArgument(
                "anon numbers start from 1".to_string(),
            ));
        }

        Ok(PostingNumber(number))
    }
}

/// The real identity of whoever submitted a posting: their Telegram user ID.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubmitterId(pub u64);

impl From<UserId> for SubmitterId {
    fn from(value: UserId) -> Self {
        SubmitterId(value.0)
    }
}

impl From<SubmitterId> for UserId {
    fn from(value: SubmitterId) -> Self {
        UserId(value.0)
    }
}

impl Display for SubmitterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// The submitter is on the block-list.
    #[error("You have been blocked from confessing.")]
    Blocked,
    /// The anon number has no posting, or isn't blocked when unblocking.
    #[error("The anon id {0} does not exist.")]
    NotFound(PostingNumber),
    #[error("Invalid anon number: {0}")]
    InvalidArgument(String),
    /// Every posting number was already given out.
    #[error("There are no anon numbers left to give out.")]
    Exhausted,
    /// The ledger file has contents that make no sense.
    #[error("Ledger file is corrupt: {0}")]
    Corrupt(String),
    #[error("Ledger file could not be serialized or deserialized: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Ledger file could not be read or written: {0}")]
    Io(#[from] std::io::Error),
}

impl LedgerError {
    /// Whether this is a rejection of the request itself rather than a storage failure.
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::Blocked | Self::NotFound(_) | Self::InvalidArgument(_) | Self::Exhausted
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parsing_posting_numbers() {
        assert_eq!("12".parse::<PostingNumber>().unwrap(), PostingNumber(12));
        assert_eq!(" #7 ".parse::<PostingNumber>().unwrap(), PostingNumber(7));
        assert!(matches!(
            "0".parse::<PostingNumber>(),
            Err(LedgerError::InvalidArgument(_))
        ));
        assert!(matches!(
            "-3".parse::<PostingNumber>(),
            Err(LedgerError::InvalidArgument(_))
        ));
        assert!(matches!(
            "twelve".parse::<PostingNumber>(),
            Err(LedgerError::InvalidArgument(_))
        ));
        assert!(matches!(
            "".parse::<PostingNumber>(),
            Err(LedgerError::InvalidArgument(_))
        ));
    }

    #[test]
    fn display() {
        assert_eq!(PostingNumber(3).to_string(), "#3");
        assert_eq!(
            LedgerError::NotFound(PostingNumber(3)).to_string(),
            "The anon id #3 does not exist."
        );
    }
}
