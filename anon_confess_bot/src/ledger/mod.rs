mod file;
mod store;
mod types;

use std::collections::{BTreeMap, BTreeSet};

pub use store::LedgerStore;
pub use types::*;

/// Record of every anonymous posting number and who is behind it,
/// plus who is currently blocked from posting.
///
/// A submitter is blocked through one or more of their posting numbers.
/// They stay on the block-list for as long as any of those numbers is blocked,
/// and unblocking the last one lets them post again.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Ledger {
    /// Last assigned posting number, or 0 if none were.
    count: u64,
    postings: BTreeMap<PostingNumber, SubmitterId>,
    blocked_users: BTreeSet<SubmitterId>,
    /// Every one of these has a posting, and its submitter is in `blocked_users`.
    blocked_numbers: BTreeSet<PostingNumber>,
}

impl Ledger {
    #[must_use]
    pub fn new() -> Ledger {
        Ledger::default()
    }

    /// Last assigned posting number, or 0 if nothing was posted yet.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.count
    }

    #[must_use]
    pub fn submitter_of(&self, number: PostingNumber) -> Option<SubmitterId> {
        self.postings.get(&number).copied()
    }

    #[must_use]
    pub fn is_blocked(&self, submitter: SubmitterId) -> bool {
        self.blocked_users.contains(&submitter)
    }

    /// Blocked posting numbers, in ascending order.
    pub fn blocked_numbers(&self) -> impl DoubleEndedIterator<Item = PostingNumber> + '_ {
        self.blocked_numbers.iter().copied()
    }

    /// Assigns the next posting number to this submitter.
    ///
    /// # Errors
    /// [`LedgerError::Blocked`] if the submitter is on the block-list,
    /// [`LedgerError::Exhausted`] if `count` is at its maximum.
    /// Nothing changes then.
    pub fn submit(&mut self, submitter: SubmitterId) -> Result<PostingNumber, LedgerError> {
        if self.is_blocked(submitter) {
            return Err(LedgerError::Blocked);
        }

        let number = PostingNumber(self.count)
            .next()
            .ok_or(LedgerError::Exhausted)?;
        self.count = number.0;
        self.postings.insert(number, submitter);

        Ok(number)
    }

    /// Blocks whoever is behind this posting number from posting further.
    /// Blocking an already blocked number changes nothing.
    ///
    /// # Errors
    /// [`LedgerError::InvalidArgument`] for number 0, [`LedgerError::NotFound`]
    /// if there's no such posting. Nothing changes then.
    pub fn block(&mut self, number: PostingNumber) -> Result<SubmitterId, LedgerError> {
        if number.0 == 0 {
            return Err(LedgerError::InvalidArgument(
                "anon numbers start from 1".to_string(),
            ));
        }

        let submitter = self
            .submitter_of(number)
            .ok_or(LedgerError::NotFound(number))?;

        self.blocked_users.insert(submitter);
        self.blocked_numbers.insert(number);

        Ok(submitter)
    }

    /// Lifts the block made through this posting number.
    ///
    /// The submitter is taken off the block-list only if none of their
    /// other posting numbers are blocked too.
    ///
    /// # Errors
    /// [`LedgerError::NotFound`] if this number is not blocked. Nothing changes then.
    pub fn unblock(&mut self, number: PostingNumber) -> Result<SubmitterId, LedgerError> {
        if !self.blocked_numbers.contains(&number) {
            return Err(LedgerError::NotFound(number));
        }

        let submitter = self.submitter_of(number).ok_or_else(|| {
            LedgerError::Corrupt(format!("blocked anon id {number} has no posting"))
        })?;

        self.blocked_numbers.remove(&number);

        let still_blocked_elsewhere = self
            .blocked_numbers
            .iter()
            .any(|x| self.postings.get(x) == Some(&submitter));

        if !still_blocked_elsewhere {
            self.blocked_users.remove(&submitter);
        }

        Ok(submitter)
    }
}
