//! Roster bookkeeping after a batch.
//!
//! The roster records *intended* remote state: a username is added or removed
//! because the batch script targeted it, not because the transcript proved the
//! remote command worked.

use crate::models::Account;

/// What a batch meant to change on the roster.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Intent {
    pub added: Vec<Account>,
    pub removed: Vec<String>,
    /// Drop the whole roster ("delete all").
    pub clear: bool,
}

impl Intent {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && !self.clear
    }

    /// Every username the batch targeted, in script order.
    pub fn usernames(&self) -> Vec<String> {
        self.added
            .iter()
            .map(|a| a.username.clone())
            .chain(self.removed.iter().cloned())
            .collect()
    }
}

/// Compute the roster that replaces `roster` once a batch has run.
///
/// Removals and clearing apply first, then additions. An added username that
/// is already present keeps its slot and takes the new password, so usernames
/// stay unique within the roster.
pub fn reconcile(roster: &[Account], intent: &Intent) -> Vec<Account> {
    let mut next: Vec<Account> = if intent.clear {
        vec![]
    } else {
        roster
            .iter()
            .filter(|a| !intent.removed.iter().any(|r| r == &a.username))
            .cloned()
            .collect()
    };
    for account in &intent.added {
        match next.iter_mut().find(|a| a.username == account.username) {
            Some(existing) => existing.password = account.password.clone(),
            None => next.push(account.clone()),
        }
    }
    next
}
