use serde::{Deserialize, Deserializer, Serialize};

use crate::models::Account;

/// A registered remote machine. The registry keys these by network address.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostRecord {
    pub root_username: String,
    /// Stored in plaintext, matching the on-disk format of `ipmap.json`.
    pub root_password: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub accounts: Vec<Account>,
}

// Files written by older consoles store an empty roster as `null`.
fn null_as_empty<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<Account>, D::Error> {
    Ok(Option::<Vec<Account>>::deserialize(d)?.unwrap_or_default())
}

impl HostRecord {
    pub fn new(root_username: impl Into<String>, root_password: impl Into<String>) -> Self {
        HostRecord {
            root_username: root_username.into(),
            root_password: root_password.into(),
            accounts: vec![],
        }
    }

    pub fn usernames(&self) -> Vec<String> {
        self.accounts.iter().map(|a| a.username.clone()).collect()
    }
}
