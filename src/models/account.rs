use serde::{Deserialize, Serialize};

/// One OS user believed to exist on a registered host.
///
/// "Believed" matters: accounts are recorded from the intended set of a batch,
/// not from a confirmation parsed out of the remote transcript.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub username: String,
    pub password: String,
}

impl Account {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Account {
            username: username.into(),
            password: password.into(),
        }
    }
}
