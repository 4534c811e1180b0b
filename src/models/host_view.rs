use crate::models::HostRecord;

#[derive(Clone, Debug)]
pub struct AccountRow {
    pub username: String,
    pub password: String,
}

/// Flattened host used by the page templates. The admin secret is never exposed.
#[derive(Clone, Debug)]
pub struct HostView {
    pub address: String,
    pub root_username: String,
    pub accounts: Vec<AccountRow>,
    pub account_count: usize,
}

impl HostView {
    pub fn from_record(address: &str, rec: &HostRecord) -> Self {
        let accounts: Vec<AccountRow> = rec
            .accounts
            .iter()
            .map(|a| AccountRow {
                username: a.username.clone(),
                password: a.password.clone(),
            })
            .collect();
        HostView {
            address: address.to_string(),
            root_username: rec.root_username.clone(),
            account_count: accounts.len(),
            accounts,
        }
    }
}
