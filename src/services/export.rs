use std::collections::BTreeMap;

use chrono::{DateTime, Local};
use thiserror::Error;

use crate::models::HostRecord;

pub const EXPORT_HEADER: [&str; 4] = ["Username", "Password", "Server IP", "Notes"];

const TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("csv write failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("csv buffer flush failed: {0}")]
    Flush(String),
}

/// Roster of one host as CSV.
pub fn export_host_csv(address: &str, host: &HostRecord) -> Result<Vec<u8>, ExportError> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record(EXPORT_HEADER)?;
    write_accounts(&mut writer, address, host)?;
    finish(writer)
}

/// Rosters of every host, concatenated in address order.
pub fn export_all_csv(hosts: &BTreeMap<String, HostRecord>) -> Result<Vec<u8>, ExportError> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record(EXPORT_HEADER)?;
    for (address, host) in hosts {
        write_accounts(&mut writer, address, host)?;
    }
    finish(writer)
}

fn write_accounts(writer: &mut csv::Writer<Vec<u8>>, address: &str, host: &HostRecord) -> Result<(), ExportError> {
    for account in &host.accounts {
        writer.write_record([account.username.as_str(), account.password.as_str(), address, ""])?;
    }
    Ok(())
}

fn finish(writer: csv::Writer<Vec<u8>>) -> Result<Vec<u8>, ExportError> {
    writer.into_inner().map_err(|e| ExportError::Flush(e.to_string()))
}

pub fn host_export_filename(address: &str, at: DateTime<Local>) -> String {
    format!("users_{}_{}.csv", address.replace('.', "_"), at.format(TIMESTAMP_FORMAT))
}

pub fn all_export_filename(at: DateTime<Local>) -> String {
    format!("all_users_{}.csv", at.format(TIMESTAMP_FORMAT))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Account;
    use chrono::TimeZone;

    fn host(names: &[&str]) -> HostRecord {
        let mut h = HostRecord::new("root", "pw");
        h.accounts = names.iter().map(|n| Account::new(*n, format!("{}@1", n))).collect();
        h
    }

    #[test]
    fn host_export_has_header_and_rows() {
        let bytes = export_host_csv("10.0.0.5", &host(&["alice", "bob"])).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Username,Password,Server IP,Notes");
        assert_eq!(lines[1], "alice,alice@1,10.0.0.5,");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn all_export_concatenates_hosts() {
        let mut hosts = BTreeMap::new();
        hosts.insert("10.0.0.6".to_string(), host(&["carol"]));
        hosts.insert("10.0.0.5".to_string(), host(&["alice"]));
        let text = String::from_utf8(export_all_csv(&hosts).unwrap()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].ends_with("10.0.0.5,"));
        assert!(lines[2].ends_with("10.0.0.6,"));
    }

    #[test]
    fn passwords_with_commas_are_quoted() {
        let mut h = HostRecord::new("root", "pw");
        h.accounts.push(Account::new("dave", "a,b"));
        let text = String::from_utf8(export_host_csv("h", &h).unwrap()).unwrap();
        assert!(text.contains("dave,\"a,b\",h,"));
    }

    #[test]
    fn filenames() {
        let at = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(host_export_filename("10.0.0.5", at), "users_10_0_0_5_20240309-140507.csv");
        assert_eq!(all_export_filename(at), "all_users_20240309-140507.csv");
    }
}
