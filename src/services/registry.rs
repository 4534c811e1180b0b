use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tokio::sync::OwnedMutexGuard;

use crate::models::{Account, HostRecord};
use crate::provision::script::is_single_line;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("cannot write {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot serialize host records: {0}")]
    Json(#[from] serde_json::Error),

    #[error("host {0} is not registered")]
    UnknownHost(String),

    #[error("invalid host address {0:?}")]
    InvalidAddress(String),

    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("root password must not contain line breaks")]
    MultiLineSecret,
}

/// Proof that the caller holds the per-host batch lock for `address`.
pub struct HostGuard {
    address: String,
    _lock: OwnedMutexGuard<()>,
}

impl HostGuard {
    pub fn address(&self) -> &str {
        &self.address
    }
}

/// Registered hosts keyed by address, backed by one JSON file.
///
/// Reads go through an in-memory map. Every mutation rewrites the whole file
/// (temp file + rename), and rewrites are serialized so the last snapshot on
/// disk is always the latest in memory. Batches take the per-host lock through
/// [`HostRegistry::lock_host`] so at most one batch runs per host.
pub struct HostRegistry {
    path: PathBuf,
    hosts: Mutex<BTreeMap<String, HostRecord>>,
    host_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    write_lock: tokio::sync::Mutex<()>,
}

impl HostRegistry {
    pub fn new(path: impl Into<PathBuf>, hosts: BTreeMap<String, HostRecord>) -> Self {
        HostRegistry {
            path: path.into(),
            hosts: Mutex::new(hosts),
            host_locks: Mutex::new(HashMap::new()),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Load the registry file. A missing or malformed file yields an empty registry.
    pub async fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let hosts = match tokio::fs::read_to_string(&path).await {
            Ok(text) => match serde_json::from_str::<BTreeMap<String, HostRecord>>(&text) {
                Ok(map) => {
                    tracing::info!(path = %path.display(), hosts = map.len(), "Loaded host registry");
                    map
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), %e, "Host registry is malformed; starting empty");
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                tracing::warn!(path = %path.display(), %e, "Cannot read host registry; starting empty");
                BTreeMap::new()
            }
        };
        HostRegistry::new(path, hosts)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, address: &str) -> Option<HostRecord> {
        self.hosts.lock().unwrap().get(address).cloned()
    }

    pub fn contains(&self, address: &str) -> bool {
        self.hosts.lock().unwrap().contains_key(address)
    }

    pub fn snapshot(&self) -> BTreeMap<String, HostRecord> {
        self.hosts.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.hosts.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Wait for exclusive batch access to a registered host.
    pub async fn lock_host(&self, address: &str) -> Result<HostGuard, RegistryError> {
        if !self.contains(address) {
            return Err(RegistryError::UnknownHost(address.to_string()));
        }
        Ok(self.lock_address(address).await)
    }

    async fn lock_address(&self, address: &str) -> HostGuard {
        let lock = {
            let mut locks = self.host_locks.lock().unwrap();
            locks
                .entry(address.to_string())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
                .clone()
        };
        HostGuard {
            address: address.to_string(),
            _lock: lock.lock_owned().await,
        }
    }

    /// Register a host or update the credentials of an existing one. The
    /// roster of an existing host is kept. Returns `true` when the host is new.
    pub async fn register(&self, address: &str, root_username: &str, root_password: &str) -> Result<bool, RegistryError> {
        let address = address.trim();
        if address.is_empty() {
            return Err(RegistryError::MissingField("address"));
        }
        if address.chars().any(|c| c.is_whitespace() || c == '/') {
            return Err(RegistryError::InvalidAddress(address.to_string()));
        }
        let root_username = root_username.trim();
        if root_username.is_empty() {
            return Err(RegistryError::MissingField("root username"));
        }
        if !is_single_line(root_password.trim()) {
            return Err(RegistryError::MultiLineSecret);
        }

        let guard = self.lock_address(address).await;
        let created = {
            let mut hosts = self.hosts.lock().unwrap();
            match hosts.get_mut(guard.address()) {
                Some(existing) => {
                    existing.root_username = root_username.to_string();
                    existing.root_password = root_password.trim().to_string();
                    false
                }
                None => {
                    hosts.insert(
                        guard.address().to_string(),
                        HostRecord::new(root_username, root_password.trim()),
                    );
                    true
                }
            }
        };
        self.persist().await?;
        tracing::info!(address, created, "Registered host");
        Ok(created)
    }

    /// Replace the roster of the locked host and rewrite the file.
    pub async fn replace_accounts(&self, guard: &HostGuard, accounts: Vec<Account>) -> Result<(), RegistryError> {
        {
            let mut hosts = self.hosts.lock().unwrap();
            let host = hosts
                .get_mut(guard.address())
                .ok_or_else(|| RegistryError::UnknownHost(guard.address().to_string()))?;
            host.accounts = accounts;
        }
        self.persist().await
    }

    /// Rewrite the backing file from the current in-memory map.
    pub async fn persist(&self) -> Result<(), RegistryError> {
        let _write = self.write_lock.lock().await;
        let content = {
            let hosts = self.hosts.lock().unwrap();
            serde_json::to_string_pretty(&*hosts)?
        };
        let io_err = |source| RegistryError::Io {
            path: self.path.display().to_string(),
            source,
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, content).await.map_err(io_err)?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(io_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let reg = HostRegistry::load(dir.path().join("ipmap.json")).await;
        assert!(reg.is_empty());
    }

    #[tokio::test]
    async fn malformed_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ipmap.json");
        std::fs::write(&path, "{not json").unwrap();
        let reg = HostRegistry::load(&path).await;
        assert!(reg.is_empty());
    }

    #[tokio::test]
    async fn register_persists_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ipmap.json");
        let reg = HostRegistry::load(&path).await;
        assert!(reg.register(" 10.0.0.5 ", "root", "pw").await.unwrap());

        let reloaded = HostRegistry::load(&path).await;
        let host = reloaded.get("10.0.0.5").expect("host should be persisted");
        assert_eq!(host.root_username, "root");
        assert_eq!(host.root_password, "pw");
    }

    #[tokio::test]
    async fn reregister_keeps_roster() {
        let dir = tempfile::tempdir().unwrap();
        let reg = HostRegistry::load(dir.path().join("ipmap.json")).await;
        reg.register("10.0.0.5", "root", "old").await.unwrap();
        {
            let guard = reg.lock_host("10.0.0.5").await.unwrap();
            reg.replace_accounts(&guard, vec![Account::new("alice", "a")]).await.unwrap();
        }
        assert!(!reg.register("10.0.0.5", "admin", "new").await.unwrap());
        let host = reg.get("10.0.0.5").unwrap();
        assert_eq!(host.root_username, "admin");
        assert_eq!(host.accounts.len(), 1);
    }

    #[tokio::test]
    async fn register_rejects_bad_input() {
        let dir = tempfile::tempdir().unwrap();
        let reg = HostRegistry::load(dir.path().join("ipmap.json")).await;
        assert!(matches!(reg.register("  ", "root", "pw").await, Err(RegistryError::MissingField(_))));
        assert!(matches!(reg.register("10.0.0.5 x", "root", "pw").await, Err(RegistryError::InvalidAddress(_))));
        assert!(matches!(reg.register("10.0.0.5", "", "pw").await, Err(RegistryError::MissingField(_))));
        assert!(matches!(reg.register("10.0.0.5", "root", "p\nw").await, Err(RegistryError::MultiLineSecret)));
        assert!(reg.is_empty());
    }

    #[tokio::test]
    async fn persist_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the file should be makes the rename fail.
        let path = dir.path().join("ipmap.json");
        std::fs::create_dir(&path).unwrap();
        let reg = HostRegistry::new(&path, BTreeMap::new());
        assert!(matches!(reg.persist().await, Err(RegistryError::Io { .. })));
    }

    #[tokio::test]
    async fn host_lock_is_exclusive_per_host() {
        let mut hosts = BTreeMap::new();
        hosts.insert("a".to_string(), HostRecord::new("root", "pw"));
        hosts.insert("b".to_string(), HostRecord::new("root", "pw"));
        let reg = Arc::new(HostRegistry::new("unused.json", hosts));
        let first = reg.lock_host("a").await.unwrap();
        // A different host is not blocked.
        let _other = reg.lock_host("b").await.unwrap();

        let reg2 = reg.clone();
        let waiter = tokio::spawn(async move {
            let _g = reg2.lock_host("a").await.unwrap();
        });
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());
        drop(first);
        waiter.await.unwrap();
    }

    #[tokio::test]
    async fn unknown_hosts_get_no_lock() {
        let reg = HostRegistry::new("unused.json", BTreeMap::new());
        for n in 0..10 {
            let address = format!("10.9.9.{}", n);
            assert!(matches!(reg.lock_host(&address).await, Err(RegistryError::UnknownHost(_))));
        }
        assert!(reg.host_locks.lock().unwrap().is_empty());
    }
}
