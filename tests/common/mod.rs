//! Shared fixtures for the integration tests: a scripted stand-in for SSH and
//! a registry rooted in a temp directory.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use hostroll::config::{HostKeyPolicy, Settings};
use hostroll::models::{Account, AppState, HostRecord};
use hostroll::provision::executor::{ExecError, RemoteOutput, RemoteShell, RemoteTarget};
use hostroll::provision::script::PackageManager;
use hostroll::services::HostRegistry;

pub const HOST: &str = "10.0.0.5";

enum Outcome {
    Completed { transcript: String, exit_status: Option<i32> },
    Unreachable,
}

/// Records every script it is handed and answers with a fixed outcome,
/// optionally after a delay.
pub struct FakeShell {
    calls: Mutex<Vec<(RemoteTarget, String)>>,
    outcome: Outcome,
    delay: Duration,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl FakeShell {
    fn with_outcome(outcome: Outcome, delay: Duration) -> Arc<Self> {
        Arc::new(FakeShell {
            calls: Mutex::new(vec![]),
            outcome,
            delay,
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        })
    }

    pub fn ok(transcript: &str) -> Arc<Self> {
        FakeShell::slow(transcript, Duration::ZERO)
    }

    /// Succeeds, but only after sleeping for `delay`.
    pub fn slow(transcript: &str, delay: Duration) -> Arc<Self> {
        FakeShell::with_outcome(
            Outcome::Completed {
                transcript: transcript.to_string(),
                exit_status: Some(0),
            },
            delay,
        )
    }

    pub fn exiting(code: i32) -> Arc<Self> {
        FakeShell::with_outcome(
            Outcome::Completed {
                transcript: String::new(),
                exit_status: Some(code),
            },
            Duration::ZERO,
        )
    }

    pub fn unreachable() -> Arc<Self> {
        FakeShell::with_outcome(Outcome::Unreachable, Duration::ZERO)
    }

    pub fn scripts(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|(_, s)| s.clone()).collect()
    }

    pub fn targets(&self) -> Vec<RemoteTarget> {
        self.calls.lock().unwrap().iter().map(|(t, _)| t.clone()).collect()
    }

    /// Most scripts that were ever running at the same time.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteShell for FakeShell {
    async fn run_script(&self, target: &RemoteTarget, script: &str) -> Result<RemoteOutput, ExecError> {
        self.calls.lock().unwrap().push((target.clone(), script.to_string()));
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(running, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        match &self.outcome {
            Outcome::Completed { transcript, exit_status } => Ok(RemoteOutput {
                transcript: transcript.clone(),
                exit_status: *exit_status,
            }),
            Outcome::Unreachable => Err(ExecError::Connect {
                address: format!("{}:22", target.address),
                source: std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "connection refused"),
            }),
        }
    }
}

pub fn settings(dir: &Path) -> Settings {
    Settings {
        registry_file: dir.join("ipmap.json"),
        upload_dir: dir.join("uploads"),
        ssh_port: 22,
        ssh_timeout: Duration::from_secs(5),
        host_key_policy: HostKeyPolicy::Off,
        package_manager: PackageManager::Apk,
    }
}

/// A registry file in `dir` holding [`HOST`] with the given roster.
pub async fn registry_with_roster(dir: &Path, names: &[&str]) -> Arc<HostRegistry> {
    let mut host = HostRecord::new("root", "rootpw");
    host.accounts = names.iter().map(|n| Account::new(*n, format!("{}-pw", n))).collect();
    let mut hosts = BTreeMap::new();
    hosts.insert(HOST.to_string(), host);
    let registry = HostRegistry::new(dir.join("ipmap.json"), hosts);
    registry.persist().await.expect("seed registry");
    Arc::new(registry)
}

pub fn roster(registry: &HostRegistry) -> Vec<String> {
    registry.get(HOST).map(|h| h.usernames()).unwrap_or_default()
}

pub struct Console {
    pub dir: TempDir,
    pub state: AppState,
    pub shell: Arc<FakeShell>,
}

impl Console {
    pub async fn new(names: &[&str], shell: Arc<FakeShell>) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let registry = registry_with_roster(dir.path(), names).await;
        let state = AppState::new(registry, shell.clone(), settings(dir.path()));
        Console { dir, state, shell }
    }

    /// Point the registry at a directory so every rewrite fails.
    pub async fn with_broken_registry(names: &[&str], shell: Arc<FakeShell>) -> Self {
        let console = Console::new(names, shell).await;
        let broken: PathBuf = console.dir.path().join("registry-is-a-dir");
        std::fs::create_dir(&broken).expect("mkdir");
        let hosts = console.state.registry.snapshot();
        let registry = Arc::new(HostRegistry::new(broken, hosts));
        let state = AppState::new(registry, console.shell.clone(), settings(console.dir.path()));
        Console { state, ..console }
    }
}
