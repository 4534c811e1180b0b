use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::provision::script::PackageManager;

// Default configuration constants
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_REGISTRY_FILE: &str = "ipmap.json";
pub const DEFAULT_UPLOAD_DIR: &str = "uploads";
pub const DEFAULT_SSH_PORT: u16 = 22;
pub const DEFAULT_SSH_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_PACKAGE_MANAGER: &str = "apk";

/// How the remote host identity is checked before authenticating.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HostKeyPolicy {
    /// Accept any host key. This is the historical behavior of the console.
    Off,
    /// Require the host key to match an entry in an OpenSSH known_hosts file.
    KnownHosts(PathBuf),
}

impl HostKeyPolicy {
    pub fn label(&self) -> String {
        match self {
            HostKeyPolicy::Off => "off (any host key accepted)".into(),
            HostKeyPolicy::KnownHosts(p) => format!("known-hosts ({})", p.display()),
        }
    }
}

/// Runtime settings resolved from the environment.
#[derive(Clone, Debug)]
pub struct Settings {
    pub registry_file: PathBuf,
    pub upload_dir: PathBuf,
    pub ssh_port: u16,
    pub ssh_timeout: Duration,
    pub host_key_policy: HostKeyPolicy,
    pub package_manager: PackageManager,
}

impl Settings {
    pub fn from_env() -> Self {
        Settings {
            registry_file: get_registry_file(),
            upload_dir: get_upload_dir(),
            ssh_port: get_ssh_port(),
            ssh_timeout: get_ssh_timeout(),
            host_key_policy: get_host_key_policy(),
            package_manager: get_package_manager(),
        }
    }
}

pub fn load_env_file(env_file: Option<&str>) {
    if let Some(path) = env_file {
        dotenvy::from_path(Path::new(path)).ok();
    } else {
        dotenvy::dotenv().ok();
    }
}

pub fn get_console_host() -> String {
    env::var("CONSOLE_HOST")
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| DEFAULT_HOST.to_string())
}

pub fn get_console_port() -> u16 {
    parse_or(env::var("CONSOLE_PORT").ok(), DEFAULT_PORT)
}

pub fn get_registry_file() -> PathBuf {
    PathBuf::from(non_empty_or(env::var("REGISTRY_FILE").ok(), DEFAULT_REGISTRY_FILE))
}

pub fn get_upload_dir() -> PathBuf {
    PathBuf::from(non_empty_or(env::var("UPLOAD_DIR").ok(), DEFAULT_UPLOAD_DIR))
}

pub fn get_ssh_port() -> u16 {
    parse_or(env::var("SSH_PORT").ok(), DEFAULT_SSH_PORT)
}

/// Deadline applied to the whole remote round trip. Zero falls back to the default.
pub fn get_ssh_timeout() -> Duration {
    let secs = parse_or(env::var("SSH_TIMEOUT_SECS").ok(), DEFAULT_SSH_TIMEOUT_SECS);
    Duration::from_secs(if secs == 0 { DEFAULT_SSH_TIMEOUT_SECS } else { secs })
}

pub fn get_host_key_policy() -> HostKeyPolicy {
    let raw = env::var("SSH_HOST_KEY_CHECK").unwrap_or_default();
    parse_host_key_policy(&raw, env::var("SSH_KNOWN_HOSTS").ok())
}

pub fn get_package_manager() -> PackageManager {
    let raw = non_empty_or(env::var("PACKAGE_MANAGER").ok(), DEFAULT_PACKAGE_MANAGER);
    PackageManager::from_str(&raw).unwrap_or_else(|| {
        tracing::warn!(value = %raw, "Unknown PACKAGE_MANAGER; falling back to apk");
        PackageManager::Apk
    })
}

pub fn parse_host_key_policy(raw: &str, known_hosts: Option<String>) -> HostKeyPolicy {
    match raw.trim().to_lowercase().as_str() {
        "known-hosts" | "known_hosts" | "strict" | "on" | "yes" => {
            let path = known_hosts
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(default_known_hosts);
            HostKeyPolicy::KnownHosts(path)
        }
        _ => HostKeyPolicy::Off,
    }
}

fn default_known_hosts() -> PathBuf {
    let home = env::var("HOME").unwrap_or_else(|_| "/root".to_string());
    Path::new(&home).join(".ssh").join("known_hosts")
}

fn non_empty_or(value: Option<String>, default: &str) -> String {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_or<T: std::str::FromStr>(value: Option<String>, default: T) -> T {
    value.and_then(|v| v.trim().parse::<T>().ok()).unwrap_or(default)
}
