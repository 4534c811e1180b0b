use hostroll::config::{self, HostKeyPolicy};
use hostroll::provision::script::PackageManager;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

// Each test owns the variables it touches; tests run in parallel.

#[test]
fn test_ssh_timeout_defaults_and_overrides() {
    env::remove_var("SSH_TIMEOUT_SECS");
    assert_eq!(config::get_ssh_timeout(), Duration::from_secs(config::DEFAULT_SSH_TIMEOUT_SECS));

    env::set_var("SSH_TIMEOUT_SECS", "30");
    assert_eq!(config::get_ssh_timeout(), Duration::from_secs(30));

    env::set_var("SSH_TIMEOUT_SECS", "0");
    assert_eq!(config::get_ssh_timeout(), Duration::from_secs(config::DEFAULT_SSH_TIMEOUT_SECS));

    env::remove_var("SSH_TIMEOUT_SECS");
}

#[test]
fn test_package_manager_falls_back_to_apk() {
    env::set_var("PACKAGE_MANAGER", "apt");
    assert_eq!(config::get_package_manager(), PackageManager::Apt);

    env::set_var("PACKAGE_MANAGER", "pacman");
    assert_eq!(config::get_package_manager(), PackageManager::Apk);

    env::remove_var("PACKAGE_MANAGER");
    assert_eq!(config::get_package_manager(), PackageManager::Apk);
}

#[test]
fn test_host_key_check_reads_known_hosts_path() {
    env::set_var("SSH_HOST_KEY_CHECK", "known-hosts");
    env::set_var("SSH_KNOWN_HOSTS", "/tmp/hostroll_known_hosts");
    assert_eq!(
        config::get_host_key_policy(),
        HostKeyPolicy::KnownHosts(PathBuf::from("/tmp/hostroll_known_hosts"))
    );

    env::set_var("SSH_HOST_KEY_CHECK", "off");
    assert_eq!(config::get_host_key_policy(), HostKeyPolicy::Off);

    env::remove_var("SSH_HOST_KEY_CHECK");
    env::remove_var("SSH_KNOWN_HOSTS");
}

#[test]
fn test_registry_file_ignores_blank_value() {
    env::set_var("REGISTRY_FILE", "   ");
    assert_eq!(config::get_registry_file(), PathBuf::from(config::DEFAULT_REGISTRY_FILE));

    env::set_var("REGISTRY_FILE", "/var/lib/hostroll/ipmap.json");
    assert_eq!(config::get_registry_file(), PathBuf::from("/var/lib/hostroll/ipmap.json"));

    env::remove_var("REGISTRY_FILE");
}

#[test]
fn test_console_port_rejects_junk() {
    env::set_var("CONSOLE_PORT", "not-a-port");
    assert_eq!(config::get_console_port(), config::DEFAULT_PORT);

    env::set_var("CONSOLE_PORT", "9090");
    assert_eq!(config::get_console_port(), 9090);

    env::remove_var("CONSOLE_PORT");
}

#[test]
fn test_load_env_file_sets_variables() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("test.env");
    std::fs::write(&path, "UPLOAD_DIR=/srv/hostroll/uploads\n").unwrap();

    config::load_env_file(path.to_str());
    assert_eq!(config::get_upload_dir(), PathBuf::from("/srv/hostroll/uploads"));

    env::remove_var("UPLOAD_DIR");
}
