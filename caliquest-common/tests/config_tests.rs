//! Configuration resolution and graceful degradation
//!
//! Tests that touch CALIQUEST_ROOT_FOLDER / CALIQUEST_ROOT are marked
//! #[serial] so they never run in parallel with each other.

use caliquest_common::config::{
    CompiledDefaults, LoggingConfig, RootFolderInitializer, RootFolderResolver, TomlConfig,
    DEFAULT_PORT, ROOT_ENV, ROOT_FOLDER_ENV,
};
use serial_test::serial;
use std::env;
use std::path::PathBuf;

fn clear_env() {
    env::remove_var(ROOT_FOLDER_ENV);
    env::remove_var(ROOT_ENV);
}

/// Resolver pinned to a config file that does not exist
fn isolated_resolver() -> RootFolderResolver {
    RootFolderResolver::new("test-module").with_config_file(Some(PathBuf::from(format!(
        "/tmp/caliquest-no-such-config-{}.toml",
        std::process::id()
    ))))
}

#[test]
fn test_compiled_defaults_for_current_platform() {
    let defaults = CompiledDefaults::for_current_platform();

    assert!(!defaults.root_folder.as_os_str().is_empty());
    assert!(defaults.root_folder.to_string_lossy().contains("caliquest"));
    assert_eq!(defaults.port, DEFAULT_PORT);
    assert_eq!(defaults.log_level, "info");
    assert!(defaults.log_file.is_none());
}

#[test]
#[serial]
fn test_resolver_with_no_overrides_uses_default() {
    clear_env();

    let root_folder = isolated_resolver().resolve();

    assert_eq!(root_folder, CompiledDefaults::for_current_platform().root_folder);
}

#[test]
#[serial]
fn test_resolver_env_var_root_folder() {
    clear_env();
    env::set_var(ROOT_FOLDER_ENV, "/tmp/caliquest-test-env-folder");

    let root_folder = isolated_resolver().resolve();
    assert_eq!(root_folder, PathBuf::from("/tmp/caliquest-test-env-folder"));

    clear_env();
}

#[test]
#[serial]
fn test_resolver_root_folder_env_takes_precedence() {
    clear_env();
    env::set_var(ROOT_FOLDER_ENV, "/tmp/caliquest-priority-1");
    env::set_var(ROOT_ENV, "/tmp/caliquest-priority-2");

    let root_folder = isolated_resolver().resolve();
    assert_eq!(root_folder, PathBuf::from("/tmp/caliquest-priority-1"));

    clear_env();
}

#[test]
#[serial]
fn test_cli_arg_beats_env() {
    clear_env();
    env::set_var(ROOT_FOLDER_ENV, "/tmp/caliquest-from-env");

    let root_folder = isolated_resolver()
        .with_cli_arg(Some(PathBuf::from("/tmp/caliquest-from-cli")))
        .resolve();
    assert_eq!(root_folder, PathBuf::from("/tmp/caliquest-from-cli"));

    clear_env();
}

#[test]
#[serial]
fn test_toml_file_used_when_no_cli_or_env() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("caliquest-server.toml");
    std::fs::write(
        &config_path,
        r#"
            root_folder = "/srv/caliquest"
            port = 6100
            public_base_url = "https://quest.example.com"
            [logging]
            level = "debug"
        "#,
    )
    .unwrap();

    let resolver = RootFolderResolver::new("caliquest-server").with_config_file(Some(config_path));
    let config = resolver.bootstrap(None);

    assert_eq!(config.root_folder, PathBuf::from("/srv/caliquest"));
    assert_eq!(config.port, 6100);
    assert_eq!(config.public_base_url, "https://quest.example.com");
    assert_eq!(config.logging.level, "debug");

    // CLI port still wins
    assert_eq!(resolver.bootstrap(Some(7000)).port, 7000);
}

#[test]
#[serial]
fn test_invalid_toml_degrades_to_defaults() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("broken.toml");
    std::fs::write(&config_path, "root_folder = [not toml").unwrap();

    let config = RootFolderResolver::new("broken")
        .with_config_file(Some(config_path))
        .bootstrap(None);

    assert_eq!(config.root_folder, CompiledDefaults::for_current_platform().root_folder);
    assert_eq!(config.port, DEFAULT_PORT);
    assert_eq!(config.public_base_url, format!("http://localhost:{}", DEFAULT_PORT));
    assert_eq!(config.logging, LoggingConfig::default());
}

#[test]
fn test_initializer_paths() {
    let root = PathBuf::from("/tmp/caliquest-test-root");
    let initializer = RootFolderInitializer::new(root.clone());

    assert_eq!(initializer.database_path(), root.join("caliquest.db"));
    assert_eq!(initializer.media_path(), root.join("media"));
}

#[test]
fn test_initializer_database_exists() {
    let initializer = RootFolderInitializer::new(PathBuf::from("/tmp/caliquest-test-nonexistent"));
    assert!(!initializer.database_exists());
}

#[test]
fn test_initializer_creates_nested_directories_idempotently() {
    let base = PathBuf::from(format!("/tmp/caliquest-test-nested-{}", std::process::id()));
    let root = base.join("level1").join("level2");
    let _ = std::fs::remove_dir_all(&base);

    let initializer = RootFolderInitializer::new(root.clone());
    assert!(initializer.ensure_directory_exists().is_ok());
    assert!(initializer.ensure_directory_exists().is_ok());

    assert!(root.is_dir());
    assert!(initializer.media_path().is_dir());

    let _ = std::fs::remove_dir_all(&base);
}

#[test]
fn test_toml_missing_fields_default() {
    let config: TomlConfig = toml::from_str("port = 5900").unwrap();
    assert_eq!(config.port, Some(5900));
    assert_eq!(config.root_folder, None);
    assert_eq!(config.public_base_url, None);
    assert_eq!(config.logging.level, "info");
}
