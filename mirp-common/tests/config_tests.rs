//! Unit tests for configuration loading and graceful degradation
//!
//! Note: Uses serial_test crate to prevent ENV variable race conditions.
//! Tests that manipulate MIRP_MUSIC_ROOT are marked with #[serial]
//! to ensure they run sequentially, not in parallel.

use mirp_common::config::{
    resolve_music_root, StationConfig, TomlConfig, MAX_VOLUME, MUSIC_ROOT_ENV,
};
use serial_test::serial;
use std::env;
use std::io::Write;
use std::path::{Path, PathBuf};

#[test]
fn test_defaults_match_device_firmware() {
    let config = TomlConfig::default();

    assert_eq!(config.playback.volume, 10);
    assert_eq!(config.playback.decode_period_ms, 10);
    assert_eq!(config.playback.settle_ms, 300);
    assert_eq!(config.playback.remote_settle_ms, 500);
    assert_eq!(config.catalog.max_items, 50);
    assert_eq!(config.catalog.extensions, vec!["mp3".to_string()]);
    assert_eq!(config.network.probe_interval_secs, 60);
    assert_eq!(config.logging.level, "info");
    assert_eq!(config.stations.0.len(), 9);
    assert_eq!(config.stations.0[0].name, "BBC World Service");
    assert!(config.validate().is_ok());
}

#[test]
fn test_partial_toml_keeps_remaining_defaults() {
    let config = TomlConfig::from_toml_str(
        r#"
        music_root = "/media/sd"

        [playback]
        volume = 15

        [catalog]
        extensions = ["mp3", "flac"]
        "#,
    )
    .unwrap();

    assert_eq!(config.music_root, Some(PathBuf::from("/media/sd")));
    assert_eq!(config.playback.volume, 15);
    assert_eq!(config.playback.settle_ms, 300);
    assert_eq!(config.catalog.extensions.len(), 2);
    assert_eq!(config.catalog.max_items, 50);
    assert_eq!(config.stations.0.len(), 9);
}

#[test]
fn test_station_list_replaces_built_in_list() {
    let config = TomlConfig::from_toml_str(
        r#"
        [[stations]]
        name = "Local Test"
        url = "http://127.0.0.1:8000/stream"
        "#,
    )
    .unwrap();

    assert_eq!(
        config.stations.0,
        vec![StationConfig {
            name: "Local Test".to_string(),
            url: "http://127.0.0.1:8000/stream".to_string(),
        }]
    );
}

#[test]
fn test_volume_above_maximum_rejected() {
    let text = format!("[playback]\nvolume = {}\n", MAX_VOLUME + 1);
    assert!(TomlConfig::from_toml_str(&text).is_err());
}

#[test]
fn test_non_http_station_rejected() {
    let result = TomlConfig::from_toml_str(
        r#"
        [[stations]]
        name = "Bad"
        url = "ftp://example.com/stream"
        "#,
    );
    assert!(result.is_err());
}

#[test]
fn test_empty_extension_list_rejected() {
    let result = TomlConfig::from_toml_str("[catalog]\nextensions = []\n");
    assert!(result.is_err());
}

#[test]
fn test_malformed_toml_is_an_error() {
    assert!(TomlConfig::from_toml_str("[playback\nvolume = 3").is_err());
}

#[test]
fn test_load_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[logging]\nlevel = \"debug\"").unwrap();

    let (config, path) = TomlConfig::load_or_default(Some(file.path())).unwrap();
    assert_eq!(config.logging.level, "debug");
    assert_eq!(path.as_deref(), Some(file.path()));
}

#[test]
fn test_explicit_missing_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("absent.toml");
    assert!(TomlConfig::load_or_default(Some(&missing)).is_err());
}

#[test]
#[serial]
fn test_cli_argument_has_highest_priority() {
    env::set_var(MUSIC_ROOT_ENV, "/from/env");
    let config = TomlConfig {
        music_root: Some(PathBuf::from("/from/toml")),
        ..Default::default()
    };

    let root = resolve_music_root(Some(Path::new("/from/cli")), MUSIC_ROOT_ENV, &config);
    assert_eq!(root, PathBuf::from("/from/cli"));

    env::remove_var(MUSIC_ROOT_ENV);
}

#[test]
#[serial]
fn test_env_overrides_toml() {
    env::set_var(MUSIC_ROOT_ENV, "/from/env");
    let config = TomlConfig {
        music_root: Some(PathBuf::from("/from/toml")),
        ..Default::default()
    };

    let root = resolve_music_root(None, MUSIC_ROOT_ENV, &config);
    assert_eq!(root, PathBuf::from("/from/env"));

    env::remove_var(MUSIC_ROOT_ENV);
}

#[test]
#[serial]
fn test_toml_used_when_env_unset() {
    env::remove_var(MUSIC_ROOT_ENV);
    let config = TomlConfig {
        music_root: Some(PathBuf::from("/from/toml")),
        ..Default::default()
    };

    let root = resolve_music_root(None, MUSIC_ROOT_ENV, &config);
    assert_eq!(root, PathBuf::from("/from/toml"));
}

#[test]
#[serial]
fn test_fallback_is_never_empty() {
    env::remove_var(MUSIC_ROOT_ENV);
    let root = resolve_music_root(None, MUSIC_ROOT_ENV, &TomlConfig::default());
    assert!(!root.as_os_str().is_empty());
}
