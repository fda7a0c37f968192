//! Configuration Tests
//!
//! `dal.toml` parsing, validation and file handling. Tests never install a
//! non-default config because the active config is process-wide.

use crate::test_utils::*;
use dal::core::config::CONFIG_FILE_NAME;
use dal::core::DalConfig;
use std::time::Duration;

#[test]
fn test_default_toml_matches_defaults() {
    let parsed = DalConfig::from_toml_str(DalConfig::default_toml()).unwrap();
    assert_eq!(parsed, DalConfig::DEFAULT);
}

#[test]
fn test_partial_file_keeps_other_defaults() {
    let config = DalConfig::from_toml_str("transaction_attempts = 5\n").unwrap();
    assert_eq!(config.transaction_attempts, 5);
    assert_eq!(config.insert_max_attempts, DalConfig::DEFAULT.insert_max_attempts);
}

#[test]
fn test_invalid_values_are_rejected() {
    let err = DalConfig::from_toml_str("random_string_id_length = 0\n").unwrap_err();
    assert!(matches!(err, DalError::Config(_)));
    assert!(DalConfig::from_toml_str("transaction_attempts = \"many\"\n").is_err());
}

#[test]
fn test_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(CONFIG_FILE_NAME);

    DalConfig::write_default_if_missing(&path).unwrap();
    assert_eq!(DalConfig::from_file(&path).unwrap(), DalConfig::DEFAULT);

    let custom = DalConfig {
        insert_max_attempts: 3,
        retry_base_delay_ms: 2,
        ..DalConfig::DEFAULT
    };
    custom.write_to_file(&path).unwrap();
    // An existing file is left alone
    DalConfig::write_default_if_missing(&path).unwrap();
    assert_eq!(DalConfig::from_file(&path).unwrap(), custom);
}

#[test]
fn test_missing_file_is_a_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = DalConfig::from_file(&dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, DalError::Config(_)));
}

#[test]
fn test_retry_backoff_is_capped() {
    let config = DalConfig {
        retry_base_delay_ms: 10,
        retry_max_delay_ms: 50,
        ..DalConfig::DEFAULT
    };
    assert_eq!(config.retry_delay(0), Duration::from_millis(10));
    assert_eq!(config.retry_delay(2), Duration::from_millis(40));
    assert_eq!(config.retry_delay(3), Duration::from_millis(50));
}

#[test]
fn test_defaults_drive_operations() {
    DalConfig::DEFAULT.apply().unwrap();
    assert_eq!(InsertOptions::new().max_attempts(), DalConfig::DEFAULT.insert_max_attempts);
    assert_eq!(DalConfig::current(), DalConfig::DEFAULT);
}
