use std::fs;

use log::LevelFilter;
use tempfile::tempdir;

use replaycast::logging::{LogDestination, LogFormat};
use replaycast::{NotifyConfig, Publisher};

#[test]
fn test_config_file_integration() {
    let temp_dir = tempdir().expect("Failed to create temp directory");
    let config_path = temp_dir.path().join("replaycast.toml");

    let config_content = r#"
[publisher]
publisher_id = "applications"
unsubscribe_on_error = false
replay_on_subscribe = true

[logging]
level = "debug"
format = "json"
file_path = "/tmp/replaycast-test.log"
"#;

    fs::write(&config_path, config_content).expect("Failed to write config file");

    let config = NotifyConfig::load_from_file(&config_path).expect("Failed to load config");
    assert_eq!(config.publisher.publisher_id.as_deref(), Some("applications"));
    assert!(!config.publisher.unsubscribe_on_error);
    assert!(config.publisher.catch_panics);

    let log_config = config.logging.to_log_config().expect("Invalid logging section");
    assert_eq!(log_config.console_level, LevelFilter::Debug);
    assert_eq!(log_config.file_level, Some(LevelFilter::Debug));
    assert_eq!(log_config.format, LogFormat::Json);
    assert!(matches!(log_config.destination, LogDestination::Both(_)));

    let publisher = Publisher::<String>::with_config(config.publisher);
    assert_eq!(publisher.publisher_id(), "applications");
}

#[test]
fn test_missing_config_file_reports_path() {
    let temp_dir = tempdir().expect("Failed to create temp directory");
    let missing = temp_dir.path().join("absent.toml");

    let error = NotifyConfig::load_from_file(&missing).unwrap_err();
    assert!(format!("{:#}", error).contains("absent.toml"));
}

#[test]
fn test_malformed_config_file_rejected() {
    let temp_dir = tempdir().expect("Failed to create temp directory");
    let config_path = temp_dir.path().join("broken.toml");
    fs::write(&config_path, "[publisher]\ncatch_panics = 3\n")
        .expect("Failed to write config file");

    let error = NotifyConfig::load_from_file(&config_path).unwrap_err();
    assert!(format!("{:#}", error).contains("Failed to parse config file"));
}
