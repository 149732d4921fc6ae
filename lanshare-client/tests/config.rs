use std::io::Write;

use lanshare_client::config::{
    ConfigError, ConfigOverrides, MAX_CONFIG_BYTES, load_config_from_path, resolve_config,
};

#[test]
fn oversized_config_file_is_refused() {
    let mut file = tempfile::NamedTempFile::new().expect("create temp config");
    let padding = " ".repeat(MAX_CONFIG_BYTES as usize + 1);
    write!(file, "{{\"server_url\":\"http://peer:8080\"{padding}}}").expect("write config");

    let err = load_config_from_path(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::TooLarge { .. }), "{err}");
}

#[test]
fn file_values_are_overridden_by_flags() {
    let mut file = tempfile::NamedTempFile::new().expect("create temp config");
    write!(
        file,
        r#"{{"server_url":"http://192.168.1.20:8080","messages_ms":1500,"liveness_ms":9000}}"#
    )
    .expect("write config");

    let overrides = ConfigOverrides {
        liveness_ms: Some(2500),
        ..ConfigOverrides::default()
    };
    let config = resolve_config(Some(file.path()), &overrides).expect("valid config");
    assert_eq!(config.server_url, "http://192.168.1.20:8080");
    assert_eq!(config.messages_ms, 1500);
    assert_eq!(config.liveness_ms, 2500);
    assert_eq!(config.roster_ms, 3000);
}

#[test]
fn malformed_config_names_the_file() {
    let mut file = tempfile::NamedTempFile::new().expect("create temp config");
    write!(file, "{{ not json").expect("write config");

    let err = resolve_config(Some(file.path()), &ConfigOverrides::default()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }), "{err}");
    let text = err.to_string();
    assert!(text.contains("parse failed"), "{text}");
    assert!(text.contains(&file.path().display().to_string()), "{text}");
}

#[test]
fn zero_period_override_is_rejected() {
    let overrides = ConfigOverrides {
        messages_ms: Some(0),
        ..ConfigOverrides::default()
    };
    let err = resolve_config(None, &overrides).unwrap_err();
    assert!(matches!(err, ConfigError::ZeroPeriod("messages")), "{err}");
}

#[test]
fn missing_config_file_is_a_read_error() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let path = dir.path().join("absent.json");

    let err = resolve_config(Some(&path), &ConfigOverrides::default()).unwrap_err();
    assert!(matches!(err, ConfigError::Read { .. }), "{err}");
    assert!(std::error::Error::source(&err).is_some());
}
