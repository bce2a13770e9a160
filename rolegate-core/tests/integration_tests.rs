//! Integration tests for rolegate-core infrastructure

use rolegate_core::{
    config_error, init_logging, storage_error, validation_error, with_timeout, ErrorContext,
    LoggingConfig, RefreshFailure, RolegateConfig, RolegateError,
};
use std::time::Duration;
use tokio::time::sleep;

#[tokio::test]
async fn test_error_handling() {
    let error = storage_error!("Disk full", "file_storage");

    match &error {
        RolegateError::Storage {
            message, context, ..
        } => {
            assert_eq!(message, "Disk full");
            assert_eq!(context.component, "file_storage");
            assert!(!context.error_id.is_empty());
        }
        _ => panic!("Expected Storage error"),
    }

    // Logging an error should not panic
    error.log();

    let transport = RolegateError::Transport {
        message: "Connection refused".to_string(),
        source: None,
        context: ErrorContext::new("test"),
    };
    assert!(transport.is_recoverable());
    assert!(!transport.requires_login());

    let config_error = config_error!("Invalid config", "test");
    assert!(!config_error.is_recoverable());
}

#[test]
fn test_session_errors_require_login() {
    let refresh = RolegateError::refresh(RefreshFailure::Rejected { status: 401 }, "request");
    assert!(refresh.requires_login());
    assert!(!refresh.is_recoverable());
    assert_eq!(
        refresh.to_string(),
        "Token refresh failed: refresh endpoint answered HTTP 401"
    );

    let exhausted = RolegateError::RetryExhausted {
        status: 401,
        url: "http://localhost/api/me".to_string(),
        context: ErrorContext::new("http_client"),
    };
    assert!(exhausted.requires_login());
}

#[tokio::test]
async fn test_logging_initialization() {
    let config = LoggingConfig {
        level: "debug".to_string(),
        filter_directives: vec!["rolegate_core=debug".to_string()],
        ..Default::default()
    };

    // The global subscriber can only be installed once per process, so only
    // check that the call returns instead of panicking.
    let _ = init_logging(&config);
}

#[tokio::test]
async fn test_logging_to_file_requires_path() {
    let config = LoggingConfig {
        log_to_file: true,
        log_file_path: None,
        ..Default::default()
    };

    assert!(init_logging(&config).is_err());
}

#[tokio::test]
async fn test_timeout_mechanism() {
    let quick_operation = async {
        sleep(Duration::from_millis(10)).await;
        "Success"
    };

    let result = with_timeout(quick_operation, 200, "quick_test").await;
    assert_eq!(result.unwrap(), "Success");

    let slow_operation = async {
        sleep(Duration::from_millis(300)).await;
        "Should not reach here"
    };

    let result = with_timeout(slow_operation, 50, "slow_test").await;
    match result.unwrap_err() {
        RolegateError::Timeout {
            operation,
            duration_ms,
            ..
        } => {
            assert_eq!(operation, "slow_test");
            assert_eq!(duration_ms, 50);
        }
        other => panic!("Expected Timeout error, got {other:?}"),
    }
}

#[test]
fn test_config_validation() {
    let mut config = RolegateConfig::default();
    assert!(config.validate().is_ok());

    config.api.refresh_path = "auth/refresh".to_string();
    match config.validate().unwrap_err() {
        RolegateError::Config { message, .. } => assert!(message.contains("refresh_path")),
        other => panic!("Expected Config error, got {other:?}"),
    }

    let mut config = RolegateConfig::default();
    config.api.base_url = "not a url".to_string();
    assert!(config.validate().is_err());

    let mut config = RolegateConfig::default();
    config.api.refresh_timeout_seconds = 0;
    assert!(config.validate().is_err());

    let mut config = RolegateConfig::default();
    config.storage.profile = "../escape".to_string();
    assert!(config.validate().is_err());
}

#[test]
fn test_config_roundtrip_through_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.toml");

    let mut config = RolegateConfig::default();
    config.api.base_url = "https://app.example.com/api".to_string();
    config.gate.login_path = "/signin".to_string();
    config.save_to_file(&path).unwrap();

    let loaded = RolegateConfig::from_file(&path).unwrap();
    assert_eq!(loaded.api.base_url, "https://app.example.com/api");
    assert_eq!(loaded.gate.login_path, "/signin");
    assert_eq!(loaded.api.refresh_path, "/auth/refresh");
}

#[test]
fn test_partial_config_uses_defaults() {
    let config: RolegateConfig = toml::from_str(
        r#"
        [api]
        base_url = "https://app.example.com"
        "#,
    )
    .unwrap();

    assert_eq!(config.api.refresh_timeout_seconds, 10);
    assert_eq!(config.storage.profile, "default");
    assert_eq!(config.gate.login_path, "/login");
}

#[test]
fn test_endpoint_joining() {
    let config = RolegateConfig::default();
    let api = config.api.with_base_url("https://app.example.com/api/");

    assert_eq!(api.endpoint("/users"), "https://app.example.com/api/users");
    assert_eq!(api.endpoint("users"), "https://app.example.com/api/users");
    assert_eq!(api.refresh_url(), "https://app.example.com/api/auth/refresh");
    assert_eq!(
        api.endpoint("https://other.example.com/x"),
        "https://other.example.com/x"
    );
}

#[test]
fn test_profile_dir_honours_override() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = RolegateConfig::default();
    config.storage.data_dir = Some(dir.path().to_path_buf());
    config.storage.profile = "work".to_string();

    assert_eq!(config.storage.profile_dir().unwrap(), dir.path().join("work"));
}

#[test]
fn test_error_macros() {
    let validation_err = validation_error!("Invalid role list", "exact_roles", "gate");
    match validation_err {
        RolegateError::Validation {
            message,
            field,
            context,
        } => {
            assert_eq!(message, "Invalid role list");
            assert_eq!(field, Some("exact_roles".to_string()));
            assert_eq!(context.component, "gate");
            assert!(!context.recovery_suggestions.is_empty());
        }
        _ => panic!("Expected Validation error"),
    }
}
