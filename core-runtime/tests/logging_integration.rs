//! Integration tests for logging system

use bridge_traits::logging::LogLevel;
use core_runtime::logging::{init_logging, redact_if_sensitive, LogFormat, LoggingConfig};

#[test]
fn test_logging_config_for_server_process() {
    let config = LoggingConfig::default()
        .with_format(LogFormat::Json)
        .with_level(LogLevel::Debug)
        .with_spans(true);

    assert_eq!(config.format, LogFormat::Json);
    assert_eq!(config.level, LogLevel::Debug);
    assert!(config.enable_spans);
}

#[test]
fn test_bearer_tokens_are_redacted() {
    assert_eq!(redact_if_sensitive("bearer", "eyJhbGciOi"), "[REDACTED]");
    assert_eq!(redact_if_sensitive("api_key", "k-123"), "[REDACTED]");
    assert_eq!(redact_if_sensitive("Authorization", "Bearer x"), "[REDACTED]");
}

#[test]
fn test_spreadsheet_ids_pass_through() {
    let id = "1AbCdEfGhIjKlMnOpQrStUvWxYz";
    assert_eq!(redact_if_sensitive("spreadsheet_id", id), id);
}

#[test]
fn test_operator_emails_are_masked() {
    let redacted = redact_if_sensitive("operator", "guide@tours.example");
    assert!(redacted.starts_with('g'));
    assert!(!redacted.contains("tours.example"));
}

#[test]
fn test_invalid_filter_is_rejected() {
    let config = LoggingConfig::default().with_filter("core_sync=[[[");
    assert!(init_logging(config).is_err());
}
