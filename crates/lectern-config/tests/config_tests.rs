// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for configuration loading.

use lectern_config::diagnostic::ConfigError;
use lectern_config::{StorageBackend, load_and_validate_str, load_config_from_str};

#[test]
fn full_document_deserializes() {
    let toml = r#"
[agent]
name = "front-desk"
log_level = "debug"
max_tool_rounds = 4

[provider]
api_key = "sk-test"
base_url = "http://localhost:9999/v1"
model = "gpt-test"
max_output_tokens = 256

[catalog]
base_url = "https://catalog.example.org"
timeout_secs = 5

[storage]
backend = "file"
json_path = "/tmp/lectern.json"

[quota]
daily_message_limit = 5
daily_token_limit = 1000
reset_hour = 6

[gateway]
host = "0.0.0.0"
port = 8080
admin_token = "admin"
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.agent.name, "front-desk");
    assert_eq!(config.agent.max_tool_rounds, 4);
    assert_eq!(config.provider.api_key.as_deref(), Some("sk-test"));
    assert_eq!(config.catalog.timeout_secs, 5);
    assert_eq!(config.storage.backend, StorageBackend::File);
    assert_eq!(config.quota.reset_hour, 6);
    assert_eq!(config.gateway.port, 8080);
    assert_eq!(config.gateway.admin_token.as_deref(), Some("admin"));
}

#[test]
fn empty_document_uses_defaults() {
    let config = load_and_validate_str("").expect("defaults are valid");
    assert_eq!(config.storage.backend, StorageBackend::Sqlite);
    assert_eq!(config.quota.daily_message_limit, 50);
    assert_eq!(config.quota.reset_hour, 0);
    assert_eq!(config.agent.max_tool_rounds, 10);
    assert!(config.gateway.admin_token.is_none());
}

#[test]
fn typo_produces_suggestion_with_span() {
    let errors = load_and_validate_str("[quota]\nreset_huor = 3\n").unwrap_err();
    assert_eq!(errors.len(), 1);
    match &errors[0] {
        ConfigError::UnknownKey {
            key, suggestion, ..
        } => {
            assert_eq!(key, "reset_huor");
            assert_eq!(suggestion.as_deref(), Some("reset_hour"));
        }
        other => panic!("expected UnknownKey, got {other:?}"),
    }
}

#[test]
fn unknown_backend_is_rejected() {
    let errors = load_and_validate_str("[storage]\nbackend = \"postgres\"\n").unwrap_err();
    assert!(!errors.is_empty());
}

#[test]
fn wrong_type_is_reported() {
    let errors = load_and_validate_str("[gateway]\nport = \"eighty\"\n").unwrap_err();
    assert!(
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::InvalidType { key, .. } if key.contains("port"))),
        "{errors:?}"
    );
}

#[test]
fn semantic_errors_surface_after_parse() {
    let errors = load_and_validate_str("[quota]\nreset_hour = 30\n").unwrap_err();
    assert!(matches!(&errors[0], ConfigError::Validation { message } if message.contains("reset_hour")));
}
