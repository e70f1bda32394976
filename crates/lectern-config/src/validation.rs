// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Semantic checks that serde attributes cannot express.

use crate::diagnostic::ConfigError;
use crate::model::{LecternConfig, StorageBackend};

/// Validates a deserialized configuration, collecting every problem.
pub fn validate_config(config: &LecternConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    let host = config.gateway.host.trim();
    if host.is_empty() {
        errors.push(ConfigError::validation("gateway.host must not be empty"));
    } else if host.parse::<std::net::IpAddr>().is_err()
        && !host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
    {
        errors.push(ConfigError::validation(format!(
            "gateway.host `{host}` is not a valid IP address or hostname"
        )));
    }

    match config.storage.backend {
        StorageBackend::Sqlite if config.storage.database_path.trim().is_empty() => {
            errors.push(ConfigError::validation(
                "storage.database_path must not be empty for the sqlite backend",
            ));
        }
        StorageBackend::File if config.storage.json_path.trim().is_empty() => {
            errors.push(ConfigError::validation(
                "storage.json_path must not be empty for the file backend",
            ));
        }
        _ => {}
    }

    if config.quota.reset_hour > 23 {
        errors.push(ConfigError::validation(format!(
            "quota.reset_hour must be between 0 and 23, got {}",
            config.quota.reset_hour
        )));
    }
    if config.quota.daily_message_limit <= 0 {
        errors.push(ConfigError::validation(format!(
            "quota.daily_message_limit must be positive, got {}",
            config.quota.daily_message_limit
        )));
    }
    if config.quota.daily_token_limit <= 0 {
        errors.push(ConfigError::validation(format!(
            "quota.daily_token_limit must be positive, got {}",
            config.quota.daily_token_limit
        )));
    }
    if config.quota.sweep_interval_secs == 0 {
        errors.push(ConfigError::validation(
            "quota.sweep_interval_secs must be at least 1",
        ));
    }

    for (key, url) in [
        ("provider.base_url", &config.provider.base_url),
        ("catalog.base_url", &config.catalog.base_url),
    ] {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            errors.push(ConfigError::validation(format!(
                "{key} must be an http(s) URL, got `{url}`"
            )));
        }
    }

    if config.catalog.timeout_secs == 0 {
        errors.push(ConfigError::validation("catalog.timeout_secs must be at least 1"));
    }

    if let Some(token) = &config.gateway.admin_token
        && token.trim().is_empty()
    {
        errors.push(ConfigError::validation(
            "gateway.admin_token must not be blank; omit it to disable admin routes",
        ));
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}
