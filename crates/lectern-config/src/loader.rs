// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Layered configuration loading with Figment.
//!
//! Later layers win: compiled defaults, `/etc/lectern/lectern.toml`,
//! `~/.config/lectern/lectern.toml`, `./lectern.toml`, then `LECTERN_*`
//! environment variables.

#![allow(clippy::result_large_err)] // figment::Error is external

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::LecternConfig;

/// Config file locations in merge order.
pub fn config_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("/etc/lectern/lectern.toml")];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("lectern/lectern.toml"));
    }
    paths.push(PathBuf::from("lectern.toml"));
    paths
}

/// Builds the full layered Figment without extracting it.
pub fn build_figment() -> Figment {
    let mut figment = Figment::new().merge(Serialized::defaults(LecternConfig::default()));
    for path in config_paths() {
        figment = figment.merge(Toml::file(path));
    }
    figment.merge(env_provider())
}

/// Loads configuration from the standard file hierarchy and environment.
pub fn load_config() -> Result<LecternConfig, figment::Error> {
    build_figment().extract()
}

/// Loads configuration from one explicit file plus environment overrides.
pub fn load_config_from_path(path: &Path) -> Result<LecternConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(LecternConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Loads configuration from an inline TOML string. No environment layer.
pub fn load_config_from_str(toml_content: &str) -> Result<LecternConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(LecternConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Sections that may be targeted from the environment.
const SECTIONS: &[&str] = &["agent", "provider", "catalog", "storage", "quota", "gateway"];

/// Maps `LECTERN_QUOTA_RESET_HOUR` to `quota.reset_hour`.
///
/// Only the first underscore after a known section name becomes a dot;
/// splitting on every underscore would break keys like `reset_hour`.
fn env_provider() -> Env {
    Env::prefixed("LECTERN_").map(|key| {
        let key = key.as_str();
        for section in SECTIONS {
            if let Some(rest) = key.strip_prefix(section).and_then(|r| r.strip_prefix('_')) {
                return format!("{section}.{rest}").into();
            }
        }
        key.to_string().into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_overrides_nested_keys() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("LECTERN_QUOTA_RESET_HOUR", "4");
            jail.set_env("LECTERN_PROVIDER_MAX_OUTPUT_TOKENS", "512");
            jail.set_env("LECTERN_GATEWAY_ADMIN_TOKEN", "s3cret");
            let config: LecternConfig = Figment::new()
                .merge(Serialized::defaults(LecternConfig::default()))
                .merge(env_provider())
                .extract()?;
            assert_eq!(config.quota.reset_hour, 4);
            assert_eq!(config.provider.max_output_tokens, 512);
            assert_eq!(config.gateway.admin_token.as_deref(), Some("s3cret"));
            Ok(())
        });
    }

    #[test]
    fn local_file_overrides_defaults() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("lectern.toml", "[agent]\nname = \"jailed\"\n")?;
            let config = load_config_from_path(Path::new("lectern.toml"))?;
            assert_eq!(config.agent.name, "jailed");
            assert_eq!(config.agent.max_tool_rounds, 10);
            Ok(())
        });
    }
}
