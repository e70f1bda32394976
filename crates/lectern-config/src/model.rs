// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs.
//!
//! Every section rejects unrecognized keys so typos surface at startup
//! instead of silently falling back to defaults.

use serde::{Deserialize, Serialize};

/// Top-level Lectern configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LecternConfig {
    /// Assistant identity and conversation behavior.
    #[serde(default)]
    pub agent: AgentConfig,

    /// LLM completion service.
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Remote catalog service.
    #[serde(default)]
    pub catalog: CatalogConfig,

    /// Persistence backend.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Daily per-user budgets.
    #[serde(default)]
    pub quota: QuotaConfig,

    /// HTTP listener.
    #[serde(default)]
    pub gateway: GatewayConfig,
}

/// Assistant identity and conversation behavior.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    #[serde(default = "default_agent_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Replaces the built-in instruction preamble when set.
    #[serde(default)]
    pub system_prompt: Option<String>,

    /// Completion rounds allowed per user turn. `0` removes the cap.
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: u32,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: default_agent_name(),
            log_level: default_log_level(),
            system_prompt: None,
            max_tool_rounds: default_max_tool_rounds(),
        }
    }
}

fn default_agent_name() -> String {
    "lectern".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_tool_rounds() -> u32 {
    10
}

/// LLM completion service settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    /// API key. Falls back to `OPENAI_API_KEY` when unset.
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_provider_base_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_provider_base_url(),
            model: default_model(),
            max_output_tokens: default_max_output_tokens(),
        }
    }
}

fn default_provider_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4.1-mini".to_string()
}

fn default_max_output_tokens() -> u32 {
    2048
}

/// Remote catalog service settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CatalogConfig {
    #[serde(default = "default_catalog_base_url")]
    pub base_url: String,

    /// Per-request timeout for catalog calls.
    #[serde(default = "default_catalog_timeout")]
    pub timeout_secs: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: default_catalog_base_url(),
            timeout_secs: default_catalog_timeout(),
        }
    }
}

fn default_catalog_base_url() -> String {
    "http://127.0.0.1:8000".to_string()
}

fn default_catalog_timeout() -> u64 {
    15
}

/// Which storage implementation to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Sqlite,
    File,
}

/// Storage backend settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    /// SQLite database file, used by the `sqlite` backend.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// JSON document, used by the `file` backend.
    #[serde(default = "default_json_path")]
    pub json_path: String,

    /// Enable WAL journaling for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            database_path: default_database_path(),
            json_path: default_json_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn data_file(name: &str) -> String {
    dirs::data_dir()
        .map(|p| p.join("lectern").join(name))
        .unwrap_or_else(|| std::path::PathBuf::from(name))
        .to_string_lossy()
        .into_owned()
}

fn default_database_path() -> String {
    data_file("lectern.db")
}

fn default_json_path() -> String {
    data_file("lectern.json")
}

fn default_wal_mode() -> bool {
    true
}

/// Daily per-user budget settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct QuotaConfig {
    /// Weighted messages allowed per quota day.
    #[serde(default = "default_daily_message_limit")]
    pub daily_message_limit: i64,

    /// Provider tokens allowed per quota day.
    #[serde(default = "default_daily_token_limit")]
    pub daily_token_limit: i64,

    /// Local hour (0-23) at which a new quota day starts.
    #[serde(default)]
    pub reset_hour: u32,

    /// How often the expired-row sweep runs.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            daily_message_limit: default_daily_message_limit(),
            daily_token_limit: default_daily_token_limit(),
            reset_hour: 0,
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

fn default_daily_message_limit() -> i64 {
    50
}

fn default_daily_token_limit() -> i64 {
    200_000
}

fn default_sweep_interval() -> u64 {
    3600
}

/// HTTP listener settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Bearer token for the `/admin` routes. Admin routes are disabled when unset.
    #[serde(default)]
    pub admin_token: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            admin_token: None,
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}
