// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `lectern doctor`: reachability checks for the storage backend, the
//! catalog and the completion provider.

use std::io::IsTerminal;
use std::time::{Duration, Instant};

use colored::Colorize;
use lectern_catalog::RestCatalog;
use lectern_config::LecternConfig;
use lectern_core::{HealthStatus, LecternError, PluginAdapter};
use lectern_openai::OpenAiProvider;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

#[derive(Debug, Clone)]
pub struct CheckResult {
    pub name: &'static str,
    pub status: CheckStatus,
    pub message: String,
    pub duration: Duration,
}

impl CheckResult {
    fn from_health(name: &'static str, start: Instant, health: Result<HealthStatus, LecternError>) -> Self {
        let (status, message) = match health {
            Ok(HealthStatus::Healthy) => (CheckStatus::Pass, "reachable".to_string()),
            Ok(HealthStatus::Degraded(reason)) => (CheckStatus::Warn, reason),
            Ok(HealthStatus::Unhealthy(reason)) => (CheckStatus::Fail, reason),
            Err(e) => (CheckStatus::Fail, e.to_string()),
        };
        Self {
            name,
            status,
            message,
            duration: start.elapsed(),
        }
    }
}

/// Runs every check and prints a summary. Fails when any check failed.
pub async fn run_doctor(config: &LecternConfig, plain: bool) -> Result<(), LecternError> {
    let use_color = !plain && std::io::stdout().is_terminal();

    let results = vec![
        check_storage(config).await,
        check_catalog(config).await,
        check_provider(config).await,
    ];

    println!();
    println!("  lectern doctor");
    println!("  {}", "-".repeat(50));
    for result in &results {
        println!("{}", render(result, use_color));
    }
    println!();

    let failures = results.iter().filter(|r| r.status == CheckStatus::Fail).count();
    let warnings = results.iter().filter(|r| r.status == CheckStatus::Warn).count();
    match (failures, warnings) {
        (0, 0) => println!("  All checks passed."),
        (f, w) => println!("  {f} failed, {w} warning(s)."),
    }
    println!();

    if failures > 0 {
        return Err(LecternError::Internal(format!("{failures} check(s) failed")));
    }
    Ok(())
}

fn render(result: &CheckResult, use_color: bool) -> String {
    let ms = result.duration.as_millis();
    if use_color {
        let (symbol, message) = match result.status {
            CheckStatus::Pass => ("✓".green(), result.message.normal()),
            CheckStatus::Warn => ("!".yellow(), result.message.yellow()),
            CheckStatus::Fail => ("✗".red(), result.message.red()),
        };
        format!("    {symbol} {:<12} {message} ({ms}ms)", result.name)
    } else {
        let tag = match result.status {
            CheckStatus::Pass => "[OK]  ",
            CheckStatus::Warn => "[WARN]",
            CheckStatus::Fail => "[FAIL]",
        };
        format!("    {tag} {:<12} {} ({ms}ms)", result.name, result.message)
    }
}

async fn check_storage(config: &LecternConfig) -> CheckResult {
    let start = Instant::now();
    let storage = lectern_storage::from_config(&config.storage);
    let health = match storage.initialize().await {
        Ok(()) => {
            let health = storage.health_check().await;
            let _ = storage.close().await;
            health
        }
        Err(e) => Err(e),
    };
    CheckResult::from_health("Storage", start, health)
}

async fn check_catalog(config: &LecternConfig) -> CheckResult {
    let start = Instant::now();
    let health = match RestCatalog::new(&config.catalog) {
        Ok(catalog) => catalog.health_check().await,
        Err(e) => Err(e),
    };
    CheckResult::from_health("Catalog", start, health)
}

async fn check_provider(config: &LecternConfig) -> CheckResult {
    let start = Instant::now();
    let health = match OpenAiProvider::new(&config.provider) {
        Ok(provider) => provider.health_check().await,
        Err(e) => Err(e),
    };
    CheckResult::from_health("Provider", start, health)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(status: CheckStatus) -> CheckResult {
        CheckResult {
            name: "Catalog",
            status,
            message: "timed out".to_string(),
            duration: Duration::from_millis(12),
        }
    }

    #[test]
    fn plain_rendering_tags_status() {
        assert!(render(&result(CheckStatus::Pass), false).contains("[OK]"));
        assert!(render(&result(CheckStatus::Warn), false).contains("[WARN]"));
        let line = render(&result(CheckStatus::Fail), false);
        assert!(line.contains("[FAIL] Catalog"));
        assert!(line.contains("timed out (12ms)"));
    }

    #[test]
    fn health_maps_to_status() {
        let start = Instant::now();
        let degraded = CheckResult::from_health(
            "Catalog",
            start,
            Ok(HealthStatus::Degraded("slow".into())),
        );
        assert_eq!(degraded.status, CheckStatus::Warn);
        assert_eq!(degraded.message, "slow");

        let failed = CheckResult::from_health("Catalog", start, Err(LecternError::catalog("down")));
        assert_eq!(failed.status, CheckStatus::Fail);
    }

    #[tokio::test]
    async fn fresh_file_storage_is_a_warning() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = LecternConfig::default();
        config.storage.backend = lectern_config::StorageBackend::File;
        config.storage.json_path = dir.path().join("lectern.json").to_string_lossy().into_owned();

        let result = check_storage(&config).await;
        assert_eq!(result.status, CheckStatus::Warn, "{}", result.message);
        assert!(result.message.contains("not been written"));
    }
}
