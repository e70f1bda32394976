// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration for the Lectern catalog assistant.
//!
//! TOML files and `LECTERN_*` environment variables are merged with Figment,
//! unknown keys are rejected, and every failure is reported as a miette
//! diagnostic.
//!
//! ```no_run
//! let config = lectern_config::load_and_validate().expect("config errors");
//! println!("listening on {}:{}", config.gateway.host, config.gateway.port);
//! ```

pub mod diagnostic;
pub mod loader;
pub mod model;
pub mod validation;

pub use diagnostic::{ConfigError, render_errors};
pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::{LecternConfig, StorageBackend};

/// Loads the layered configuration and validates it.
pub fn load_and_validate() -> Result<LecternConfig, Vec<ConfigError>> {
    finish(loader::load_config(), read_sources)
}

/// Loads one explicit file (plus environment) and validates it.
pub fn load_and_validate_path(path: &std::path::Path) -> Result<LecternConfig, Vec<ConfigError>> {
    finish(loader::load_config_from_path(path), || {
        std::fs::read_to_string(path)
            .map(|content| vec![(path.display().to_string(), content)])
            .unwrap_or_default()
    })
}

/// Loads an inline TOML document and validates it.
pub fn load_and_validate_str(toml_content: &str) -> Result<LecternConfig, Vec<ConfigError>> {
    finish(loader::load_config_from_str(toml_content), || {
        vec![("<inline>".to_string(), toml_content.to_string())]
    })
}

fn finish(
    loaded: Result<LecternConfig, figment::Error>,
    sources: impl FnOnce() -> Vec<(String, String)>,
) -> Result<LecternConfig, Vec<ConfigError>> {
    match loaded {
        Ok(config) => {
            validation::validate_config(&config)?;
            Ok(config)
        }
        Err(err) => Err(diagnostic::figment_to_config_errors(err, &sources())),
    }
}

/// Contents of every config file that exists, for span resolution.
fn read_sources() -> Vec<(String, String)> {
    loader::config_paths()
        .into_iter()
        .filter_map(|path| {
            let content = std::fs::read_to_string(&path).ok()?;
            let name = std::fs::canonicalize(&path)
                .unwrap_or(path)
                .display()
                .to_string();
            Some((name, content))
        })
        .collect()
}
