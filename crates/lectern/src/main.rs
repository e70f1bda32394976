// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lectern - a conversational assistant over a cataloguing service.
//!
//! Binary entry point: loads configuration, then serves the HTTP gateway
//! or runs one of the diagnostic subcommands.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod doctor;
mod serve;
mod shutdown;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use lectern_config::LecternConfig;

#[derive(Parser, Debug)]
#[command(name = "lectern", version, about, long_about = None)]
struct Cli {
    /// Configuration file to load instead of the default search path.
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the HTTP gateway (the default).
    Serve,
    /// Validate the configuration and exit.
    CheckConfig,
    /// Check storage, catalog and provider reachability.
    Doctor {
        /// Disable colored output.
        #[arg(long)]
        plain: bool,
    },
}

fn load_config(path: Option<&PathBuf>) -> LecternConfig {
    let loaded = match path {
        Some(path) => lectern_config::load_and_validate_path(path),
        None => lectern_config::load_and_validate(),
    };
    match loaded {
        Ok(config) => config,
        Err(errors) => {
            lectern_config::render_errors(&errors);
            std::process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref());

    let result = match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve::run_serve(config).await,
        Commands::CheckConfig => {
            println!(
                "lectern: config ok (gateway={}:{}, storage={:?}, model={})",
                config.gateway.host,
                config.gateway.port,
                config.storage.backend,
                config.provider.model
            );
            Ok(())
        }
        Commands::Doctor { plain } => doctor::run_doctor(&config, plain).await,
    };

    if let Err(e) = result {
        eprintln!("lectern: {e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(not(target_env = "msvc"))]
    fn jemalloc_is_active() {
        use tikv_jemalloc_ctl::{epoch, stats};
        epoch::advance().unwrap();
        let allocated = stats::allocated::read().unwrap();
        assert!(allocated > 0);
    }

    #[test]
    fn serve_is_the_default_command() {
        let cli = Cli::parse_from(["lectern"]);
        assert!(cli.command.is_none());
        assert!(cli.config.is_none());
    }

    #[test]
    fn parses_subcommands_and_global_config() {
        let cli = Cli::parse_from(["lectern", "doctor", "--plain", "--config", "/etc/lectern.toml"]);
        assert!(matches!(cli.command, Some(Commands::Doctor { plain: true })));
        assert_eq!(cli.config, Some(PathBuf::from("/etc/lectern.toml")));

        let cli = Cli::parse_from(["lectern", "check-config"]);
        assert!(matches!(cli.command, Some(Commands::CheckConfig)));
    }
}
