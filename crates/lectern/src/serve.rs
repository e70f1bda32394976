// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `lectern serve`: wires storage, catalog, provider, tools, the session
//! registry and the quota governor behind the HTTP gateway, and tears them
//! down in order on shutdown.

use std::sync::Arc;
use std::time::Duration;

use lectern_agent::{Capabilities, OrchestratorConfig, SessionRegistry};
use lectern_catalog::RestCatalog;
use lectern_config::LecternConfig;
use lectern_core::{CatalogAdapter, LecternError, PluginAdapter, ProviderAdapter};
use lectern_gateway::{GatewayState, ServerConfig, start_server};
use lectern_openai::OpenAiProvider;
use lectern_quota::QuotaGovernor;
use lectern_tools::{ToolRegistry, register_builtins};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::shutdown;

/// Runs the gateway until a shutdown signal arrives.
pub async fn run_serve(config: LecternConfig) -> Result<(), LecternError> {
    init_tracing(&config.agent.log_level);
    info!(
        version = env!("CARGO_PKG_VERSION"),
        name = %config.agent.name,
        "starting lectern"
    );

    let storage = lectern_storage::from_config(&config.storage);
    storage.initialize().await?;
    info!(backend = ?config.storage.backend, "storage initialized");

    let catalog: Arc<dyn CatalogAdapter + Send + Sync> = Arc::new(RestCatalog::new(&config.catalog)?);
    let provider: Arc<dyn ProviderAdapter + Send + Sync> =
        Arc::new(OpenAiProvider::new(&config.provider)?);

    let mut tools = ToolRegistry::new();
    register_builtins(&mut tools);
    let caps = Capabilities {
        provider: provider.clone(),
        catalog: catalog.clone(),
        tools: Arc::new(tools),
    };
    let registry = Arc::new(SessionRegistry::new(
        storage.clone(),
        caps,
        OrchestratorConfig::from_config(&config),
    ));
    let quota = Arc::new(QuotaGovernor::new(storage.clone(), config.quota.clone()));

    let cancel = shutdown::install_signal_handler();
    let sweep = spawn_quota_sweep(
        quota.clone(),
        Duration::from_secs(config.quota.sweep_interval_secs),
        cancel.clone(),
    );

    let server_config = ServerConfig {
        host: config.gateway.host.clone(),
        port: config.gateway.port,
        admin_token: config.gateway.admin_token.clone(),
    };
    if server_config.admin_token.is_none() {
        warn!("gateway.admin_token is not set, admin routes will reject every request");
    }

    let state = GatewayState::new(registry.clone(), storage.clone(), catalog.clone(), quota);
    let served = start_server(&server_config, state, cancel.clone()).await;

    // A bind failure returns before any signal; stop the sweep either way.
    cancel.cancel();
    if let Err(e) = sweep.await {
        warn!(error = %e, "quota sweep task ended abnormally");
    }

    registry.shutdown().await;
    if let Err(e) = provider.shutdown().await {
        warn!(error = %e, "provider shutdown failed");
    }
    storage.close().await?;
    info!("lectern stopped");

    served
}

/// Periodically clears counter rows from quota days that have ended.
pub fn spawn_quota_sweep(
    quota: Arc<QuotaGovernor>,
    every: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every.max(Duration::from_secs(1)));
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("quota sweep stopping");
                    return;
                }
                _ = ticker.tick() => {
                    if let Err(e) = quota.reset_expired_daily_limits().await {
                        warn!(error = %e, "quota sweep failed");
                    }
                }
            }
        }
    })
}

fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("lectern={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
