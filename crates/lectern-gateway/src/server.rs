// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for the gateway.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    Router, middleware as axum_middleware,
    routing::{delete, get, post},
};
use dashmap::DashSet;
use lectern_agent::SessionRegistry;
use lectern_core::{CatalogAdapter, LecternError, StorageAdapter};
use lectern_quota::QuotaGovernor;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::admin;
use crate::auth::{AdminAuth, admin_middleware};
use crate::handlers;
use crate::sse;

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub registry: Arc<SessionRegistry>,
    pub storage: Arc<dyn StorageAdapter + Send + Sync>,
    pub catalog: Arc<dyn CatalogAdapter + Send + Sync>,
    pub quota: Arc<QuotaGovernor>,
    /// Chats with a turn in flight; one request per chat at a time.
    pub busy: Arc<DashSet<String>>,
    /// Upper bound for one long-poll wait.
    pub poll_timeout: Duration,
    pub start_time: Instant,
}

impl GatewayState {
    pub fn new(
        registry: Arc<SessionRegistry>,
        storage: Arc<dyn StorageAdapter + Send + Sync>,
        catalog: Arc<dyn CatalogAdapter + Send + Sync>,
        quota: Arc<QuotaGovernor>,
    ) -> Self {
        Self {
            registry,
            storage,
            catalog,
            quota,
            busy: Arc::new(DashSet::new()),
            poll_timeout: Duration::from_secs(25),
            start_time: Instant::now(),
        }
    }

    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }
}

/// Gateway listener configuration (mirrors `GatewayConfig`).
#[derive(Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Bearer token for `/admin`. Admin routes reject everything when unset.
    pub admin_token: Option<String>,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("admin_token", &self.admin_token.as_ref().map(|_| "[redacted]"))
            .finish()
    }
}

/// Builds the full route table.
///
/// - `POST /api/startchat`, `/api/resumechat`, `/api/sendchat` (SSE)
/// - `GET /api/events/{chat_id}` long-poll
/// - `GET /user/chats`, `GET /user/chats/{chat_id}`,
///   `DELETE /user/chats/{chat_id}/messages`
/// - `/admin/users...` behind the admin bearer token
/// - `GET /health`
pub fn router(state: GatewayState, admin_token: Option<String>) -> Router {
    let api_routes = Router::new()
        .route("/api/startchat", post(handlers::start_chat))
        .route("/api/resumechat", post(handlers::resume_chat))
        .route("/api/sendchat", post(sse::send_chat))
        .route("/api/events/{chat_id}", get(handlers::poll_events))
        .route("/user/chats", get(handlers::list_chats))
        .route("/user/chats/{chat_id}", get(handlers::chat_history))
        .route(
            "/user/chats/{chat_id}/messages",
            delete(handlers::clear_history),
        )
        .route("/health", get(handlers::health))
        .with_state(state.clone());

    let admin_routes = Router::new()
        .route("/admin/users", get(admin::list_users))
        .route("/admin/users/{user_id}/block", post(admin::block_user))
        .route("/admin/users/{user_id}/unblock", post(admin::unblock_user))
        .route_layer(axum_middleware::from_fn_with_state(
            AdminAuth { token: admin_token },
            admin_middleware,
        ))
        .with_state(state);

    Router::new()
        .merge(api_routes)
        .merge(admin_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Binds and serves until `cancel` fires, then drains in-flight requests.
pub async fn start_server(
    config: &ServerConfig,
    state: GatewayState,
    cancel: CancellationToken,
) -> Result<(), LecternError> {
    let app = router(state, config.admin_token.clone());

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| LecternError::Internal(format!("failed to bind gateway to {addr}: {e}")))?;

    tracing::info!(addr = %addr, "gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
        .map_err(|e| LecternError::Internal(format!("gateway server error: {e}")))?;

    tracing::info!("gateway stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_config_debug_redacts_token() {
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 3000,
            admin_token: Some("s3cret".into()),
        };
        let debug = format!("{config:?}");
        assert!(debug.contains("127.0.0.1"));
        assert!(!debug.contains("s3cret"));
    }
}
