// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Admin routes: user listing and block/unblock.
//!
//! Blocking a user immediately terminates every live session they own.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use chrono::{DateTime, Utc};
use lectern_core::types::User;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ApiError;
use crate::server::GatewayState;

const DEFAULT_PAGE_SIZE: u64 = 20;
const MAX_PAGE_SIZE: u64 = 100;

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default)]
    pub page: Option<u64>,
    #[serde(default)]
    pub limit: Option<u64>,
}

/// Request body for POST /admin/users/{user_id}/block.
#[derive(Debug, Default, Deserialize)]
pub struct BlockRequest {
    #[serde(default)]
    pub reason: Option<String>,
    /// RFC 3339 expiry; the block is indefinite when absent.
    #[serde(default)]
    pub until: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminUserView {
    pub id: String,
    pub display_name: String,
    pub is_superuser: bool,
    pub blocked: bool,
    pub blocked_reason: Option<String>,
    pub blocked_until: Option<String>,
    pub created_at: String,
    pub last_seen_at: String,
}

impl From<User> for AdminUserView {
    fn from(user: User) -> Self {
        Self {
            display_name: user.display_name(),
            id: user.id,
            is_superuser: user.is_superuser,
            blocked: user.blocked,
            blocked_reason: user.blocked_reason,
            blocked_until: user.blocked_until,
            created_at: user.created_at,
            last_seen_at: user.last_seen_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserPage {
    pub users: Vec<AdminUserView>,
    pub page: u64,
    pub limit: u64,
    pub total: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockResponse {
    pub user: AdminUserView,
    pub terminated_sessions: usize,
}

/// GET /admin/users?page&limit
pub async fn list_users(
    State(state): State<GatewayState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<UserPage>, ApiError> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query
        .limit
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);

    let users = state
        .storage
        .list_users_page(page.saturating_sub(1).saturating_mul(limit), limit)
        .await?;
    let total = state.storage.count_users().await?;

    Ok(Json(UserPage {
        users: users.into_iter().map(AdminUserView::from).collect(),
        page,
        limit,
        total,
    }))
}

/// POST /admin/users/{user_id}/block
pub async fn block_user(
    State(state): State<GatewayState>,
    Path(user_id): Path<String>,
    Json(body): Json<BlockRequest>,
) -> Result<Json<BlockResponse>, ApiError> {
    if let Some(until) = body.until.as_deref() {
        let expiry = DateTime::parse_from_rfc3339(until)
            .map_err(|e| ApiError::bad_request(format!("invalid until timestamp: {e}")))?;
        if expiry.with_timezone(&Utc) <= Utc::now() {
            return Err(ApiError::bad_request("until must be in the future"));
        }
    }

    let user = state
        .storage
        .set_user_blocked(&user_id, true, body.reason, body.until)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("user {user_id} not found")))?;
    let terminated_sessions = state.registry.terminate_for_user(&user_id).await;
    info!(
        user_id = %user_id,
        terminated_sessions,
        until = user.blocked_until.as_deref().unwrap_or("indefinite"),
        "user blocked"
    );

    Ok(Json(BlockResponse {
        user: user.into(),
        terminated_sessions,
    }))
}

/// POST /admin/users/{user_id}/unblock
pub async fn unblock_user(
    State(state): State<GatewayState>,
    Path(user_id): Path<String>,
) -> Result<Json<AdminUserView>, ApiError> {
    let user = state
        .storage
        .set_user_blocked(&user_id, false, None, None)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("user {user_id} not found")))?;
    info!(user_id = %user_id, "user unblocked");
    Ok(Json(user.into()))
}
