// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Caller authentication.
//!
//! End users authenticate with their catalog API key, taken from (in order)
//! `Authorization: Bearer`, `X-Api-Key`, the `apiKey` query parameter, or
//! the `apiKey` body field. The key is verified by asking the catalog who
//! owns it; the local user record is then upserted and its block state
//! enforced.
//!
//! Admin routes use a separate static bearer token and fail closed when no
//! token is configured.

use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use axum_extra::headers::authorization::Bearer;
use axum_extra::headers::{Authorization, HeaderMapExt};
use chrono::Utc;
use lectern_core::LecternError;
use lectern_core::types::{CatalogIdentity, User, timestamp_now};
use tracing::{info, warn};

use crate::error::ApiError;
use crate::server::GatewayState;

/// Custom header carrying the API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Picks the API key by precedence: bearer, custom header, query, body.
pub fn extract_api_key(
    headers: &HeaderMap,
    query_key: Option<&str>,
    body_key: Option<&str>,
) -> Option<String> {
    let bearer = headers
        .typed_get::<Authorization<Bearer>>()
        .map(|auth| auth.token().to_string());
    let header = headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    [bearer, header, query_key.map(str::to_string), body_key.map(str::to_string)]
        .into_iter()
        .flatten()
        .map(|key| key.trim().to_string())
        .find(|key| !key.is_empty())
}

/// A caller whose key the catalog accepted and who is not blocked.
#[derive(Debug, Clone)]
pub struct Caller {
    pub user: User,
    pub api_key: String,
}

/// Verifies `api_key` against the catalog and refreshes the local user.
///
/// A blocked user gets 403 and loses every live session. A block whose
/// expiry has passed is lifted here.
pub async fn verify_caller(
    state: &GatewayState,
    api_key: Option<String>,
) -> Result<Caller, ApiError> {
    let api_key = api_key.ok_or_else(|| ApiError::unauthorized("missing API key"))?;
    let identity = state.catalog.identity(&api_key).await?;

    let mut user = state.storage.upsert_user(&user_from_identity(identity)).await?;

    if user.blocked {
        if user.is_blocked_at(Utc::now()) {
            let terminated = state.registry.terminate_for_user(&user.id).await;
            warn!(user_id = %user.id, terminated, "blocked user rejected");
            return Err(LecternError::Forbidden {
                reason: user
                    .blocked_reason
                    .clone()
                    .unwrap_or_else(|| "user is blocked".to_string()),
            }
            .into());
        }
        if let Some(lifted) = state
            .storage
            .set_user_blocked(&user.id, false, None, None)
            .await?
        {
            info!(user_id = %lifted.id, "expired block lifted");
            user = lifted;
        }
    }

    Ok(Caller { user, api_key })
}

fn user_from_identity(identity: CatalogIdentity) -> User {
    let now = timestamp_now();
    User {
        id: identity.id,
        first_name: identity.first_name,
        last_name: identity.last_name,
        username: identity.username,
        is_superuser: identity.is_superuser,
        permissions: identity.permissions,
        catalog_permissions: identity.catalog_permissions,
        blocked: false,
        blocked_reason: None,
        blocked_until: None,
        created_at: now.clone(),
        last_seen_at: now,
    }
}

/// Admin token for `/admin` routes.
#[derive(Clone)]
pub struct AdminAuth {
    pub token: Option<String>,
}

impl std::fmt::Debug for AdminAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminAuth")
            .field("token", &self.token.as_ref().map(|_| "[redacted]"))
            .finish()
    }
}

/// Rejects admin requests without the configured bearer token.
pub async fn admin_middleware(
    State(auth): State<AdminAuth>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let Some(expected) = auth.token.as_deref() else {
        tracing::error!("admin token not configured -- rejecting admin request");
        return Err(StatusCode::UNAUTHORIZED);
    };

    let presented = request
        .headers()
        .typed_get::<Authorization<Bearer>>()
        .map(|auth| auth.token().to_string());

    match presented {
        Some(token) if token == expected => Ok(next.run(request).await),
        _ => Err(StatusCode::UNAUTHORIZED),
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn bearer_wins_over_everything() {
        let h = headers(&[("authorization", "Bearer from-bearer"), ("x-api-key", "from-header")]);
        assert_eq!(
            extract_api_key(&h, Some("from-query"), Some("from-body")).as_deref(),
            Some("from-bearer")
        );
    }

    #[test]
    fn custom_header_beats_query_and_body() {
        let h = headers(&[("x-api-key", "from-header")]);
        assert_eq!(
            extract_api_key(&h, Some("from-query"), Some("from-body")).as_deref(),
            Some("from-header")
        );
    }

    #[test]
    fn query_beats_body() {
        let h = HeaderMap::new();
        assert_eq!(
            extract_api_key(&h, Some("from-query"), Some("from-body")).as_deref(),
            Some("from-query")
        );
        assert_eq!(
            extract_api_key(&h, None, Some("from-body")).as_deref(),
            Some("from-body")
        );
    }

    #[test]
    fn blank_sources_are_skipped() {
        let h = headers(&[("x-api-key", "  ")]);
        assert_eq!(
            extract_api_key(&h, Some(""), Some("from-body")).as_deref(),
            Some("from-body")
        );
        assert!(extract_api_key(&HeaderMap::new(), None, None).is_none());
    }

    #[test]
    fn non_bearer_authorization_is_ignored() {
        let h = headers(&[("authorization", "Basic dXNlcjpwYXNz")]);
        assert_eq!(
            extract_api_key(&h, Some("from-query"), None).as_deref(),
            Some("from-query")
        );
    }

    #[test]
    fn admin_auth_debug_redacts_token() {
        let auth = AdminAuth {
            token: Some("secret-token".into()),
        };
        let debug_output = format!("{auth:?}");
        assert!(!debug_output.contains("secret-token"));
        assert!(debug_output.contains("[redacted]"));
    }
}
