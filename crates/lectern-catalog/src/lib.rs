// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! REST client for the remote item catalog.
//!
//! Every call is authorized with the end user's own API key as a bearer
//! token, so the catalog enforces its own permissions. A rejected key maps to
//! [`LecternError::Auth`]; anything else that goes wrong maps to
//! [`LecternError::Catalog`] (or [`LecternError::Timeout`]).

pub mod types;

use std::time::Duration;

use async_trait::async_trait;
use lectern_config::model::CatalogConfig;
use lectern_core::types::{CatalogEntry, CatalogFilters, CatalogIdentity, CatalogSearchResult};
use lectern_core::{AdapterType, CatalogAdapter, HealthStatus, LecternError, PluginAdapter};
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::types::{SearchPage, WireError, WireIdentity};

/// HTTP implementation of [`CatalogAdapter`].
#[derive(Debug, Clone)]
pub struct RestCatalog {
    client: reqwest::Client,
    base_url: Url,
    timeout: Duration,
}

impl RestCatalog {
    pub fn new(config: &CatalogConfig) -> Result<Self, LecternError> {
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            LecternError::Config(format!("invalid catalog.base_url '{}': {e}", config.base_url))
        })?;
        let timeout = Duration::from_secs(config.timeout_secs);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LecternError::Catalog {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            base_url,
            timeout,
        })
    }

    /// Joins path segments onto the base URL, percent-encoding each one.
    fn url(&self, segments: &[&str]) -> Result<Url, LecternError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| LecternError::Config("catalog.base_url cannot be a base".into()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
        api_key: &str,
        query: &[(&str, String)],
    ) -> Result<T, LecternError> {
        debug!(url = %url, "catalog request");
        let response = self
            .client
            .get(url.clone())
            .bearer_auth(api_key)
            .query(query)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if status.is_success() {
            let body = response.text().await.map_err(|e| self.transport_error(e))?;
            return serde_json::from_str(&body).map_err(|e| LecternError::Catalog {
                message: format!("unexpected catalog payload from {}: {e}", url.path()),
                source: Some(Box::new(e)),
            });
        }

        let body = response.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<WireError>(&body)
            .map(|w| w.error)
            .unwrap_or(body);
        Err(status_error(status, url.path(), &detail))
    }

    fn transport_error(&self, e: reqwest::Error) -> LecternError {
        if e.is_timeout() {
            return LecternError::Timeout {
                duration: self.timeout,
            };
        }
        LecternError::Catalog {
            message: format!("catalog request failed: {e}"),
            source: Some(Box::new(e)),
        }
    }
}

fn status_error(status: StatusCode, path: &str, detail: &str) -> LecternError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            LecternError::Auth(format!("catalog rejected API key ({status})"))
        }
        _ => {
            warn!(status = %status, path, detail, "catalog request failed");
            LecternError::catalog(format!("catalog returned {status} for {path}: {detail}"))
        }
    }
}

#[async_trait]
impl PluginAdapter for RestCatalog {
    fn name(&self) -> &str {
        "rest-catalog"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Catalog
    }

    /// Reachability only; no API key is available here.
    async fn health_check(&self) -> Result<HealthStatus, LecternError> {
        match self.client.head(self.base_url.clone()).send().await {
            Ok(resp) if resp.status().is_server_error() => Ok(HealthStatus::Degraded(format!(
                "catalog answered {}",
                resp.status()
            ))),
            Ok(_) => Ok(HealthStatus::Healthy),
            Err(e) => Ok(HealthStatus::Unhealthy(format!("catalog unreachable: {e}"))),
        }
    }

    async fn shutdown(&self) -> Result<(), LecternError> {
        Ok(())
    }
}

#[async_trait]
impl CatalogAdapter for RestCatalog {
    async fn identity(&self, api_key: &str) -> Result<CatalogIdentity, LecternError> {
        if api_key.is_empty() {
            return Err(LecternError::Auth("missing API key".into()));
        }
        let url = self.url(&["api", "users", "me"])?;
        let wire: WireIdentity = self.get_json(url, api_key, &[]).await?;
        Ok(wire.into())
    }

    async fn search(
        &self,
        api_key: &str,
        page: u32,
        limit: u32,
        filters: &CatalogFilters,
    ) -> Result<CatalogSearchResult, LecternError> {
        let url = self.url(&["api", "entries"])?;
        let mut query = vec![("page", page.to_string()), ("limit", limit.to_string())];
        query.extend(filters.query_pairs());
        let wire: SearchPage = self.get_json(url, api_key, &query).await?;
        Ok(wire.into_result(page, limit))
    }

    async fn detail(
        &self,
        api_key: &str,
        catalog_id: &str,
        entry_id: &str,
    ) -> Result<CatalogEntry, LecternError> {
        let url = self.url(&["api", "catalogs", catalog_id, "entries", entry_id])?;
        self.get_json(url, api_key, &[]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn catalog_for(base_url: &str) -> RestCatalog {
        RestCatalog::new(&CatalogConfig {
            base_url: base_url.to_string(),
            timeout_secs: 5,
        })
        .unwrap()
    }

    #[test]
    fn invalid_base_url_is_a_config_error() {
        let result = RestCatalog::new(&CatalogConfig {
            base_url: "not a url".into(),
            timeout_secs: 5,
        });
        assert!(matches!(result, Err(LecternError::Config(_))));
    }

    #[test]
    fn path_segments_are_encoded() {
        let catalog = catalog_for("http://catalog.local/base/");
        let url = catalog
            .url(&["api", "catalogs", "c 1", "entries", "a/b"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://catalog.local/base/api/catalogs/c%201/entries/a%2Fb"
        );
    }

    #[tokio::test]
    async fn identity_sends_bearer_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/users/me"))
            .and(header("authorization", "Bearer key-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "u1",
                "firstName": "Ada",
                "permissions": ["read"]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let identity = catalog_for(&server.uri()).identity("key-1").await.unwrap();
        assert_eq!(identity.id, "u1");
        assert_eq!(identity.permissions, vec!["read".to_string()]);
    }

    #[tokio::test]
    async fn rejected_key_is_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/users/me"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "detail": "Invalid token"
            })))
            .mount(&server)
            .await;

        let err = catalog_for(&server.uri()).identity("bad").await.unwrap_err();
        assert!(matches!(err, LecternError::Auth(_)), "got: {err}");
    }

    #[tokio::test]
    async fn empty_key_never_hits_the_network() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = catalog_for(&server.uri()).identity("").await.unwrap_err();
        assert!(matches!(err, LecternError::Auth(_)));
    }

    #[tokio::test]
    async fn search_forwards_pagination_and_filters() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/entries"))
            .and(query_param("page", "2"))
            .and(query_param("limit", "5"))
            .and(query_param("catalogId", "maps"))
            .and(query_param("yearFrom", "1900"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "entries": [
                    {"id": "7", "catalogId": "maps", "title": "Old Atlas", "year": 1910}
                ],
                "total": 6
            })))
            .expect(1)
            .mount(&server)
            .await;

        let filters = CatalogFilters {
            catalog_id: Some("maps".into()),
            year_from: Some(1900),
            ..Default::default()
        };
        let result = catalog_for(&server.uri())
            .search("k", 2, 5, &filters)
            .await
            .unwrap();

        assert_eq!(result.page, 2);
        assert_eq!(result.limit, 5);
        assert_eq!(result.total, Some(6));
        assert_eq!(result.entries[0].title.as_deref(), Some("Old Atlas"));
        assert_eq!(result.entries[0].extra["year"], 1910);
    }

    #[tokio::test]
    async fn detail_not_found_is_catalog_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/catalogs/maps/entries/404"))
            .respond_with(ResponseTemplate::new(404).set_body_string("no such entry"))
            .mount(&server)
            .await;

        let err = catalog_for(&server.uri())
            .detail("k", "maps", "404")
            .await
            .unwrap_err();
        match err {
            LecternError::Catalog { message, .. } => {
                assert!(message.contains("404"), "got: {message}");
                assert!(message.contains("no such entry"));
            }
            other => panic!("expected catalog error, got {other}"),
        }
    }

    #[tokio::test]
    async fn malformed_detail_payload_is_catalog_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/catalogs/maps/entries/1"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let err = catalog_for(&server.uri())
            .detail("k", "maps", "1")
            .await
            .unwrap_err();
        assert!(matches!(err, LecternError::Catalog { .. }));
    }

    #[tokio::test]
    async fn slow_catalog_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(Duration::from_secs(3))
                    .set_body_json(serde_json::json!({"id": "u1"})),
            )
            .mount(&server)
            .await;

        let catalog = RestCatalog::new(&CatalogConfig {
            base_url: server.uri(),
            timeout_secs: 1,
        })
        .unwrap();
        let err = catalog.identity("k").await.unwrap_err();
        assert!(matches!(err, LecternError::Timeout { .. }), "got: {err}");
    }

    #[tokio::test]
    async fn health_reports_reachability() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let status = catalog_for(&server.uri()).health_check().await.unwrap();
        assert_eq!(status, HealthStatus::Healthy);
    }
}
