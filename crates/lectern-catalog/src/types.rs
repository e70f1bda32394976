// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wire shapes returned by the catalog service.

use std::collections::BTreeMap;

use lectern_core::types::{CatalogEntry, CatalogIdentity, CatalogSearchResult};
use serde::{Deserialize, Deserializer};

/// One page of `GET /api/entries`. Older deployments answer with
/// `results`/`count` instead of `entries`/`total`.
#[derive(Debug, Deserialize)]
pub struct SearchPage {
    #[serde(alias = "results", alias = "items")]
    pub entries: Vec<CatalogEntry>,
    #[serde(default, alias = "count")]
    pub total: Option<u64>,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub limit: Option<u32>,
}

impl SearchPage {
    /// Fills page and limit from the request when the service omits them.
    pub fn into_result(self, page: u32, limit: u32) -> CatalogSearchResult {
        CatalogSearchResult {
            entries: self.entries,
            total: self.total,
            page: self.page.unwrap_or(page),
            limit: self.limit.unwrap_or(limit),
        }
    }
}

/// `GET /api/users/me`. The id may be numeric.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireIdentity {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default, alias = "first_name")]
    pub first_name: Option<String>,
    #[serde(default, alias = "last_name")]
    pub last_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default, alias = "is_superuser")]
    pub is_superuser: bool,
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(default, alias = "catalog_permissions")]
    pub catalog_permissions: BTreeMap<String, String>,
}

impl From<WireIdentity> for CatalogIdentity {
    fn from(w: WireIdentity) -> Self {
        CatalogIdentity {
            id: w.id,
            first_name: w.first_name,
            last_name: w.last_name,
            username: w.username,
            is_superuser: w.is_superuser,
            permissions: w.permissions,
            catalog_permissions: w.catalog_permissions,
        }
    }
}

/// Error body, when the service sends one.
#[derive(Debug, Deserialize)]
pub struct WireError {
    #[serde(alias = "detail", alias = "message")]
    pub error: String,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {other}"
        ))),
    }
}
