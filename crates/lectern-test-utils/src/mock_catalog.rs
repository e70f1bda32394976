// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory catalog for tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use lectern_core::traits::adapter::PluginAdapter;
use lectern_core::traits::catalog::CatalogAdapter;
use lectern_core::types::{
    AdapterType, CatalogEntry, CatalogFilters, CatalogIdentity, CatalogSearchResult, HealthStatus,
};
use lectern_core::LecternError;

type SearchCall = (String, u32, u32, CatalogFilters);

/// A catalog backed by a fixed entry list and a key-to-identity map.
///
/// `failing()` makes every call return a catalog error, for exercising
/// tool failure paths.
#[derive(Default)]
pub struct MockCatalog {
    entries: Vec<CatalogEntry>,
    identities: HashMap<String, CatalogIdentity>,
    failing: bool,
    calls: AtomicUsize,
    searches: Mutex<Vec<SearchCall>>,
    details: Mutex<Vec<(String, String)>>,
}

impl MockCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries(mut self, entries: Vec<CatalogEntry>) -> Self {
        self.entries = entries;
        self
    }

    /// Accepts `api_key` as belonging to `identity`.
    pub fn with_identity(mut self, api_key: &str, identity: CatalogIdentity) -> Self {
        self.identities.insert(api_key.to_string(), identity);
        self
    }

    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    /// A plain identity with the given id.
    pub fn identity(id: &str) -> CatalogIdentity {
        CatalogIdentity {
            id: id.to_string(),
            first_name: Some("Test".to_string()),
            last_name: Some(id.to_string()),
            username: Some(id.to_string()),
            is_superuser: false,
            permissions: Vec::new(),
            catalog_permissions: Default::default(),
        }
    }

    /// An entry with a title derived from its id.
    pub fn entry(id: &str, catalog_id: &str) -> CatalogEntry {
        CatalogEntry {
            id: id.to_string(),
            catalog_id: catalog_id.to_string(),
            title: Some(format!("Title {id}")),
            extra: Default::default(),
        }
    }

    /// Search and detail calls made so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn searches(&self) -> Vec<SearchCall> {
        self.searches.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// `(catalog_id, entry_id)` of every detail call.
    pub fn details(&self) -> Vec<(String, String)> {
        self.details.lock().map(|d| d.clone()).unwrap_or_default()
    }

    fn check_failing(&self) -> Result<(), LecternError> {
        if self.failing {
            Err(LecternError::catalog("catalog unavailable"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl PluginAdapter for MockCatalog {
    fn name(&self) -> &str {
        "mock-catalog"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Catalog
    }

    async fn health_check(&self) -> Result<HealthStatus, LecternError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), LecternError> {
        Ok(())
    }
}

#[async_trait]
impl CatalogAdapter for MockCatalog {
    async fn identity(&self, api_key: &str) -> Result<CatalogIdentity, LecternError> {
        self.check_failing()?;
        self.identities
            .get(api_key)
            .cloned()
            .ok_or_else(|| LecternError::Auth("invalid API key".to_string()))
    }

    async fn search(
        &self,
        api_key: &str,
        page: u32,
        limit: u32,
        filters: &CatalogFilters,
    ) -> Result<CatalogSearchResult, LecternError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut searches) = self.searches.lock() {
            searches.push((api_key.to_string(), page, limit, filters.clone()));
        }
        self.check_failing()?;

        let query = filters.query.as_deref().map(str::to_lowercase);
        let matching: Vec<CatalogEntry> = self
            .entries
            .iter()
            .filter(|e| {
                filters
                    .catalog_id
                    .as_deref()
                    .is_none_or(|c| c == e.catalog_id)
            })
            .filter(|e| match (&query, &e.title) {
                (Some(q), Some(title)) => title.to_lowercase().contains(q.as_str()),
                (Some(_), None) => false,
                (None, _) => true,
            })
            .cloned()
            .collect();

        let total = matching.len() as u64;
        let skip = (page.saturating_sub(1) * limit) as usize;
        Ok(CatalogSearchResult {
            entries: matching.into_iter().skip(skip).take(limit as usize).collect(),
            total: Some(total),
            page,
            limit,
        })
    }

    async fn detail(
        &self,
        _api_key: &str,
        catalog_id: &str,
        entry_id: &str,
    ) -> Result<CatalogEntry, LecternError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut details) = self.details.lock() {
            details.push((catalog_id.to_string(), entry_id.to_string()));
        }
        self.check_failing()?;
        self.entries
            .iter()
            .find(|e| e.id == entry_id && e.catalog_id == catalog_id)
            .cloned()
            .ok_or_else(|| {
                LecternError::catalog(format!("entry {entry_id} not found in catalog {catalog_id}"))
            })
    }
}
