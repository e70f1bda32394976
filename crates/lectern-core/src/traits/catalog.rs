// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Catalog adapter trait for the remote item catalog.

use async_trait::async_trait;

use crate::error::LecternError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{CatalogEntry, CatalogFilters, CatalogIdentity, CatalogSearchResult};

/// Read access to the remote catalog, authorized by the caller's API key.
#[async_trait]
pub trait CatalogAdapter: PluginAdapter {
    /// Resolves the identity that owns `api_key`. Fails with
    /// [`LecternError::Auth`] when the key is rejected.
    async fn identity(&self, api_key: &str) -> Result<CatalogIdentity, LecternError>;

    async fn search(
        &self,
        api_key: &str,
        page: u32,
        limit: u32,
        filters: &CatalogFilters,
    ) -> Result<CatalogSearchResult, LecternError>;

    async fn detail(
        &self,
        api_key: &str,
        catalog_id: &str,
        entry_id: &str,
    ) -> Result<CatalogEntry, LecternError>;
}
