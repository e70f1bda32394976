// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `list_items`: search the catalog.

use async_trait::async_trait;
use lectern_core::LecternError;
use lectern_core::types::CatalogFilters;
use serde::Deserialize;

use crate::tool::{Tool, ToolContext, ToolOutput, parse_args};

const DEFAULT_LIMIT: u32 = 10;
const MAX_LIMIT: u32 = 50;

#[derive(Debug, Deserialize)]
struct Args {
    #[serde(default)]
    page: Option<u32>,
    #[serde(default)]
    limit: Option<u32>,
    #[serde(flatten)]
    filters: CatalogFilters,
}

/// Delegates to catalog search and returns the raw page, owning catalog
/// ids included, so the model can learn which catalog each item lives in.
pub struct ListItemsTool;

#[async_trait]
impl Tool for ListItemsTool {
    fn name(&self) -> &str {
        "list_items"
    }

    fn description(&self) -> &str {
        "Search the catalog. All filters are optional; results include each item's catalogId."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "page": {"type": "integer", "minimum": 1},
                "limit": {"type": "integer", "minimum": 1, "maximum": MAX_LIMIT},
                "query": {"type": "string", "description": "Free-text search"},
                "title": {"type": "string"},
                "author": {"type": "string"},
                "genre": {"type": "string"},
                "language": {"type": "string"},
                "catalogId": {"type": "string", "description": "Restrict to one catalog"},
                "yearFrom": {"type": "integer"},
                "yearTo": {"type": "integer"},
                "available": {"type": "boolean"}
            }
        })
    }

    async fn invoke(
        &self,
        input: serde_json::Value,
        ctx: &ToolContext<'_>,
    ) -> Result<ToolOutput, LecternError> {
        let args: Args = parse_args(self.name(), input)?;
        let page = args.page.unwrap_or(1).max(1);
        let limit = args.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        let result = ctx
            .catalog
            .search(ctx.api_key, page, limit, &args.filters)
            .await
            .map_err(|e| LecternError::Tool {
                message: format!("catalog search failed: {e}"),
                source: Some(Box::new(e)),
            })?;
        let body = serde_json::to_string(&result).map_err(|e| LecternError::Tool {
            message: format!("could not encode search result: {e}"),
            source: Some(Box::new(e)),
        })?;
        Ok(ToolOutput::ok(body))
    }
}
