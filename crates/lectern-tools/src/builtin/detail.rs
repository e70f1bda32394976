// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `get_item_detail`: fetch one catalog item.

use async_trait::async_trait;
use lectern_core::LecternError;
use serde::Deserialize;

use crate::tool::{Tool, ToolContext, ToolOutput, parse_args};

#[derive(Debug, Deserialize)]
struct Args {
    id: String,
    #[serde(default, rename = "catalogId", alias = "catalog_id")]
    catalog_id: Option<String>,
}

/// Fetches item detail. The catalog id comes from the arguments or, for
/// the focused item only, from the conversation focus. Anything else is
/// refused rather than guessed.
pub struct ItemDetailTool;

#[async_trait]
impl Tool for ItemDetailTool {
    fn name(&self) -> &str {
        "get_item_detail"
    }

    fn description(&self) -> &str {
        "Get full details of one catalog item. Requires the item's catalogId, \
         which list_items reports for every result."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "id": {"type": "string", "description": "Item id"},
                "catalogId": {"type": "string", "description": "Catalog the item belongs to"}
            },
            "required": ["id"]
        })
    }

    async fn invoke(
        &self,
        input: serde_json::Value,
        ctx: &ToolContext<'_>,
    ) -> Result<ToolOutput, LecternError> {
        let args: Args = parse_args(self.name(), input)?;
        let catalog_id = args
            .catalog_id
            .filter(|c| !c.trim().is_empty())
            .or_else(|| ctx.focus.catalog_for(&args.id).map(String::from))
            .ok_or_else(|| {
                LecternError::tool(format!(
                    "no catalogId for item {}; call list_items to find the catalog it belongs to",
                    args.id
                ))
            })?;

        let entry = ctx
            .catalog
            .detail(ctx.api_key, &catalog_id, &args.id)
            .await
            .map_err(|e| LecternError::Tool {
                message: format!("could not load item {} from catalog {catalog_id}: {e}", args.id),
                source: Some(Box::new(e)),
            })?;
        let body = serde_json::to_string(&entry).map_err(|e| LecternError::Tool {
            message: format!("could not encode item: {e}"),
            source: Some(Box::new(e)),
        })?;
        Ok(ToolOutput::ok(body))
    }
}
