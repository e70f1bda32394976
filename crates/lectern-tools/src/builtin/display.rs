// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `display_items`: show catalog items to the user.

use std::collections::BTreeMap;

use async_trait::async_trait;
use lectern_core::{ChatEvent, LecternError};
use serde::Deserialize;
use tracing::debug;

use crate::tool::{Tool, ToolContext, ToolOutput, parse_args};

#[derive(Debug, Deserialize)]
struct Args {
    ids: Vec<String>,
    #[serde(default, alias = "catalogIds")]
    catalogs: BTreeMap<String, String>,
}

/// Emits an `entries` event. Never calls the catalog.
pub struct DisplayItemsTool;

#[async_trait]
impl Tool for DisplayItemsTool {
    fn name(&self) -> &str {
        "display_items"
    }

    fn description(&self) -> &str {
        "Display catalog items to the user as cards. Pass the item ids and, for each id, \
         the id of the catalog it belongs to."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "ids": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "Item ids to display, in order"
                },
                "catalogs": {
                    "type": "object",
                    "additionalProperties": {"type": "string"},
                    "description": "Map from item id to its catalog id"
                }
            },
            "required": ["ids"]
        })
    }

    async fn invoke(
        &self,
        input: serde_json::Value,
        ctx: &ToolContext<'_>,
    ) -> Result<ToolOutput, LecternError> {
        let args: Args = parse_args(self.name(), input)?;
        if args.ids.is_empty() {
            return Err(LecternError::tool("display_items needs at least one id"));
        }
        let count = args.ids.len();
        debug!(count, "displaying items");
        ctx.listener.on_event(ChatEvent::entries(args.ids, args.catalogs));
        Ok(ToolOutput::ok(
            serde_json::json!({ "displayed": count, "success": true }).to_string(),
        ))
    }
}
