// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! System instructions sent with every completion request.

use lectern_core::Focus;

const DEFAULT_INSTRUCTIONS: &str = "\
You are a catalog assistant. You help the user find, compare and understand items \
from the catalogs they have access to.

Use list_items to search. Every result carries the catalogId of the catalog it \
belongs to; remember it. Use get_item_detail with both the item id and its \
catalogId when the user asks about a specific item. Use display_items to show \
items to the user as cards whenever you recommend or mention specific items, \
passing the catalogId of each id.

Only describe items you have seen in tool results. If a tool reports an error, \
explain the problem briefly and continue the conversation.";

/// Builds the instructions for the current focus. `template` replaces the
/// built-in text; the focus section is always appended.
pub fn build_instructions(template: Option<&str>, focus: &Focus) -> String {
    let mut out = template.unwrap_or(DEFAULT_INSTRUCTIONS).trim_end().to_string();
    match (&focus.entry_id, &focus.catalog_id) {
        (Some(entry), Some(catalog)) => {
            out.push_str(&format!(
                "\n\nThe user is currently looking at item {entry} in catalog {catalog}. \
                 Questions that do not name another item are about this one."
            ));
        }
        (None, Some(catalog)) => {
            out.push_str(&format!(
                "\n\nThe user is currently browsing catalog {catalog}. \
                 Prefer results from this catalog."
            ));
        }
        _ => {}
    }
    out
}
