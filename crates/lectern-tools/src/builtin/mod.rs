// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The catalog tools every conversation gets.

pub mod detail;
pub mod display;
pub mod list;

use std::sync::Arc;

pub use detail::ItemDetailTool;
pub use display::DisplayItemsTool;
pub use list::ListItemsTool;

use crate::ToolRegistry;

/// Registers `display_items`, `list_items`, and `get_item_detail`.
pub fn register_builtins(registry: &mut ToolRegistry) {
    registry.register(Arc::new(DisplayItemsTool));
    registry.register(Arc::new(ListItemsTool));
    registry.register(Arc::new(ItemDetailTool));
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use lectern_core::types::{CatalogEntry, CatalogFilters};
    use lectern_core::{ChatEventKind, Focus, LecternError};
    use lectern_test_utils::{MockCatalog, RecordingListener};

    use super::*;
    use crate::tool::ToolContext;

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        register_builtins(&mut registry);
        registry
    }

    fn entry(id: &str, catalog: &str) -> CatalogEntry {
        CatalogEntry {
            id: id.into(),
            catalog_id: catalog.into(),
            title: Some(format!("Title {id}")),
            extra: Default::default(),
        }
    }

    #[test]
    fn registers_three_tools_in_name_order() {
        let names: Vec<_> = registry()
            .tool_definitions()
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(names, ["display_items", "get_item_detail", "list_items"]);
    }

    #[tokio::test]
    async fn display_emits_one_entries_event_without_catalog() {
        let catalog = MockCatalog::new();
        let listener = RecordingListener::new();
        let focus = Focus::default();
        let ctx = ToolContext {
            api_key: "k",
            catalog: &catalog,
            listener: &listener,
            focus: &focus,
        };

        let out = registry()
            .invoke(
                "display_items",
                r#"{"ids":["a","b"],"catalogs":{"a":"c1","b":"c2"}}"#,
                &ctx,
            )
            .await
            .unwrap();
        assert!(!out.is_error);

        let events = listener.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, ChatEventKind::Entries);
        assert_eq!(events[0].entry_ids(), ["a", "b"]);
        assert_eq!(
            events[0].catalog_id,
            Some(BTreeMap::from([("a".into(), "c1".into()), ("b".into(), "c2".into())]))
        );
        assert_eq!(catalog.call_count(), 0);
    }

    #[tokio::test]
    async fn list_sends_only_given_filters_and_returns_catalog_ids() {
        let catalog = MockCatalog::new().with_entries(vec![entry("e1", "c9")]);
        let listener = RecordingListener::new();
        let focus = Focus::default();
        let ctx = ToolContext {
            api_key: "key-1",
            catalog: &catalog,
            listener: &listener,
            focus: &focus,
        };

        let out = registry()
            .invoke("list_items", r#"{"author":"Herbert","limit":500}"#, &ctx)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_str(&out.content).unwrap();
        assert_eq!(body["entries"][0]["catalogId"], "c9");

        let searches = catalog.searches();
        assert_eq!(searches.len(), 1);
        let (key, page, limit, filters) = &searches[0];
        assert_eq!(key, "key-1");
        assert_eq!((*page, *limit), (1, 50));
        assert_eq!(
            filters,
            &CatalogFilters {
                author: Some("Herbert".into()),
                ..Default::default()
            }
        );
    }

    #[tokio::test]
    async fn detail_without_resolvable_catalog_is_a_tool_error() {
        let catalog = MockCatalog::new().with_entries(vec![entry("e1", "c1")]);
        let listener = RecordingListener::new();
        let focus = Focus::new(Some("other".into()), Some("c1".into()));
        let ctx = ToolContext {
            api_key: "k",
            catalog: &catalog,
            listener: &listener,
            focus: &focus,
        };

        let err = registry()
            .invoke("get_item_detail", r#"{"id":"e1"}"#, &ctx)
            .await
            .unwrap_err();
        assert!(matches!(&err, LecternError::Tool { message, .. } if message.contains("catalogId")));
        assert_eq!(catalog.call_count(), 0);
    }

    #[tokio::test]
    async fn detail_uses_focus_catalog_for_focused_item() {
        let catalog = MockCatalog::new().with_entries(vec![entry("e1", "c1")]);
        let listener = RecordingListener::new();
        let focus = Focus::new(Some("e1".into()), Some("c1".into()));
        let ctx = ToolContext {
            api_key: "k",
            catalog: &catalog,
            listener: &listener,
            focus: &focus,
        };

        let out = registry()
            .invoke("get_item_detail", r#"{"id":"e1"}"#, &ctx)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_str(&out.content).unwrap();
        assert_eq!(body["title"], "Title e1");
    }

    #[tokio::test]
    async fn detail_catalog_failure_becomes_tool_error() {
        let catalog = MockCatalog::new().failing();
        let listener = RecordingListener::new();
        let focus = Focus::default();
        let ctx = ToolContext {
            api_key: "k",
            catalog: &catalog,
            listener: &listener,
            focus: &focus,
        };
        let err = registry()
            .invoke("get_item_detail", r#"{"id":"e1","catalogId":"c1"}"#, &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, LecternError::Tool { .. }));
    }
}
