// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tool trait and registry.
//!
//! The [`ToolRegistry`] resolves the function calls a model emits and
//! produces the function declarations sent with every completion request.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use lectern_core::types::ToolDefinition;
use lectern_core::{CatalogAdapter, ConversationListener, Focus, LecternError};
use serde::{Deserialize, Serialize};

/// Output from a tool invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutput {
    /// Text handed back to the model, usually JSON.
    pub content: String,
    pub is_error: bool,
}

impl ToolOutput {
    pub fn ok(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: false,
        }
    }

    /// Structured failure payload the model can read and recover from.
    pub fn failure(message: &str) -> Self {
        Self {
            content: serde_json::json!({ "error": true, "message": message }).to_string(),
            is_error: true,
        }
    }
}

/// What a tool may reach while it runs: the catalog (as the calling user),
/// the conversation's event listener, and the current focus.
pub struct ToolContext<'a> {
    pub api_key: &'a str,
    pub catalog: &'a (dyn CatalogAdapter + Send + Sync),
    pub listener: &'a dyn ConversationListener,
    pub focus: &'a Focus,
}

/// A function the model can call.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON Schema of the arguments object.
    fn parameters_schema(&self) -> serde_json::Value;

    async fn invoke(
        &self,
        input: serde_json::Value,
        ctx: &ToolContext<'_>,
    ) -> Result<ToolOutput, LecternError>;
}

/// Parses a tool's arguments, reporting bad input as a tool error.
pub fn parse_args<T: serde::de::DeserializeOwned>(
    tool: &str,
    input: serde_json::Value,
) -> Result<T, LecternError> {
    serde_json::from_value(input).map_err(|e| LecternError::Tool {
        message: format!("invalid arguments for {tool}: {e}"),
        source: Some(Box::new(e)),
    })
}

/// Tools indexed by name.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Registers a tool under its `name()`, replacing any previous one.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Declarations for every registered tool, sorted by name.
    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self
            .tools
            .values()
            .map(|t| ToolDefinition {
                name: t.name().to_string(),
                description: t.description().to_string(),
                parameters: t.parameters_schema(),
            })
            .collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Runs the named tool. Unknown names and malformed JSON arguments are
    /// tool errors like any other.
    pub async fn invoke(
        &self,
        name: &str,
        arguments: &str,
        ctx: &ToolContext<'_>,
    ) -> Result<ToolOutput, LecternError> {
        let tool = self
            .get(name)
            .ok_or_else(|| LecternError::tool(format!("unknown tool `{name}`")))?;
        let input = if arguments.trim().is_empty() {
            serde_json::Value::Object(Default::default())
        } else {
            serde_json::from_str(arguments).map_err(|e| LecternError::Tool {
                message: format!("arguments for {name} are not valid JSON: {e}"),
                source: Some(Box::new(e)),
            })?
        };
        tool.invoke(input, ctx).await
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
