//! Tool source abstraction: list tools and call a tool by name.
//!
//! The tool worker (spec §4.2) depends on this trait rather than a concrete
//! registry, so builtin tools, MCP-provided tools, and the task tool can all
//! be dispatched the same way.

mod context;

pub use context::ToolCallContext;

use async_trait::async_trait;
use serde_json::Value;

pub use crate::error::ToolSourceError;

/// Tool specification, aligned with an MCP `tools/list` result item (spec §3
/// `ToolDefinition`).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: Option<String>,
    pub input_schema: Value,
    #[serde(default)]
    pub requires_confirmation: bool,
}

/// Result of one tool call; the tool worker wraps this into a `tool`-role
/// message content.
#[derive(Debug, Clone)]
pub struct ToolCallContent {
    pub text: String,
}

impl ToolCallContent {
    pub fn json(value: &Value) -> Self {
        Self {
            text: value.to_string(),
        }
    }
}

/// Lists and calls tools by name; implemented by [`crate::tools::AggregateToolSource`]
/// and by MCP server adapters.
#[async_trait]
pub trait ToolSource: Send + Sync {
    async fn list_tools(&self) -> Result<Vec<ToolSpec>, ToolSourceError>;

    async fn call_tool(
        &self,
        name: &str,
        arguments: Value,
    ) -> Result<ToolCallContent, ToolSourceError>;

    /// Call with optional per-call context (e.g. the conversation's plan-mode
    /// state). Default ignores context and forwards to `call_tool`.
    async fn call_tool_with_context(
        &self,
        name: &str,
        arguments: Value,
        ctx: Option<&ToolCallContext>,
    ) -> Result<ToolCallContent, ToolSourceError> {
        let _ = ctx;
        self.call_tool(name, arguments).await
    }

    fn set_call_context(&self, _ctx: Option<ToolCallContext>) {}
}
