//! The common shape every built-in, MCP, and task tool implements.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ToolSourceError;
use crate::tool_source::{ToolCallContent, ToolCallContext, ToolSpec};

/// A single callable tool. Registered by name in a [`crate::tools::ToolRegistry`];
/// dispatched by the tool worker (spec §4.2).
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    /// Description, JSON-schema, and confirmation requirement for this tool.
    fn spec(&self) -> ToolSpec;

    /// Executes the tool. Implementations must convert every internal
    /// failure into a `ToolSourceError` variant rather than panicking (spec
    /// §4.2 step 4: "All executors MUST catch every internal failure").
    async fn call(
        &self,
        args: Value,
        ctx: Option<&ToolCallContext>,
    ) -> Result<ToolCallContent, ToolSourceError>;
}
