//! Name-keyed tool storage (spec §9 "registry of closures keyed by name").

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::error::ToolSourceError;
use crate::tool_source::{ToolCallContent, ToolCallContext, ToolSpec};

use super::Tool;

/// Owns a fixed set of tools by name. Immutable after process startup except
/// for MCP tools appended during initialization (spec §3 `ToolDefinition`).
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn list(&self) -> Vec<ToolSpec> {
        self.tools.values().map(|t| t.spec()).collect()
    }

    pub async fn call(
        &self,
        name: &str,
        args: serde_json::Value,
        ctx: Option<&ToolCallContext>,
    ) -> Result<ToolCallContent, ToolSourceError> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| ToolSourceError::NotFound(name.to_string()))?;
        tool.call(args, ctx).await
    }
}

/// Thread-safe wrapper sharing one registry across the API worker and tool
/// worker without cloning tool state.
#[derive(Clone)]
pub struct ToolRegistryLocked {
    inner: Arc<RwLock<ToolRegistry>>,
}

impl ToolRegistryLocked {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(ToolRegistry::new())),
        }
    }

    pub async fn register(&self, tool: Box<dyn Tool>) {
        self.inner.write().await.register(tool);
    }

    pub async fn list(&self) -> Vec<ToolSpec> {
        self.inner.read().await.list()
    }

    pub async fn call(
        &self,
        name: &str,
        args: serde_json::Value,
        ctx: Option<&ToolCallContext>,
    ) -> Result<ToolCallContent, ToolSourceError> {
        self.inner.read().await.call(name, args, ctx).await
    }
}

impl Default for ToolRegistryLocked {
    fn default() -> Self {
        Self::new()
    }
}
