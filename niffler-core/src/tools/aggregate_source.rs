//! Adapts a [`ToolRegistryLocked`] to the [`ToolSource`] trait so the API
//! worker can depend on the trait rather than the concrete registry.

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::error::ToolSourceError;
use crate::tool_source::{ToolCallContent, ToolCallContext, ToolSource, ToolSpec};

use super::ToolRegistryLocked;

pub struct AggregateToolSource {
    registry: ToolRegistryLocked,
    call_context: RwLock<Option<ToolCallContext>>,
}

impl AggregateToolSource {
    pub fn new() -> Self {
        Self {
            registry: ToolRegistryLocked::new(),
            call_context: RwLock::new(None),
        }
    }

    pub fn registry(&self) -> &ToolRegistryLocked {
        &self.registry
    }
}

impl Default for AggregateToolSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolSource for AggregateToolSource {
    async fn list_tools(&self) -> Result<Vec<ToolSpec>, ToolSourceError> {
        Ok(self.registry.list().await)
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: Value,
    ) -> Result<ToolCallContent, ToolSourceError> {
        let ctx = self.call_context.read().await.clone();
        self.registry.call(name, arguments, ctx.as_ref()).await
    }

    async fn call_tool_with_context(
        &self,
        name: &str,
        arguments: Value,
        ctx: Option<&ToolCallContext>,
    ) -> Result<ToolCallContent, ToolSourceError> {
        self.registry.call(name, arguments, ctx).await
    }

    fn set_call_context(&self, ctx: Option<ToolCallContext>) {
        // Synchronous setter over an async lock: mirrors the teacher's
        // registry, which only ever calls this from the single-threaded
        // tool worker loop between tool dispatches, never concurrently.
        if let Ok(mut guard) = self.call_context.try_write() {
            *guard = ctx;
        }
    }
}
