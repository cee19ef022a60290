//! Wire types carried over the Channel Fabric (spec §4.1, §2 control flow).
//!
//! These are plain data; the fabric does not interpret them. Every type that
//! expects a correlated reply carries an `id` (a `Uuid`) so API worker and
//! tool worker can match requests to responses out of order if ever needed,
//! even though today's single-consumer-per-mailbox design keeps them FIFO.

use serde_json::Value;
use uuid::Uuid;

use crate::config::ModelConfig;
use crate::message::Message;
use crate::tool_source::ToolSpec;

/// Submitted by the CLI to start one model turn (spec §2 step 1).
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub conversation_id: String,
    pub messages: Vec<Message>,
    pub model: ModelConfig,
    pub mode_system_prompt: String,
    /// Tool declarations offered to the model this turn (spec §4.2 step 1,
    /// §6 wire shape); serialized into the provider's `tools`/`functions`
    /// array so it can actually emit a matching `tool_use`/`tool_calls`
    /// delta.
    pub tool_schemas: Vec<ToolSpec>,
}

/// One tool invocation dispatched from the API worker to the tool worker
/// (spec §2 step 3, §4.2).
#[derive(Debug, Clone)]
pub struct ToolRequest {
    pub id: Uuid,
    pub name: String,
    pub args_json: Value,
    pub requires_confirmation: bool,
}

/// Outcome of one tool invocation (spec §4.2).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolResponseKind {
    Result,
    Error,
    Ready,
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct ToolResponse {
    pub id: Uuid,
    pub kind: ToolResponseKind,
    pub output_json: Option<Value>,
    pub error: Option<String>,
}

impl ToolResponse {
    pub fn result(id: Uuid, output_json: Value) -> Self {
        Self {
            id,
            kind: ToolResponseKind::Result,
            output_json: Some(output_json),
            error: None,
        }
    }

    pub fn error(id: Uuid, error: impl Into<String>) -> Self {
        Self {
            id,
            kind: ToolResponseKind::Error,
            output_json: None,
            error: Some(error.into()),
        }
    }

    pub fn cancelled(id: Uuid) -> Self {
        Self {
            id,
            kind: ToolResponseKind::Cancelled,
            output_json: None,
            error: Some("declined by user".to_string()),
        }
    }
}

/// Published by the tool worker before running a tool whose definition sets
/// `requires_confirmation`; the CLI answers with [`ConfirmResponse`] (spec
/// §4.2 step 3).
#[derive(Debug, Clone)]
pub struct ConfirmRequest {
    pub id: Uuid,
    pub tool_name: String,
    pub summary: String,
}

#[derive(Debug, Clone)]
pub struct ConfirmResponse {
    pub id: Uuid,
    pub approved: bool,
}
