//! Conversation message types (spec §3: Message, ToolCall, ThinkingContent).
//!
//! **Interaction**: [`crate::conversation::ConversationManager`] persists these;
//! [`crate::worker::api_worker`] appends them as the streaming parser and
//! tool-use loop progress.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single message in a conversation.
///
/// Invariant: every `Role::Tool` message has a non-empty `tool_call_id` that
/// matches exactly one prior assistant `ToolCall.id` in the same conversation
/// (spec §8, first quantified invariant).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking: Option<ThinkingContent>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
            thinking: None,
            created_at: Utc::now(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
            thinking: None,
            created_at: Utc::now(),
        }
    }

    pub fn assistant(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_calls,
            tool_call_id: None,
            thinking: None,
            created_at: Utc::now(),
        }
    }

    pub fn tool(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: Some(tool_call_id.into()),
            thinking: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_thinking(mut self, thinking: ThinkingContent) -> Self {
        self.thinking = Some(thinking);
        self
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A structured tool invocation requested by the model.
///
/// `arguments` is validated against the tool's declared schema before
/// execution (spec §4.2 step 2).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

/// Model reasoning content, unified across provider formats (spec §3).
///
/// Invariant: exactly one of `reasoning_text` / `encrypted_reasoning` is
/// populated unless the block is a pure pass-through metadata record (both
/// `None`, `is_encrypted` irrelevant).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ThinkingContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encrypted_reasoning: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_meta: Option<serde_json::Value>,
    pub is_encrypted: bool,
}

impl ThinkingContent {
    pub fn plain(text: impl Into<String>, reasoning_id: Option<String>) -> Self {
        Self {
            reasoning_text: Some(text.into()),
            encrypted_reasoning: None,
            reasoning_id,
            provider_meta: None,
            is_encrypted: false,
        }
    }

    pub fn encrypted(payload: impl Into<String>) -> Self {
        Self {
            reasoning_text: None,
            encrypted_reasoning: Some(payload.into()),
            reasoning_id: None,
            provider_meta: None,
            is_encrypted: true,
        }
    }

    /// Rough token weight used by the thinking-budget windowing pass (§4.3).
    pub fn approx_tokens(&self) -> usize {
        self.reasoning_text
            .as_deref()
            .map(|t| crate::tokenizer::estimate_tokens(t))
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_message_carries_tool_call_id() {
        let m = Message::tool("call-1", "{}");
        assert_eq!(m.role, Role::Tool);
        assert_eq!(m.tool_call_id.as_deref(), Some("call-1"));
    }

    #[test]
    fn thinking_plain_sets_reasoning_text_not_encrypted() {
        let t = ThinkingContent::plain("secret", Some("r1".into()));
        assert!(!t.is_encrypted);
        assert_eq!(t.reasoning_text.as_deref(), Some("secret"));
        assert!(t.encrypted_reasoning.is_none());
    }

    #[test]
    fn thinking_encrypted_sets_encrypted_payload() {
        let t = ThinkingContent::encrypted("opaque-blob");
        assert!(t.is_encrypted);
        assert!(t.reasoning_text.is_none());
        assert_eq!(t.encrypted_reasoning.as_deref(), Some("opaque-blob"));
    }
}
