//! Uniform stream event vocabulary (spec §4.3 "StreamEvent kinds").

use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    ContentDelta {
        text: String,
    },
    ThinkingDelta {
        text: String,
        is_encrypted: bool,
        reasoning_id: Option<String>,
    },
    ToolCallDelta {
        index: usize,
        id_partial: Option<String>,
        name_partial: Option<String>,
        args_partial: Option<String>,
    },
    ToolCallComplete {
        id: String,
        name: String,
        args_json: Value,
    },
    /// A tool call whose accumulated argument text did not parse as JSON.
    /// The model's best-effort call is preserved as `raw_args` for the
    /// transcript (spec §4.3 point 3); the API worker turns this into a
    /// synthesized tool error rather than aborting the turn.
    ToolCallMalformed {
        id: String,
        name: String,
        raw_args: String,
    },
    Usage {
        input: u32,
        output: u32,
        reasoning: u32,
    },
    Done {
        finish_reason: String,
    },
    Error {
        message: String,
    },
}

impl StreamEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Done { .. } | StreamEvent::Error { .. })
    }
}
