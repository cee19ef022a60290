//! Anthropic SSE event parsing: `content_block_start/delta/stop` framing
//! with block types `text`, `thinking`, `tool_use`, `redacted_thinking`
//! (spec §4.3 point 1, 3, 4).

use serde::Deserialize;
use serde_json::Value;

use super::block::{BlockAccumulator, BlockState};
use super::event::StreamEvent;
use super::sse::SseFrame;

#[derive(Default)]
pub struct AnthropicParser {
    blocks: BlockAccumulator,
    /// Whether `message_delta`'s `usage` has already produced a `Usage`
    /// event, so [`crate::stream::StreamSession`] knows not to synthesize one.
    pub usage_emitted: bool,
}

impl AnthropicParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one decoded SSE frame, returning zero or more uniform events.
    pub fn feed(&mut self, frame: &SseFrame) -> Vec<StreamEvent> {
        let Some(event_name) = frame.event.as_deref() else {
            return Vec::new();
        };
        if frame.data.trim().is_empty() {
            return Vec::new();
        }
        match event_name {
            "content_block_start" => self.on_block_start(&frame.data),
            "content_block_delta" => self.on_block_delta(&frame.data),
            "content_block_stop" => self.on_block_stop(&frame.data),
            "message_delta" => self.on_message_delta(&frame.data),
            "message_stop" => vec![StreamEvent::Done {
                finish_reason: "stop".to_string(),
            }],
            "error" => vec![StreamEvent::Error {
                message: frame.data.clone(),
            }],
            // message_start, ping, and any other/unknown event types are
            // tolerated without producing an event (spec §4.3 point 6).
            _ => Vec::new(),
        }
    }

    fn on_block_start(&mut self, data: &str) -> Vec<StreamEvent> {
        #[derive(Deserialize)]
        struct BlockStart {
            index: usize,
            content_block: ContentBlock,
        }
        #[derive(Deserialize)]
        #[serde(tag = "type")]
        enum ContentBlock {
            #[serde(rename = "text")]
            Text,
            #[serde(rename = "thinking")]
            Thinking {
                #[serde(default)]
                signature: Option<String>,
            },
            #[serde(rename = "redacted_thinking")]
            RedactedThinking { data: String },
            #[serde(rename = "tool_use")]
            ToolUse { id: String, name: String },
        }

        let Ok(parsed) = serde_json::from_str::<BlockStart>(data) else {
            return Vec::new();
        };
        match parsed.content_block {
            ContentBlock::Text => {
                self.blocks.start(parsed.index, BlockState::Text);
                Vec::new()
            }
            ContentBlock::Thinking { signature } => {
                self.blocks.start(
                    parsed.index,
                    BlockState::Reasoning {
                        reasoning_id: signature,
                    },
                );
                Vec::new()
            }
            ContentBlock::RedactedThinking { data } => {
                self.blocks.start(
                    parsed.index,
                    BlockState::RedactedReasoning {
                        payload: data.clone(),
                    },
                );
                vec![StreamEvent::ThinkingDelta {
                    text: String::new(),
                    is_encrypted: true,
                    reasoning_id: None,
                }]
            }
            ContentBlock::ToolUse { id, name } => {
                self.blocks.start(
                    parsed.index,
                    BlockState::ToolCall {
                        id,
                        name,
                        args_buf: String::new(),
                    },
                );
                Vec::new()
            }
        }
    }

    fn on_block_delta(&mut self, data: &str) -> Vec<StreamEvent> {
        #[derive(Deserialize)]
        struct BlockDelta {
            index: usize,
            delta: Delta,
        }
        #[derive(Deserialize)]
        #[serde(tag = "type")]
        enum Delta {
            #[serde(rename = "text_delta")]
            Text { text: String },
            #[serde(rename = "thinking_delta")]
            Thinking { thinking: String },
            #[serde(rename = "signature_delta")]
            Signature {
                #[allow(dead_code)]
                signature: String,
            },
            #[serde(rename = "input_json_delta")]
            InputJson { partial_json: String },
        }

        let Ok(parsed) = serde_json::from_str::<BlockDelta>(data) else {
            return Vec::new();
        };
        match parsed.delta {
            Delta::Text { text } => vec![StreamEvent::ContentDelta { text }],
            Delta::Thinking { thinking } => {
                let reasoning_id = match self.blocks.get(parsed.index) {
                    Some(BlockState::Reasoning { reasoning_id }) => reasoning_id.clone(),
                    _ => None,
                };
                vec![StreamEvent::ThinkingDelta {
                    text: thinking,
                    is_encrypted: false,
                    reasoning_id,
                }]
            }
            Delta::Signature { .. } => Vec::new(),
            Delta::InputJson { partial_json } => {
                self.blocks.append_tool_args(parsed.index, &partial_json);
                let (id_partial, name_partial) = match self.blocks.get(parsed.index) {
                    Some(BlockState::ToolCall { id, name, .. }) => {
                        (Some(id.clone()), Some(name.clone()))
                    }
                    _ => (None, None),
                };
                vec![StreamEvent::ToolCallDelta {
                    index: parsed.index,
                    id_partial,
                    name_partial,
                    args_partial: Some(partial_json),
                }]
            }
        }
    }

    fn on_block_stop(&mut self, data: &str) -> Vec<StreamEvent> {
        #[derive(Deserialize)]
        struct BlockStop {
            index: usize,
        }
        let Ok(parsed) = serde_json::from_str::<BlockStop>(data) else {
            return Vec::new();
        };
        match self.blocks.take(parsed.index) {
            Some(BlockState::ToolCall { id, name, args_buf }) => {
                let trimmed = args_buf.trim();
                let json_str = if trimmed.is_empty() { "{}" } else { trimmed };
                match serde_json::from_str::<Value>(json_str) {
                    Ok(args_json) => vec![StreamEvent::ToolCallComplete { id, name, args_json }],
                    Err(_) => vec![StreamEvent::ToolCallMalformed {
                        id,
                        name,
                        raw_args: args_buf,
                    }],
                }
            }
            _ => Vec::new(),
        }
    }

    fn on_message_delta(&mut self, data: &str) -> Vec<StreamEvent> {
        #[derive(Deserialize)]
        struct MessageDelta {
            delta: Inner,
            #[serde(default)]
            usage: Option<Usage>,
        }
        #[derive(Deserialize)]
        struct Inner {
            #[serde(default)]
            stop_reason: Option<String>,
        }
        #[derive(Deserialize)]
        struct Usage {
            #[serde(default)]
            input_tokens: u32,
            #[serde(default)]
            output_tokens: u32,
        }

        let Ok(parsed) = serde_json::from_str::<MessageDelta>(data) else {
            return Vec::new();
        };
        let mut events = Vec::new();
        if let Some(usage) = parsed.usage {
            self.usage_emitted = true;
            events.push(StreamEvent::Usage {
                input: usage.input_tokens,
                output: usage.output_tokens,
                reasoning: 0,
            });
        }
        if let Some(reason) = parsed.delta.stop_reason {
            events.push(StreamEvent::Done {
                finish_reason: reason,
            });
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(event: &str, data: &str) -> SseFrame {
        SseFrame {
            event: Some(event.to_string()),
            data: data.to_string(),
        }
    }

    #[test]
    fn text_delta_emits_content_delta() {
        let mut p = AnthropicParser::new();
        p.feed(&frame(
            "content_block_start",
            r#"{"index":0,"content_block":{"type":"text","text":""}}"#,
        ));
        let events = p.feed(&frame(
            "content_block_delta",
            r#"{"index":0,"delta":{"type":"text_delta","text":"hi"}}"#,
        ));
        assert_eq!(events, vec![StreamEvent::ContentDelta { text: "hi".into() }]);
    }

    #[test]
    fn thinking_delta_carries_signature_as_reasoning_id() {
        let mut p = AnthropicParser::new();
        p.feed(&frame(
            "content_block_start",
            r#"{"index":0,"content_block":{"type":"thinking","signature":"sig-1"}}"#,
        ));
        let events = p.feed(&frame(
            "content_block_delta",
            r#"{"index":0,"delta":{"type":"thinking_delta","thinking":"pondering"}}"#,
        ));
        assert_eq!(
            events,
            vec![StreamEvent::ThinkingDelta {
                text: "pondering".into(),
                is_encrypted: false,
                reasoning_id: Some("sig-1".into()),
            }]
        );
    }

    #[test]
    fn redacted_thinking_emits_encrypted_marker() {
        let mut p = AnthropicParser::new();
        let events = p.feed(&frame(
            "content_block_start",
            r#"{"index":0,"content_block":{"type":"redacted_thinking","data":"opaque"}}"#,
        ));
        assert_eq!(
            events,
            vec![StreamEvent::ThinkingDelta {
                text: String::new(),
                is_encrypted: true,
                reasoning_id: None,
            }]
        );
    }

    #[test]
    fn tool_use_accumulates_input_json_and_completes_on_stop() {
        let mut p = AnthropicParser::new();
        p.feed(&frame(
            "content_block_start",
            r#"{"index":1,"content_block":{"type":"tool_use","id":"call_1","name":"read"}}"#,
        ));
        p.feed(&frame(
            "content_block_delta",
            r#"{"index":1,"delta":{"type":"input_json_delta","partial_json":"{\"path\":"}}"#,
        ));
        p.feed(&frame(
            "content_block_delta",
            r#"{"index":1,"delta":{"type":"input_json_delta","partial_json":"\"a.rs\"}"}}"#,
        ));
        let events = p.feed(&frame("content_block_stop", r#"{"index":1}"#));
        assert_eq!(
            events,
            vec![StreamEvent::ToolCallComplete {
                id: "call_1".into(),
                name: "read".into(),
                args_json: serde_json::json!({"path": "a.rs"}),
            }]
        );
    }

    #[test]
    fn malformed_tool_json_produces_malformed_event() {
        let mut p = AnthropicParser::new();
        p.feed(&frame(
            "content_block_start",
            r#"{"index":0,"content_block":{"type":"tool_use","id":"c1","name":"bash"}}"#,
        ));
        p.feed(&frame(
            "content_block_delta",
            r#"{"index":0,"delta":{"type":"input_json_delta","partial_json":"{not json"}}"#,
        ));
        let events = p.feed(&frame("content_block_stop", r#"{"index":0}"#));
        match &events[0] {
            StreamEvent::ToolCallMalformed { id, name, raw_args } => {
                assert_eq!(id, "c1");
                assert_eq!(name, "bash");
                assert_eq!(raw_args, "{not json");
            }
            other => panic!("expected malformed event, got {other:?}"),
        }
    }

    #[test]
    fn message_delta_with_usage_emits_usage_then_done() {
        let mut p = AnthropicParser::new();
        let events = p.feed(&frame(
            "message_delta",
            r#"{"delta":{"stop_reason":"end_turn"},"usage":{"input_tokens":10,"output_tokens":5}}"#,
        ));
        assert_eq!(
            events,
            vec![
                StreamEvent::Usage {
                    input: 10,
                    output: 5,
                    reasoning: 0
                },
                StreamEvent::Done {
                    finish_reason: "end_turn".into()
                },
            ]
        );
        assert!(p.usage_emitted);
    }

    #[test]
    fn unknown_event_type_is_ignored() {
        let mut p = AnthropicParser::new();
        let events = p.feed(&frame("ping", r#"{}"#));
        assert!(events.is_empty());
    }
}
