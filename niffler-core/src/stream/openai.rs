//! OpenAI-compatible `choices[].delta` parsing, including the
//! `reasoning_content` field some OpenAI-compatible providers send and an
//! inline `<think>...</think>` sub-state machine for providers that instead
//! interleave reasoning as literal tags inside the `content` text (spec §4.3
//! point 5, §8 seed scenario 4).

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;

use super::event::StreamEvent;
use super::sse::SseFrame;

const OPEN_TAG: &str = "<think>";
const CLOSE_TAG: &str = "</think>";

/// Straddles raw text chunks looking for `<think>...</think>` spans, even
/// when a tag's characters are split across two chunks. Only active when the
/// provider has no dedicated `reasoning_content` field.
#[derive(Debug, Default)]
struct InlineThinkScanner {
    state: InlineThinkStateOpt,
    /// Characters tentatively consumed while matching a partial tag.
    pending: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InlineThinkStateOpt {
    Outside,
    Inside,
}

impl Default for InlineThinkStateOpt {
    fn default() -> Self {
        InlineThinkStateOpt::Outside
    }
}

impl InlineThinkScanner {
    fn new() -> Self {
        Self::default()
    }

    /// Feeds a raw text fragment, returning `(content_text, thinking_text)`
    /// accumulated from this fragment. Either half may be empty.
    fn feed(&mut self, fragment: &str) -> (String, String) {
        let mut content = String::new();
        let mut thinking = String::new();
        let mut input = format!("{}{}", std::mem::take(&mut self.pending), fragment);

        loop {
            let needle = match self.state {
                InlineThinkStateOpt::Outside => OPEN_TAG,
                InlineThinkStateOpt::Inside => CLOSE_TAG,
            };
            match input.find(needle) {
                Some(pos) => {
                    let (before, after) = input.split_at(pos);
                    match self.state {
                        InlineThinkStateOpt::Outside => content.push_str(before),
                        InlineThinkStateOpt::Inside => thinking.push_str(before),
                    }
                    input = after[needle.len()..].to_string();
                    self.state = match self.state {
                        InlineThinkStateOpt::Outside => InlineThinkStateOpt::Inside,
                        InlineThinkStateOpt::Inside => InlineThinkStateOpt::Outside,
                    };
                }
                None => {
                    // No full tag remains. Check whether the tail of `input`
                    // is a prefix of the needle we're looking for — if so,
                    // hold it back in case the rest arrives in the next
                    // chunk.
                    let hold = longest_partial_match(&input, needle);
                    let split_at = input.len() - hold;
                    let (emit, pend) = input.split_at(split_at);
                    match self.state {
                        InlineThinkStateOpt::Outside => content.push_str(emit),
                        InlineThinkStateOpt::Inside => thinking.push_str(emit),
                    }
                    self.pending = pend.to_string();
                    break;
                }
            }
        }
        (content, thinking)
    }
}

/// Returns the length of the longest suffix of `haystack` that is a proper
/// prefix of `needle` (0 if none), used to detect a tag split across chunks.
fn longest_partial_match(haystack: &str, needle: &str) -> usize {
    let max = needle.len().saturating_sub(1).min(haystack.len());
    for len in (1..=max).rev() {
        let suffix = &haystack[haystack.len() - len..];
        if needle.starts_with(suffix) {
            return len;
        }
    }
    0
}

#[derive(Default)]
pub struct OpenAiParser {
    /// Per-choice-index inline-think scanners, since a provider could in
    /// principle stream multiple choices (we only act on index 0 upstream,
    /// but track all to stay robust).
    scanners: HashMap<usize, InlineThinkScanner>,
    /// Per tool-call-index accumulated argument JSON text, since OpenAI
    /// streams `tool_calls[].function.arguments` piecewise without ever
    /// sending a block-stop event — completion is inferred from
    /// `finish_reason`.
    tool_args: HashMap<usize, (String, String, String)>,
    pub usage_emitted: bool,
}

impl OpenAiParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, frame: &SseFrame) -> Vec<StreamEvent> {
        let data = frame.data.trim();
        if data.is_empty() {
            return Vec::new();
        }
        if data == "[DONE]" {
            return self.flush_pending_tool_calls("stop");
        }

        #[derive(Deserialize)]
        struct Chunk {
            #[serde(default)]
            choices: Vec<Choice>,
            #[serde(default)]
            usage: Option<UsageField>,
        }
        #[derive(Deserialize)]
        struct Choice {
            index: usize,
            #[serde(default)]
            delta: Delta,
            #[serde(default)]
            finish_reason: Option<String>,
        }
        #[derive(Deserialize, Default)]
        struct Delta {
            #[serde(default)]
            content: Option<String>,
            #[serde(default)]
            reasoning_content: Option<String>,
            #[serde(default)]
            tool_calls: Vec<ToolCallDelta>,
        }
        #[derive(Deserialize)]
        struct ToolCallDelta {
            index: usize,
            #[serde(default)]
            id: Option<String>,
            #[serde(default)]
            function: Option<FunctionDelta>,
        }
        #[derive(Deserialize)]
        struct FunctionDelta {
            #[serde(default)]
            name: Option<String>,
            #[serde(default)]
            arguments: Option<String>,
        }
        #[derive(Deserialize)]
        struct UsageField {
            #[serde(default)]
            prompt_tokens: u32,
            #[serde(default)]
            completion_tokens: u32,
            #[serde(default)]
            completion_tokens_details: Option<CompletionTokensDetails>,
        }
        #[derive(Deserialize)]
        struct CompletionTokensDetails {
            #[serde(default)]
            reasoning_tokens: u32,
        }

        let Ok(parsed) = serde_json::from_str::<Chunk>(data) else {
            return Vec::new();
        };

        let mut events = Vec::new();

        for choice in parsed.choices {
            if let Some(reasoning) = choice.delta.reasoning_content {
                if !reasoning.is_empty() {
                    events.push(StreamEvent::ThinkingDelta {
                        text: reasoning,
                        is_encrypted: false,
                        reasoning_id: None,
                    });
                }
            } else if let Some(content) = &choice.delta.content {
                let scanner = self.scanners.entry(choice.index).or_insert_with(InlineThinkScanner::new);
                let (text, thinking) = scanner.feed(content);
                if !text.is_empty() {
                    events.push(StreamEvent::ContentDelta { text });
                }
                if !thinking.is_empty() {
                    events.push(StreamEvent::ThinkingDelta {
                        text: thinking,
                        is_encrypted: false,
                        reasoning_id: None,
                    });
                }
            }

            for tc in choice.delta.tool_calls {
                let entry = self
                    .tool_args
                    .entry(tc.index)
                    .or_insert_with(|| (String::new(), String::new(), String::new()));
                if let Some(id) = tc.id {
                    entry.0 = id;
                }
                if let Some(function) = tc.function {
                    if let Some(name) = function.name {
                        entry.1 = name;
                    }
                    if let Some(args) = function.arguments {
                        entry.2.push_str(&args);
                        events.push(StreamEvent::ToolCallDelta {
                            index: tc.index,
                            id_partial: Some(entry.0.clone()),
                            name_partial: Some(entry.1.clone()),
                            args_partial: Some(args),
                        });
                    }
                }
            }

            if let Some(reason) = choice.finish_reason {
                events.extend(self.flush_pending_tool_calls(&reason));
                events.push(StreamEvent::Done {
                    finish_reason: reason,
                });
            }
        }

        if let Some(usage) = parsed.usage {
            self.usage_emitted = true;
            events.push(StreamEvent::Usage {
                input: usage.prompt_tokens,
                output: usage.completion_tokens,
                reasoning: usage
                    .completion_tokens_details
                    .map(|d| d.reasoning_tokens)
                    .unwrap_or(0),
            });
        }

        events
    }

    fn flush_pending_tool_calls(&mut self, _reason: &str) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        for (_, (id, name, args_buf)) in self.tool_args.drain() {
            if id.is_empty() && name.is_empty() {
                continue;
            }
            let trimmed = args_buf.trim();
            let json_str = if trimmed.is_empty() { "{}" } else { trimmed };
            match serde_json::from_str::<Value>(json_str) {
                Ok(args_json) => events.push(StreamEvent::ToolCallComplete { id, name, args_json }),
                Err(_) => events.push(StreamEvent::ToolCallMalformed {
                    id,
                    name,
                    raw_args: args_buf,
                }),
            }
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(data: &str) -> SseFrame {
        SseFrame {
            event: None,
            data: data.to_string(),
        }
    }

    #[test]
    fn plain_content_delta_passes_through() {
        let mut p = OpenAiParser::new();
        let events = p.feed(&frame(
            r#"{"choices":[{"index":0,"delta":{"content":"hello"}}]}"#,
        ));
        assert_eq!(events, vec![StreamEvent::ContentDelta { text: "hello".into() }]);
    }

    #[test]
    fn reasoning_content_field_becomes_thinking_delta() {
        let mut p = OpenAiParser::new();
        let events = p.feed(&frame(
            r#"{"choices":[{"index":0,"delta":{"reasoning_content":"pondering"}}]}"#,
        ));
        assert_eq!(
            events,
            vec![StreamEvent::ThinkingDelta {
                text: "pondering".into(),
                is_encrypted: false,
                reasoning_id: None,
            }]
        );
    }

    #[test]
    fn inline_think_tag_split_across_three_chunks() {
        let mut p = OpenAiParser::new();
        let mut content = String::new();
        let mut thinking = String::new();
        for chunk in ["a<thi", "nk>secret</thin", "k>b"] {
            let payload = serde_json::json!({
                "choices": [{"index": 0, "delta": {"content": chunk}}]
            })
            .to_string();
            for event in p.feed(&frame(&payload)) {
                match event {
                    StreamEvent::ContentDelta { text } => content.push_str(&text),
                    StreamEvent::ThinkingDelta { text, .. } => thinking.push_str(&text),
                    _ => {}
                }
            }
        }
        assert_eq!(content, "ab");
        assert_eq!(thinking, "secret");
    }

    #[test]
    fn tool_call_arguments_accumulate_until_finish_reason() {
        let mut p = OpenAiParser::new();
        p.feed(&frame(
            r#"{"choices":[{"index":0,"delta":{"tool_calls":[{"index":0,"id":"call_1","function":{"name":"read","arguments":"{\"path\":"}}]}}]}"#,
        ));
        let events = p.feed(&frame(
            r#"{"choices":[{"index":0,"delta":{"tool_calls":[{"index":0,"function":{"arguments":"\"a.rs\"}"}}]}},"finish_reason":"tool_calls"}]}"#,
        ));
        let has_complete = events.iter().any(|e| {
            matches!(e, StreamEvent::ToolCallComplete { id, name, args_json }
                if id == "call_1" && name == "read" && *args_json == serde_json::json!({"path": "a.rs"}))
        });
        assert!(has_complete, "expected a ToolCallComplete in {events:?}");
    }

    #[test]
    fn usage_with_reasoning_tokens_is_captured() {
        let mut p = OpenAiParser::new();
        let events = p.feed(&frame(
            r#"{"choices":[],"usage":{"prompt_tokens":3,"completion_tokens":7,"completion_tokens_details":{"reasoning_tokens":2}}}"#,
        ));
        assert_eq!(
            events,
            vec![StreamEvent::Usage {
                input: 3,
                output: 7,
                reasoning: 2
            }]
        );
        assert!(p.usage_emitted);
    }

    #[test]
    fn done_sentinel_flushes_without_panicking() {
        let mut p = OpenAiParser::new();
        let events = p.feed(&frame("[DONE]"));
        assert!(events.is_empty());
    }
}
