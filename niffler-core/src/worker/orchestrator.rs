//! Drives one logical conversation turn end to end: dispatch, stream, run
//! any requested tools, and resubmit until the model stops asking for tools
//! or the turn bound is hit (spec §2 control flow, §4.3 point 8).
//!
//! This is the seam [`crate::tools::task::TaskRunner`] implementations and
//! the CLI's own message loop both drive; neither owns the tool-use loop
//! itself.

use serde_json::Value;
use tokio::sync::mpsc;

use crate::config::ModelConfig;
use crate::error::StreamParseError;
use crate::message::Message;
use crate::protocol::{ApiRequest, ToolResponse, ToolResponseKind};
use crate::stream::ProviderFormat;
use crate::tool_source::ToolSpec;

use super::{ApiWorker, TurnOutcome};

/// Builds the `{error, tool, exitCode?, output?, kind?}` object a `tool`-role
/// message carries for a failed or cancelled call (spec §4.2 step 4, §6 wire
/// shape). `extra` is the `exitCode`/`output`/`kind` fields the tool worker
/// already extracted from the originating [`crate::error::ToolSourceError`],
/// if any.
fn error_object(tool_name: &str, error: Option<String>, extra: Option<Value>) -> Value {
    let mut obj = serde_json::json!({
        "error": error.unwrap_or_else(|| "tool call failed".to_string()),
        "tool": tool_name,
    });
    if let Some(Value::Object(extra)) = extra {
        if let Value::Object(base) = &mut obj {
            base.extend(extra);
        }
    }
    obj
}

/// Cumulative result of possibly-several turns spent satisfying one user
/// request (a turn per round of tool calls, per spec §4.3).
#[derive(Debug, Clone, Default)]
pub struct RunResult {
    pub final_outcome: TurnOutcome,
    pub turns_used: usize,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub total_reasoning_tokens: u64,
}

pub struct TurnRunner {
    api_worker: ApiWorker,
}

impl TurnRunner {
    pub fn new(api_worker: ApiWorker) -> Self {
        Self { api_worker }
    }

    /// Runs turns against `history` (appending every assistant and tool
    /// message produced) until the model's outcome carries no tool calls, or
    /// the worker's configured turn bound is exceeded.
    pub async fn run(
        &self,
        conversation_id: &str,
        model: &ModelConfig,
        mode_system_prompt: &str,
        provider_format: ProviderFormat,
        tool_schemas: &[ToolSpec],
        history: &mut Vec<Message>,
        tool_responses: &mut mpsc::Receiver<ToolResponse>,
    ) -> Result<RunResult, StreamParseError> {
        let mut result = RunResult::default();

        loop {
            let request = ApiRequest {
                conversation_id: conversation_id.to_string(),
                messages: history.clone(),
                model: model.clone(),
                mode_system_prompt: mode_system_prompt.to_string(),
                tool_schemas: tool_schemas.to_vec(),
            };
            let response = self.api_worker.dispatch(&request, provider_format).await?;
            let outcome = self
                .api_worker
                .drive_stream(response.bytes_stream(), provider_format)
                .await?;

            result.turns_used += 1;
            result.total_input_tokens += outcome.input_tokens as u64;
            result.total_output_tokens += outcome.output_tokens as u64;
            result.total_reasoning_tokens += outcome.reasoning_tokens as u64;

            let mut assistant_message =
                Message::assistant(outcome.content.clone(), outcome.tool_calls.clone());
            if let Some(thinking) = outcome.thinking.clone() {
                assistant_message = assistant_message.with_thinking(thinking);
            }
            history.push(assistant_message);

            if outcome.tool_calls.is_empty() {
                result.final_outcome = outcome;
                return Ok(result);
            }

            if result.turns_used >= self.api_worker.max_tool_turns() {
                return Err(StreamParseError::TurnLimitExceeded(
                    self.api_worker.max_tool_turns(),
                ));
            }

            for tool_call in &outcome.tool_calls {
                let response = self.api_worker.run_tool_call(tool_call, tool_responses).await;
                let content = match response.kind {
                    ToolResponseKind::Result => response
                        .output_json
                        .map(|v| v.to_string())
                        .unwrap_or_default(),
                    ToolResponseKind::Ready => String::new(),
                    ToolResponseKind::Error | ToolResponseKind::Cancelled => {
                        error_object(&tool_call.name, response.error, response.output_json).to_string()
                    }
                };
                history.push(Message::tool(tool_call.id.clone(), content));
            }

            result.final_outcome = outcome;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{ThinkingContent, ToolCall};
    use serde_json::json;

    // `run`'s HTTP dispatch needs a live endpoint, so these tests exercise
    // the per-turn bookkeeping it performs around `drive_stream`'s output
    // directly, without going over the network.

    #[test]
    fn run_result_accumulates_token_totals_across_turns() {
        let mut result = RunResult::default();
        for outcome in [
            TurnOutcome { input_tokens: 10, output_tokens: 2, reasoning_tokens: 0, ..Default::default() },
            TurnOutcome { input_tokens: 12, output_tokens: 5, reasoning_tokens: 1, ..Default::default() },
        ] {
            result.turns_used += 1;
            result.total_input_tokens += outcome.input_tokens as u64;
            result.total_output_tokens += outcome.output_tokens as u64;
            result.total_reasoning_tokens += outcome.reasoning_tokens as u64;
            result.final_outcome = outcome;
        }
        assert_eq!(result.turns_used, 2);
        assert_eq!(result.total_input_tokens, 22);
        assert_eq!(result.total_output_tokens, 7);
        assert_eq!(result.total_reasoning_tokens, 1);
    }

    #[test]
    fn assistant_message_carries_thinking_when_present() {
        let outcome = TurnOutcome {
            content: "answer".to_string(),
            thinking: Some(ThinkingContent::plain("because", None)),
            tool_calls: vec![ToolCall {
                id: "t1".to_string(),
                name: "read".to_string(),
                arguments: json!({"path": "a.txt"}),
            }],
            ..Default::default()
        };
        let mut message = Message::assistant(outcome.content.clone(), outcome.tool_calls.clone());
        if let Some(thinking) = outcome.thinking.clone() {
            message = message.with_thinking(thinking);
        }
        assert_eq!(message.content, "answer");
        assert_eq!(message.tool_calls.len(), 1);
        assert!(message.thinking.is_some());
    }

    #[test]
    fn tool_response_kinds_map_to_expected_message_content() {
        let result = ToolResponse::result(uuid::Uuid::new_v4(), json!({"ok": true}));
        let cancelled = ToolResponse::cancelled(uuid::Uuid::new_v4());
        let error = ToolResponse::error(uuid::Uuid::new_v4(), "bad args");

        let content_for = |r: ToolResponse| -> String {
            match r.kind {
                ToolResponseKind::Result => r.output_json.map(|v| v.to_string()).unwrap_or_default(),
                ToolResponseKind::Ready => String::new(),
                ToolResponseKind::Error | ToolResponseKind::Cancelled => {
                    error_object("bash", r.error, r.output_json).to_string()
                }
            }
        };

        assert_eq!(content_for(result), r#"{"ok":true}"#);
        assert_eq!(content_for(cancelled), r#"{"error":"declined by user","tool":"bash"}"#);
        assert_eq!(content_for(error), r#"{"error":"bad args","tool":"bash"}"#);
    }

    #[test]
    fn error_object_merges_structured_exit_code_and_output() {
        let extra = json!({"exitCode": -1, "output": {"stdout": ""}, "kind": "timeout"});
        let obj = error_object("bash", Some("command timed out after 200ms".to_string()), Some(extra));
        assert_eq!(obj["tool"], "bash");
        assert_eq!(obj["exitCode"], -1);
        assert_eq!(obj["kind"], "timeout");
        assert_eq!(obj["output"]["stdout"], "");
    }
}
