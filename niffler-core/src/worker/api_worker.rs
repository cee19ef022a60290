//! API worker: streams one model turn over HTTP, drives the provider parser,
//! and runs the tool-use loop up to a configured turn bound (spec §4.3).

use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::config::ModelConfig;
use crate::error::StreamParseError;
use crate::message::{Message, Role, ThinkingContent, ToolCall};
use crate::protocol::{ApiRequest, ToolRequest, ToolResponse, ToolResponseKind};
use crate::stream::{ProviderFormat, SseDecoder, StreamEvent, StreamParser};
use crate::tokenizer::estimate_tokens;
use crate::tool_source::ToolSpec;

/// Result of driving one streamed response to completion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TurnOutcome {
    pub content: String,
    pub thinking: Option<ThinkingContent>,
    pub tool_calls: Vec<ToolCall>,
    pub finish_reason: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub reasoning_tokens: u32,
}

const DEFAULT_MAX_TOOL_TURNS: usize = 25;

pub struct ApiWorker {
    http_client: reqwest::Client,
    stream_events: mpsc::Sender<StreamEvent>,
    tool_requests: mpsc::Sender<ToolRequest>,
    max_tool_turns: usize,
}

impl ApiWorker {
    pub fn new(stream_events: mpsc::Sender<StreamEvent>, tool_requests: mpsc::Sender<ToolRequest>) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            stream_events,
            tool_requests,
            max_tool_turns: DEFAULT_MAX_TOOL_TURNS,
        }
    }

    pub fn with_max_tool_turns(mut self, max_tool_turns: usize) -> Self {
        self.max_tool_turns = max_tool_turns;
        self
    }

    /// Builds the provider-appropriate `tools`/`functions` declaration array
    /// from the registry's tool specs (spec §4.2 step 1, §6 wire shape).
    fn tool_declarations(tool_schemas: &[ToolSpec], provider_format: ProviderFormat) -> Vec<Value> {
        tool_schemas
            .iter()
            .map(|t| match provider_format {
                ProviderFormat::Anthropic => {
                    let mut decl = json!({
                        "name": t.name,
                        "input_schema": t.input_schema,
                    });
                    if let Some(description) = &t.description {
                        decl["description"] = json!(description);
                    }
                    decl
                }
                ProviderFormat::OpenAi => json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.input_schema,
                    }
                }),
            })
            .collect()
    }

    /// Serializes one history message in the provider's wire shape, carrying
    /// the assistant's `tool_calls` and the tool message's `tool_call_id`
    /// through so a resubmit round-trips a prior tool call (spec §3
    /// invariant, §6 wire shape) rather than dropping everything but
    /// `content`.
    fn message_to_value(m: &Message, provider_format: ProviderFormat) -> Value {
        match provider_format {
            ProviderFormat::Anthropic => match m.role {
                Role::Tool => json!({
                    "role": "user",
                    "content": [{
                        "type": "tool_result",
                        "tool_use_id": m.tool_call_id.clone().unwrap_or_default(),
                        "content": m.content,
                    }],
                }),
                Role::Assistant if !m.tool_calls.is_empty() => {
                    let mut blocks = Vec::new();
                    if !m.content.is_empty() {
                        blocks.push(json!({"type": "text", "text": m.content}));
                    }
                    for call in &m.tool_calls {
                        blocks.push(json!({
                            "type": "tool_use",
                            "id": call.id,
                            "name": call.name,
                            "input": call.arguments,
                        }));
                    }
                    json!({"role": "assistant", "content": blocks})
                }
                _ => json!({"role": m.role, "content": m.content}),
            },
            ProviderFormat::OpenAi => match m.role {
                Role::Tool => json!({
                    "role": "tool",
                    "tool_call_id": m.tool_call_id.clone().unwrap_or_default(),
                    "content": m.content,
                }),
                Role::Assistant if !m.tool_calls.is_empty() => json!({
                    "role": "assistant",
                    "content": if m.content.is_empty() { Value::Null } else { json!(m.content) },
                    "tool_calls": m.tool_calls.iter().map(|call| json!({
                        "id": call.id,
                        "type": "function",
                        "function": {
                            "name": call.name,
                            "arguments": call.arguments.to_string(),
                        },
                    })).collect::<Vec<_>>(),
                }),
                _ => json!({"role": m.role, "content": m.content}),
            },
        }
    }

    fn build_body(
        model: &ModelConfig,
        messages: &[Message],
        system_prompt: &str,
        tool_schemas: &[ToolSpec],
        provider_format: ProviderFormat,
    ) -> Value {
        let messages_json: Vec<Value> = messages.iter().map(|m| Self::message_to_value(m, provider_format)).collect();
        let mut body = match provider_format {
            ProviderFormat::Anthropic => json!({
                "model": model.model_id,
                "system": system_prompt,
                "messages": messages_json,
                "max_tokens": model.max_tokens,
                "temperature": model.temperature,
                "stream": true,
            }),
            ProviderFormat::OpenAi => {
                let mut openai_messages = vec![json!({"role": "system", "content": system_prompt})];
                openai_messages.extend(messages_json);
                json!({
                    "model": model.model_id,
                    "messages": openai_messages,
                    "max_tokens": model.max_tokens,
                    "temperature": model.temperature,
                    "stream": true,
                })
            }
        };
        if !tool_schemas.is_empty() {
            body["tools"] = Value::Array(Self::tool_declarations(tool_schemas, provider_format));
        }
        body
    }

    /// Sends the HTTP request for one turn and returns the streamed response.
    pub async fn dispatch(
        &self,
        request: &ApiRequest,
        provider_format: ProviderFormat,
    ) -> Result<reqwest::Response, StreamParseError> {
        let api_key = request
            .model
            .api_key()
            .map_err(|e| StreamParseError::Provider(e.to_string()))?;
        let body = Self::build_body(
            &request.model,
            &request.messages,
            &request.mode_system_prompt,
            &request.tool_schemas,
            provider_format,
        );
        self.http_client
            .post(&request.model.base_url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| StreamParseError::Transport(e.to_string()))
    }

    /// Drives a byte-chunk stream to completion, forwarding every
    /// [`StreamEvent`] over `stream_events` as it's produced and
    /// accumulating a [`TurnOutcome`]. Generic over the stream type so tests
    /// can supply canned chunks instead of a live HTTP response.
    pub async fn drive_stream<S>(
        &self,
        mut chunks: S,
        provider_format: ProviderFormat,
    ) -> Result<TurnOutcome, StreamParseError>
    where
        S: Stream<Item = Result<Bytes, reqwest::Error>> + Unpin,
    {
        let mut decoder = SseDecoder::new();
        let mut parser = StreamParser::new(provider_format);
        let mut outcome = TurnOutcome::default();
        let mut reasoning_text = String::new();
        let mut reasoning_id = None;
        let mut is_encrypted = false;
        let mut pending_tool_calls: Vec<ToolCall> = Vec::new();

        while let Some(chunk) = chunks.next().await {
            let chunk = chunk.map_err(|e| StreamParseError::Transport(e.to_string()))?;
            let text = String::from_utf8_lossy(&chunk).to_string();
            for frame in decoder.push(&text) {
                for event in parser.feed(&frame) {
                    let _ = self.stream_events.send(event.clone()).await;
                    match event {
                        StreamEvent::ContentDelta { text } => outcome.content.push_str(&text),
                        StreamEvent::ThinkingDelta { text, is_encrypted: enc, reasoning_id: rid } => {
                            reasoning_text.push_str(&text);
                            is_encrypted = is_encrypted || enc;
                            reasoning_id = reasoning_id.or(rid);
                        }
                        StreamEvent::ToolCallDelta { .. } => {}
                        StreamEvent::ToolCallComplete { id, name, args_json } => {
                            pending_tool_calls.push(ToolCall { id, name, arguments: args_json });
                        }
                        StreamEvent::ToolCallMalformed { id, name, raw_args } => {
                            pending_tool_calls.push(ToolCall {
                                id,
                                name,
                                arguments: json!({ "_malformed_raw_args": raw_args }),
                            });
                        }
                        StreamEvent::Usage { input, output, reasoning } => {
                            outcome.input_tokens = input;
                            outcome.output_tokens = output;
                            outcome.reasoning_tokens = reasoning;
                        }
                        StreamEvent::Done { finish_reason } => {
                            outcome.finish_reason = finish_reason;
                        }
                        StreamEvent::Error { message } => {
                            return Err(StreamParseError::Provider(message));
                        }
                    }
                }
            }
        }

        if !reasoning_text.is_empty() || is_encrypted {
            outcome.thinking = Some(ThinkingContent {
                reasoning_text: if reasoning_text.is_empty() { None } else { Some(reasoning_text) },
                encrypted_reasoning: None,
                reasoning_id,
                provider_meta: None,
                is_encrypted,
            });
        }
        outcome.tool_calls = pending_tool_calls;

        if !parser.usage_emitted() {
            outcome.output_tokens = estimate_tokens(&outcome.content) as u32;
        }

        Ok(outcome)
    }

    /// Dispatches one [`ToolCall`] as a [`ToolRequest`] and waits for the
    /// matching [`ToolResponse`] on `tool_responses`. Assumes serial
    /// execution, matching the fabric's single-consumer mailbox design.
    pub async fn run_tool_call(
        &self,
        tool_call: &ToolCall,
        tool_responses: &mut mpsc::Receiver<ToolResponse>,
    ) -> ToolResponse {
        let request_id = Uuid::new_v4();
        if self
            .tool_requests
            .send(ToolRequest {
                id: request_id,
                name: tool_call.name.clone(),
                args_json: tool_call.arguments.clone(),
                requires_confirmation: false,
            })
            .await
            .is_err()
        {
            return ToolResponse {
                id: request_id,
                kind: ToolResponseKind::Error,
                output_json: None,
                error: Some("tool request channel closed".to_string()),
            };
        }
        tool_responses
            .recv()
            .await
            .unwrap_or(ToolResponse {
                id: request_id,
                kind: ToolResponseKind::Error,
                output_json: None,
                error: Some("tool response channel closed".to_string()),
            })
    }

    pub fn max_tool_turns(&self) -> usize {
        self.max_tool_turns
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn sse_bytes(events: &[(&str, &str)]) -> Vec<Result<Bytes, reqwest::Error>> {
        events
            .iter()
            .map(|(event, data)| Ok(Bytes::from(format!("event: {event}\ndata: {data}\n\n"))))
            .collect()
    }

    #[tokio::test]
    async fn drives_anthropic_stream_to_content_and_done() {
        let (se_tx, mut se_rx) = mpsc::channel(32);
        let (tr_tx, _tr_rx) = mpsc::channel(8);
        let worker = ApiWorker::new(se_tx, tr_tx);

        let chunks = sse_bytes(&[
            ("content_block_start", r#"{"index":0,"content_block":{"type":"text","text":""}}"#),
            ("content_block_delta", r#"{"index":0,"delta":{"type":"text_delta","text":"hello"}}"#),
            ("content_block_stop", r#"{"index":0}"#),
            ("message_delta", r#"{"delta":{"stop_reason":"end_turn"},"usage":{"input_tokens":10,"output_tokens":2}}"#),
            ("message_stop", r#"{}"#),
        ]);
        let outcome = worker
            .drive_stream(stream::iter(chunks), ProviderFormat::Anthropic)
            .await
            .unwrap();

        assert_eq!(outcome.content, "hello");
        assert_eq!(outcome.finish_reason, "end_turn");
        assert_eq!(outcome.input_tokens, 10);
        assert_eq!(outcome.output_tokens, 2);

        drop(worker);
        let mut seen_done = false;
        while let Ok(event) = se_rx.try_recv() {
            if matches!(event, StreamEvent::Done { .. }) {
                seen_done = true;
            }
        }
        assert!(seen_done);
    }

    #[tokio::test]
    async fn missing_usage_falls_back_to_tokenizer_estimate() {
        let (se_tx, _se_rx) = mpsc::channel(32);
        let (tr_tx, _tr_rx) = mpsc::channel(8);
        let worker = ApiWorker::new(se_tx, tr_tx);

        let chunks = sse_bytes(&[
            ("content_block_start", r#"{"index":0,"content_block":{"type":"text","text":""}}"#),
            ("content_block_delta", r#"{"index":0,"delta":{"type":"text_delta","text":"a longer reply here"}}"#),
            ("content_block_stop", r#"{"index":0}"#),
            ("message_stop", r#"{}"#),
        ]);
        let outcome = worker
            .drive_stream(stream::iter(chunks), ProviderFormat::Anthropic)
            .await
            .unwrap();
        assert!(outcome.output_tokens > 0);
    }

    #[tokio::test]
    async fn tool_call_completes_and_is_collected() {
        let (se_tx, _se_rx) = mpsc::channel(32);
        let (tr_tx, _tr_rx) = mpsc::channel(8);
        let worker = ApiWorker::new(se_tx, tr_tx);

        let chunks = sse_bytes(&[
            ("content_block_start", r#"{"index":0,"content_block":{"type":"tool_use","id":"t1","name":"read"}}"#),
            ("content_block_delta", r#"{"index":0,"delta":{"type":"input_json_delta","partial_json":"{\"path\":\"a.txt\"}"}}"#),
            ("content_block_stop", r#"{"index":0}"#),
            ("message_stop", r#"{}"#),
        ]);
        let outcome = worker
            .drive_stream(stream::iter(chunks), ProviderFormat::Anthropic)
            .await
            .unwrap();
        assert_eq!(outcome.tool_calls.len(), 1);
        assert_eq!(outcome.tool_calls[0].name, "read");
    }

    #[tokio::test]
    async fn run_tool_call_sends_request_and_awaits_matching_response() {
        let (se_tx, _se_rx) = mpsc::channel(32);
        let (tr_tx, mut tr_rx) = mpsc::channel(8);
        let worker = ApiWorker::new(se_tx, tr_tx);
        let (resp_tx, mut resp_rx) = mpsc::channel(8);

        let call = ToolCall {
            id: "t1".to_string(),
            name: "read".to_string(),
            arguments: json!({"path": "a.txt"}),
        };

        let handle = tokio::spawn(async move { worker.run_tool_call(&call, &mut resp_rx).await });

        let request = tr_rx.recv().await.unwrap();
        resp_tx
            .send(ToolResponse::result(request.id, json!({"content": "hi"})))
            .await
            .unwrap();

        let response = handle.await.unwrap();
        assert_eq!(response.kind, ToolResponseKind::Result);
    }
}
