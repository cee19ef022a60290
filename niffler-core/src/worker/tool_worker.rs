//! Tool worker: the 5-step `execute(ToolRequest) -> ToolResponse` algorithm
//! (spec §4.2): lookup, schema validation, confirmation gating, dispatch,
//! respond-with-original-id.

use tokio::sync::mpsc;

use crate::protocol::{ConfirmRequest, ConfirmResponse, ToolRequest, ToolResponse};
use crate::tool_source::{ToolCallContext, ToolSpec};
use crate::tools::ToolRegistryLocked;

pub struct ToolWorker {
    registry: ToolRegistryLocked,
    tool_requests: mpsc::Receiver<ToolRequest>,
    tool_responses: mpsc::Sender<ToolResponse>,
    confirm_requests: mpsc::Sender<ConfirmRequest>,
    confirm_responses: mpsc::Receiver<ConfirmResponse>,
}

/// Checks that every name in the schema's top-level `required` array is
/// present in `args`. This is a presence check, not full JSON Schema
/// validation (spec §4.2 step 2 names only missing-required-field rejection
/// as the required behavior).
fn validate_required(spec: &ToolSpec, args: &serde_json::Value) -> Result<(), String> {
    let Some(required) = spec.input_schema.get("required").and_then(|v| v.as_array()) else {
        return Ok(());
    };
    for name in required {
        let Some(name) = name.as_str() else { continue };
        if args.get(name).is_none() {
            return Err(format!("missing required argument: {name}"));
        }
    }
    Ok(())
}

impl ToolWorker {
    pub fn new(
        registry: ToolRegistryLocked,
        tool_requests: mpsc::Receiver<ToolRequest>,
        tool_responses: mpsc::Sender<ToolResponse>,
        confirm_requests: mpsc::Sender<ConfirmRequest>,
        confirm_responses: mpsc::Receiver<ConfirmResponse>,
    ) -> Self {
        Self {
            registry,
            tool_requests,
            tool_responses,
            confirm_requests,
            confirm_responses,
        }
    }

    /// Runs the 5-step algorithm for one request, given the conversation's
    /// current plan-mode context.
    pub async fn execute_one(&mut self, request: ToolRequest, ctx: Option<&ToolCallContext>) -> ToolResponse {
        let specs = self.registry.list().await;
        let Some(spec) = specs.into_iter().find(|s| s.name == request.name) else {
            return ToolResponse::error(request.id, format!("tool not found: {}", request.name));
        };

        if let Err(message) = validate_required(&spec, &request.args_json) {
            return ToolResponse::error(request.id, message);
        }

        if spec.requires_confirmation {
            let summary = format!("run `{}` with {}", request.name, request.args_json);
            if self
                .confirm_requests
                .send(ConfirmRequest {
                    id: request.id,
                    tool_name: request.name.clone(),
                    summary,
                })
                .await
                .is_err()
            {
                return ToolResponse::error(request.id, "confirmation channel closed");
            }
            match self.confirm_responses.recv().await {
                Some(response) if response.id == request.id && response.approved => {}
                Some(_) => return ToolResponse::cancelled(request.id),
                None => return ToolResponse::error(request.id, "confirmation channel closed"),
            }
        }

        match self
            .registry
            .call(&request.name, request.args_json.clone(), ctx)
            .await
        {
            Ok(content) => match serde_json::from_str(&content.text) {
                Ok(value) => ToolResponse::result(request.id, value),
                Err(_) => ToolResponse::result(request.id, serde_json::json!({ "text": content.text })),
            },
            Err(e) => {
                let mut response = ToolResponse::error(request.id, e.to_string());
                let (exit_code, output, kind) = e.structured_fields();
                if exit_code.is_some() || output.is_some() || kind.is_some() {
                    let mut extra = serde_json::Map::new();
                    if let Some(exit_code) = exit_code {
                        extra.insert("exitCode".to_string(), serde_json::json!(exit_code));
                    }
                    if let Some(output) = output {
                        extra.insert("output".to_string(), output);
                    }
                    if let Some(kind) = kind {
                        extra.insert("kind".to_string(), serde_json::json!(kind));
                    }
                    response.output_json = Some(serde_json::Value::Object(extra));
                }
                response
            }
        }
    }

    /// Drains `tool_requests` until the channel closes, executing each
    /// request serially (so `confirm_responses` stays correlated by simple
    /// FIFO `recv`, per the fabric's single-consumer mailbox design).
    pub async fn run(&mut self, mut ctx_for: impl FnMut() -> Option<ToolCallContext>) {
        while let Some(request) = self.tool_requests.recv().await {
            let ctx = ctx_for();
            let response = self.execute_one(request, ctx.as_ref()).await;
            if self.tool_responses.send(response).await.is_err() {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool_source::{ToolCallContent, ToolSourceError};
    use crate::tools::Tool;
    use async_trait::async_trait;
    use serde_json::json;
    use uuid::Uuid;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn spec(&self) -> ToolSpec {
            ToolSpec {
                name: "echo".to_string(),
                description: None,
                input_schema: json!({"type": "object", "properties": {"text": {"type": "string"}}, "required": ["text"]}),
                requires_confirmation: false,
            }
        }
        async fn call(&self, args: serde_json::Value, _ctx: Option<&ToolCallContext>) -> Result<ToolCallContent, ToolSourceError> {
            Ok(ToolCallContent::json(&json!({ "echoed": args["text"] })))
        }
    }

    fn build_worker() -> (ToolWorker, mpsc::Sender<ToolRequest>, mpsc::Receiver<ToolResponse>, mpsc::Receiver<ConfirmRequest>, mpsc::Sender<ConfirmResponse>) {
        let registry = ToolRegistryLocked::new();
        let (req_tx, req_rx) = mpsc::channel(8);
        let (resp_tx, resp_rx) = mpsc::channel(8);
        let (confirm_req_tx, confirm_req_rx) = mpsc::channel(8);
        let (confirm_resp_tx, confirm_resp_rx) = mpsc::channel(8);
        let worker = ToolWorker::new(registry, req_rx, resp_tx, confirm_req_tx, confirm_resp_rx);
        (worker, req_tx, resp_rx, confirm_req_rx, confirm_resp_tx)
    }

    #[tokio::test]
    async fn missing_required_argument_is_rejected_before_dispatch() {
        let (mut worker, _req_tx, _resp_rx, _confirm_req_rx, _confirm_resp_tx) = build_worker();
        worker.registry.register(Box::new(EchoTool)).await;
        let response = worker
            .execute_one(
                ToolRequest {
                    id: Uuid::new_v4(),
                    name: "echo".to_string(),
                    args_json: json!({}),
                    requires_confirmation: false,
                },
                None,
            )
            .await;
        assert!(response.error.unwrap().contains("missing required argument"));
    }

    #[tokio::test]
    async fn unknown_tool_is_reported_as_not_found() {
        let (mut worker, _req_tx, _resp_rx, _confirm_req_rx, _confirm_resp_tx) = build_worker();
        let response = worker
            .execute_one(
                ToolRequest {
                    id: Uuid::new_v4(),
                    name: "ghost".to_string(),
                    args_json: json!({}),
                    requires_confirmation: false,
                },
                None,
            )
            .await;
        assert!(response.error.unwrap().contains("not found"));
    }

    #[tokio::test]
    async fn successful_call_returns_original_request_id() {
        let (mut worker, _req_tx, _resp_rx, _confirm_req_rx, _confirm_resp_tx) = build_worker();
        worker.registry.register(Box::new(EchoTool)).await;
        let id = Uuid::new_v4();
        let response = worker
            .execute_one(
                ToolRequest {
                    id,
                    name: "echo".to_string(),
                    args_json: json!({"text": "hi"}),
                    requires_confirmation: false,
                },
                None,
            )
            .await;
        assert_eq!(response.id, id);
        assert!(response.output_json.unwrap()["echoed"] == "hi");
    }

    struct ConfirmedTool;

    #[async_trait]
    impl Tool for ConfirmedTool {
        fn name(&self) -> &str {
            "danger"
        }
        fn spec(&self) -> ToolSpec {
            ToolSpec {
                name: "danger".to_string(),
                description: None,
                input_schema: json!({"type": "object", "properties": {}}),
                requires_confirmation: true,
            }
        }
        async fn call(&self, _args: serde_json::Value, _ctx: Option<&ToolCallContext>) -> Result<ToolCallContent, ToolSourceError> {
            Ok(ToolCallContent::json(&json!({"ran": true})))
        }
    }

    #[tokio::test]
    async fn confirmation_is_driven_by_the_tool_spec_not_the_request_flag() {
        let (mut worker, _req_tx, _resp_rx, mut confirm_req_rx, confirm_resp_tx) = build_worker();
        worker.registry.register(Box::new(ConfirmedTool)).await;
        let id = Uuid::new_v4();

        let request = ToolRequest {
            id,
            name: "danger".to_string(),
            args_json: json!({}),
            requires_confirmation: false,
        };

        let handle = tokio::spawn(async move { worker.execute_one(request, None).await });

        let confirm_request = confirm_req_rx.recv().await.unwrap();
        assert_eq!(confirm_request.id, id);
        confirm_resp_tx.send(ConfirmResponse { id, approved: true }).await.unwrap();

        let response = handle.await.unwrap();
        assert_eq!(response.kind, crate::protocol::ToolResponseKind::Result);
    }

    #[tokio::test]
    async fn declined_confirmation_yields_cancelled_response() {
        let (mut worker, _req_tx, _resp_rx, mut confirm_req_rx, confirm_resp_tx) = build_worker();
        worker.registry.register(Box::new(EchoTool)).await;
        let id = Uuid::new_v4();

        let request = ToolRequest {
            id,
            name: "echo".to_string(),
            args_json: json!({"text": "hi"}),
            requires_confirmation: true,
        };

        let handle = tokio::spawn(async move {
            worker.execute_one(request, None).await
        });

        let confirm_request = confirm_req_rx.recv().await.unwrap();
        assert_eq!(confirm_request.id, id);
        confirm_resp_tx
            .send(ConfirmResponse { id, approved: false })
            .await
            .unwrap();

        let response = handle.await.unwrap();
        assert_eq!(response.kind, crate::protocol::ToolResponseKind::Cancelled);
    }
}
