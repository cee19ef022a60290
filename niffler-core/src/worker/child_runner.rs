//! Concrete [`crate::tools::task::TaskRunner`]: spins up a private channel
//! fabric and tool worker scoped to one agent's allowed-tools whitelist,
//! runs the turn loop unattended (every confirmation auto-approved, since
//! there is no human on the other end of a task child), and folds the
//! result into a [`TaskOutcome`].

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::channels::ChannelFabric;
use crate::config::{ModelConfig, NifflerConfig};
use crate::error::ToolSourceError;
use crate::message::{Message, Role};
use crate::protocol::ConfirmResponse;
use crate::stream::infer_provider_format;
use crate::tools::build_registry;
use crate::tools::task::{AgentDefinition, TaskOutcome, TaskRunner};

use super::{ApiWorker, ToolWorker, TurnRunner};

/// Task children get a tighter turn bound than an interactive conversation;
/// an unsupervised subtask that needs more than this is mis-scoped.
const CHILD_MAX_TOOL_TURNS: usize = 8;

pub struct ChildTaskRunner {
    working_dir: PathBuf,
    config: Arc<NifflerConfig>,
    default_model_nickname: String,
}

impl ChildTaskRunner {
    pub fn new(working_dir: PathBuf, config: Arc<NifflerConfig>, default_model_nickname: String) -> Self {
        Self {
            working_dir,
            config,
            default_model_nickname,
        }
    }

    fn resolve_model(&self, model_nickname: Option<&str>) -> Option<ModelConfig> {
        model_nickname
            .and_then(|n| self.config.model(n))
            .or_else(|| self.config.model(&self.default_model_nickname))
            .cloned()
    }
}

#[async_trait]
impl TaskRunner for ChildTaskRunner {
    async fn run_child(
        &self,
        agent: &AgentDefinition,
        description: &str,
        model_nickname: Option<&str>,
    ) -> Result<TaskOutcome, ToolSourceError> {
        let Some(model) = self.resolve_model(model_nickname) else {
            return Ok(TaskOutcome {
                success: false,
                summary: String::new(),
                artifacts: vec![],
                tool_calls: 0,
                tokens_used: 0,
                error: Some(format!(
                    "no configured model for nickname {:?} (default {:?})",
                    model_nickname, self.default_model_nickname
                )),
            });
        };
        let provider_format = infer_provider_format(&model);

        let fabric = ChannelFabric::new();
        let (cli, api_ep, tool_ep, _api_req_rx, _stream_rx, tool_req_rx, mut tool_resp_rx, mut confirm_req_rx, confirm_resp_rx, _shutdown) =
            fabric.split();

        let registry = build_registry(&self.working_dir, Some(&agent.allowed_tools), None, None).await;
        let tool_schemas = registry.list().await;
        let mut tool_worker = ToolWorker::new(
            registry,
            tool_req_rx,
            tool_ep.tool_responses,
            tool_ep.confirm_requests,
            confirm_resp_rx,
        );
        tokio::spawn(async move {
            tool_worker.run(|| None).await;
        });

        let auto_approve = cli.confirm_responses.clone();
        tokio::spawn(async move {
            while let Some(request) = confirm_req_rx.recv().await {
                let _ = auto_approve
                    .send(ConfirmResponse {
                        id: request.id,
                        approved: true,
                    })
                    .await;
            }
        });

        let api_worker =
            ApiWorker::new(api_ep.stream_events, api_ep.tool_requests).with_max_tool_turns(CHILD_MAX_TOOL_TURNS);
        let turn_runner = TurnRunner::new(api_worker);
        let mut history = vec![Message::user(description)];
        let conversation_id = format!("task:{}", Uuid::new_v4());

        match turn_runner
            .run(
                &conversation_id,
                &model,
                &agent.system_prompt,
                provider_format,
                &tool_schemas,
                &mut history,
                &mut tool_resp_rx,
            )
            .await
        {
            Ok(result) => {
                let tool_calls = history
                    .iter()
                    .filter(|m| m.role == Role::Assistant)
                    .map(|m| m.tool_calls.len() as u32)
                    .sum();
                Ok(TaskOutcome {
                    success: true,
                    summary: result.final_outcome.content,
                    artifacts: vec![],
                    tool_calls,
                    tokens_used: result.total_input_tokens + result.total_output_tokens + result.total_reasoning_tokens,
                    error: None,
                })
            }
            Err(e) => Ok(TaskOutcome {
                success: false,
                summary: String::new(),
                artifacts: vec![],
                tool_calls: 0,
                tokens_used: 0,
                error: Some(e.to_string()),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_model_falls_back_to_default_nickname() {
        let mut config = NifflerConfig::default();
        config.models.push(ModelConfig::default_for_test());
        let runner = ChildTaskRunner::new(
            PathBuf::from("."),
            Arc::new(config),
            "test-model".to_string(),
        );
        assert!(runner.resolve_model(None).is_some());
        // Unknown nickname still resolves via the default fallback.
        assert_eq!(runner.resolve_model(Some("ghost")).unwrap().nickname, "test-model");
    }
}
