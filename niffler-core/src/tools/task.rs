//! `task(agentName, description, modelNickname?, complexity?)` (spec §4.2,
//! §2 AgentDefinition). Spawns a restricted child conversation via a
//! [`TaskRunner`] implemented by the worker module; this tool owns agent
//! definition parsing, whitelist enforcement, and recursion prevention
//! (spec §9: a task-child must never itself expose `task`).

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};

use crate::error::ToolSourceError;
use crate::tool_source::{ToolCallContent, ToolCallContext, ToolSpec};

use super::Tool;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentDefinition {
    pub name: String,
    pub description: String,
    pub allowed_tools: HashSet<String>,
    pub system_prompt: String,
}

fn section_body<'a>(markdown: &'a str, heading: &str) -> Option<&'a str> {
    let start = markdown.find(heading)? + heading.len();
    let rest = &markdown[start..];
    let end = rest
        .match_indices("\n## ")
        .map(|(i, _)| i)
        .next()
        .unwrap_or(rest.len());
    Some(rest[..end].trim())
}

/// Parses an agent definition markdown file with three required sections:
/// `## Description`, `## Allowed Tools`, `## System Prompt`.
pub fn parse_agent_definition(name: &str, markdown: &str) -> Result<AgentDefinition, ToolSourceError> {
    let description = section_body(markdown, "## Description")
        .ok_or_else(|| ToolSourceError::InvalidInput("missing Description section".to_string()))?
        .to_string();
    let tools_body = section_body(markdown, "## Allowed Tools")
        .ok_or_else(|| ToolSourceError::InvalidInput("missing Allowed Tools section".to_string()))?;
    let system_prompt = section_body(markdown, "## System Prompt")
        .ok_or_else(|| ToolSourceError::InvalidInput("missing System Prompt section".to_string()))?
        .to_string();

    let mut allowed_tools: HashSet<String> = tools_body
        .lines()
        .map(|l| l.trim().trim_start_matches('-').trim())
        .filter(|l| !l.is_empty())
        .map(|l| l.to_string())
        .collect();
    // Forbid recursive task-tool exposure regardless of what the file says.
    allowed_tools.remove("task");

    Ok(AgentDefinition {
        name: name.to_string(),
        description,
        allowed_tools,
        system_prompt,
    })
}

fn load_agent_definition(agents_dir: &Path, name: &str) -> Result<AgentDefinition, ToolSourceError> {
    let path = agents_dir.join(format!("{name}.md"));
    let markdown = std::fs::read_to_string(&path).map_err(|_| {
        ToolSourceError::NotFound(format!("agent definition not found: {}", path.display()))
    })?;
    parse_agent_definition(name, &markdown)
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskOutcome {
    pub success: bool,
    pub summary: String,
    pub artifacts: Vec<String>,
    pub tool_calls: u32,
    pub tokens_used: u64,
    pub error: Option<String>,
}

/// Implemented by the worker module: runs a restricted child conversation
/// through the same API-worker loop, then produces a final "summarize your
/// work" turn before returning.
#[async_trait]
pub trait TaskRunner: Send + Sync {
    async fn run_child(
        &self,
        agent: &AgentDefinition,
        description: &str,
        model_nickname: Option<&str>,
    ) -> Result<TaskOutcome, ToolSourceError>;
}

pub struct TaskTool {
    agents_dir: PathBuf,
    runner: Arc<dyn TaskRunner>,
}

impl TaskTool {
    pub fn new(agents_dir: PathBuf, runner: Arc<dyn TaskRunner>) -> Self {
        Self { agents_dir, runner }
    }
}

#[async_trait]
impl Tool for TaskTool {
    fn name(&self) -> &str {
        "task"
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "task".to_string(),
            description: Some(
                "Spawn a restricted child conversation to carry out a focused subtask."
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "agentName": {"type": "string"},
                    "description": {"type": "string"},
                    "modelNickname": {"type": "string"},
                    "complexity": {"type": "string", "enum": ["low", "medium", "high"]}
                },
                "required": ["agentName", "description"]
            }),
            requires_confirmation: false,
        }
    }

    async fn call(
        &self,
        args: Value,
        _ctx: Option<&ToolCallContext>,
    ) -> Result<ToolCallContent, ToolSourceError> {
        let agent_name = args
            .get("agentName")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolSourceError::InvalidInput("missing agentName".to_string()))?;
        let description = args
            .get("description")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolSourceError::InvalidInput("missing description".to_string()))?;
        let model_nickname = args.get("modelNickname").and_then(|v| v.as_str());

        let agent = load_agent_definition(&self.agents_dir, agent_name)?;
        let outcome = self
            .runner
            .run_child(&agent, description, model_nickname)
            .await?;

        Ok(ToolCallContent::json(&json!({
            "success": outcome.success,
            "summary": outcome.summary,
            "artifacts": outcome.artifacts,
            "toolCalls": outcome.tool_calls,
            "tokensUsed": outcome.tokens_used,
            "error": outcome.error,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const SAMPLE_AGENT: &str = "# Reviewer\n\n## Description\nReviews code for bugs.\n\n## Allowed Tools\n- read\n- grep\n- task\n\n## System Prompt\nYou are a careful reviewer.\n";

    #[test]
    fn parses_three_required_sections() {
        let agent = parse_agent_definition("reviewer", SAMPLE_AGENT).unwrap();
        assert_eq!(agent.description, "Reviews code for bugs.");
        assert!(agent.allowed_tools.contains("read"));
        assert_eq!(agent.system_prompt, "You are a careful reviewer.");
    }

    #[test]
    fn task_tool_is_stripped_from_allowed_tools_even_if_listed() {
        let agent = parse_agent_definition("reviewer", SAMPLE_AGENT).unwrap();
        assert!(!agent.allowed_tools.contains("task"));
    }

    #[test]
    fn missing_section_is_invalid_input() {
        let err = parse_agent_definition("x", "## Description\nonly this\n").unwrap_err();
        assert!(matches!(err, ToolSourceError::InvalidInput(_)));
    }

    struct FakeRunner;

    #[async_trait]
    impl TaskRunner for FakeRunner {
        async fn run_child(
            &self,
            _agent: &AgentDefinition,
            description: &str,
            _model_nickname: Option<&str>,
        ) -> Result<TaskOutcome, ToolSourceError> {
            Ok(TaskOutcome {
                success: true,
                summary: format!("did: {description}"),
                artifacts: vec![],
                tool_calls: 2,
                tokens_used: 500,
                error: None,
            })
        }
    }

    #[tokio::test]
    async fn task_tool_loads_agent_and_delegates_to_runner() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("reviewer.md"), SAMPLE_AGENT).unwrap();
        let tool = TaskTool::new(dir.path().to_path_buf(), Arc::new(FakeRunner));
        let result = tool
            .call(
                json!({"agentName": "reviewer", "description": "check auth.rs"}),
                None,
            )
            .await
            .unwrap();
        assert!(result.text.contains("did: check auth.rs"));
    }

    #[tokio::test]
    async fn unknown_agent_name_is_not_found() {
        let dir = tempdir().unwrap();
        let tool = TaskTool::new(dir.path().to_path_buf(), Arc::new(FakeRunner));
        let err = tool
            .call(json!({"agentName": "ghost", "description": "x"}), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolSourceError::NotFound(_)));
    }
}
