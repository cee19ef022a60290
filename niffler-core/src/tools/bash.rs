//! `bash(command, timeout?)` — non-interactive subshell execution with
//! terminate-then-grace-then-kill semantics (spec §4.2, §8 boundary tests).

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::time::timeout as tokio_timeout;

use crate::error::ToolSourceError;
use crate::tool_source::{ToolCallContent, ToolCallContext, ToolSpec};

use super::Tool;

const MIN_TIMEOUT_MS: u64 = 1;
const MAX_TIMEOUT_MS: u64 = 120_000;
const GRACE: Duration = Duration::from_secs(1);

pub struct BashTool;

impl BashTool {
    pub fn new() -> Self {
        Self
    }
}

impl Default for BashTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for BashTool {
    fn name(&self) -> &str {
        "bash"
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "bash".to_string(),
            description: Some("Execute a shell command in a non-interactive subshell.".to_string()),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "command": {"type": "string"},
                    "timeout": {"type": "integer", "description": "Milliseconds, clamped to [1, 120000]"}
                },
                "required": ["command"]
            }),
            requires_confirmation: true,
        }
    }

    async fn call(
        &self,
        args: Value,
        _ctx: Option<&ToolCallContext>,
    ) -> Result<ToolCallContent, ToolSourceError> {
        let command = args
            .get("command")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolSourceError::InvalidInput("missing command".to_string()))?;
        let timeout_ms = args
            .get("timeout")
            .and_then(|v| v.as_u64())
            .unwrap_or(MAX_TIMEOUT_MS)
            .clamp(MIN_TIMEOUT_MS, MAX_TIMEOUT_MS);

        let mut child = Command::new("sh")
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ToolSourceError::Execution(format!("failed to spawn shell: {e}")))?;

        let mut stdout = String::new();
        let mut stderr = String::new();
        if let Some(mut out) = child.stdout.take() {
            let _ = out.read_to_string(&mut stdout).await;
        }
        if let Some(mut err) = child.stderr.take() {
            let _ = err.read_to_string(&mut stderr).await;
        }

        match tokio_timeout(Duration::from_millis(timeout_ms), child.wait()).await {
            Ok(Ok(status)) => {
                let exit_code = status.code().unwrap_or(-1);
                if exit_code != 0 {
                    return Err(ToolSourceError::ExecutionWithOutput {
                        message: format!("command exited with status {exit_code}"),
                        exit_code,
                        output: json!({ "stdout": stdout, "stderr": stderr }),
                    });
                }
                Ok(ToolCallContent::json(&json!({
                    "stdout": stdout,
                    "stderr": stderr,
                    "exitCode": exit_code,
                })))
            }
            Ok(Err(e)) => Err(ToolSourceError::Execution(format!("wait failed: {e}"))),
            Err(_elapsed) => {
                let _ = child.start_kill();
                match tokio_timeout(GRACE, child.wait()).await {
                    Ok(_) => {}
                    Err(_) => {
                        let _ = child.kill().await;
                    }
                }
                Err(ToolSourceError::Timeout {
                    message: format!("command timed out after {timeout_ms}ms"),
                    exit_code: -1,
                    output: json!({ "stdout": stdout, "stderr": stderr }),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn successful_command_returns_stdout_and_exit_zero() {
        let tool = BashTool::new();
        let result = tool
            .call(json!({"command": "echo hi"}), None)
            .await
            .unwrap();
        assert!(result.text.contains("hi"));
        assert!(result.text.contains("\"exitCode\":0"));
    }

    #[tokio::test]
    async fn nonzero_exit_is_execution_error_with_captured_output() {
        let tool = BashTool::new();
        let err = tool
            .call(json!({"command": "echo boom >&2; exit 3"}), None)
            .await
            .unwrap_err();
        match err {
            ToolSourceError::ExecutionWithOutput { exit_code, output, .. } => {
                assert_eq!(exit_code, 3);
                assert!(output["stderr"].as_str().unwrap().contains("boom"));
            }
            other => panic!("expected ExecutionWithOutput, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn timeout_terminates_long_running_command() {
        let tool = BashTool::new();
        let start = std::time::Instant::now();
        let err = tool
            .call(json!({"command": "sleep 10", "timeout": 200}), None)
            .await
            .unwrap_err();
        match err {
            ToolSourceError::Timeout { exit_code, .. } => assert_eq!(exit_code, -1),
            other => panic!("expected Timeout, got {other:?}"),
        }
        assert!(start.elapsed() < Duration::from_secs(2));
    }
}
