//! `glob(pattern, path?)` — filesystem pattern matching (ambient addition,
//! rounding out the file taxonomy alongside `list`/`grep`).

use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::ToolSourceError;
use crate::tool_source::{ToolCallContent, ToolCallContext, ToolSpec};

use super::path::resolve_path_under;
use super::Tool;

pub struct GlobTool {
    root: PathBuf,
}

impl GlobTool {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

#[async_trait]
impl Tool for GlobTool {
    fn name(&self) -> &str {
        "glob"
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "glob".to_string(),
            description: Some("Find files matching a glob pattern.".to_string()),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "pattern": {"type": "string"},
                    "path": {"type": "string"}
                },
                "required": ["pattern"]
            }),
            requires_confirmation: false,
        }
    }

    async fn call(
        &self,
        args: Value,
        _ctx: Option<&ToolCallContext>,
    ) -> Result<ToolCallContent, ToolSourceError> {
        let pattern = args
            .get("pattern")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolSourceError::InvalidInput("missing pattern".to_string()))?;
        let path_param = args.get("path").and_then(|v| v.as_str()).unwrap_or(".");
        let base = resolve_path_under(&self.root, path_param)?;

        let full_pattern = base.join(pattern);
        let full_pattern = full_pattern.to_string_lossy().to_string();

        let mut matches = Vec::new();
        for entry in glob::glob(&full_pattern)
            .map_err(|e| ToolSourceError::InvalidInput(format!("invalid pattern: {e}")))?
        {
            match entry {
                Ok(path) => matches.push(path.display().to_string()),
                Err(_) => continue,
            }
        }
        matches.sort();

        Ok(ToolCallContent::json(&json!({ "matches": matches })))
    }
}
