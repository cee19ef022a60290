//! `create`, `move`, and `delete` tools. `create` carries plan-mode
//! `createdFiles` tracking (spec §4.2, §4.5); `move`/`delete` are ambient
//! additions alongside `glob`/`grep` rounding out a complete file taxonomy.

use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::ToolSourceError;
use crate::tool_source::{ToolCallContent, ToolCallContext, ToolSpec};

use super::path::{relative_to, resolve_path_under};
use super::Tool;

pub struct CreateTool {
    root: PathBuf,
}

impl CreateTool {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

#[async_trait]
impl Tool for CreateTool {
    fn name(&self) -> &str {
        "create"
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "create".to_string(),
            description: Some("Create a new file with the given content.".to_string()),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "path": {"type": "string"},
                    "content": {"type": "string"},
                    "overwrite": {"type": "boolean"},
                    "createDirs": {"type": "boolean"},
                },
                "required": ["path", "content"]
            }),
            requires_confirmation: true,
        }
    }

    async fn call(
        &self,
        args: Value,
        _ctx: Option<&ToolCallContext>,
    ) -> Result<ToolCallContent, ToolSourceError> {
        let path_param = args
            .get("path")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolSourceError::InvalidInput("missing path".to_string()))?;
        let content = args
            .get("content")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolSourceError::InvalidInput("missing content".to_string()))?;
        let overwrite = args.get("overwrite").and_then(|v| v.as_bool()).unwrap_or(false);
        let create_dirs = args
            .get("createDirs")
            .and_then(|v| v.as_bool())
            .unwrap_or(true);

        let path = resolve_path_under(&self.root, path_param)?;
        if path.exists() && !overwrite {
            return Err(ToolSourceError::InvalidInput(format!(
                "file already exists: {}",
                path.display()
            )));
        }
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                if create_dirs {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        ToolSourceError::Execution(format!("failed to create parent dirs: {e}"))
                    })?;
                } else {
                    return Err(ToolSourceError::InvalidInput(
                        "parent directory does not exist".to_string(),
                    ));
                }
            }
        }
        std::fs::write(&path, content)
            .map_err(|e| ToolSourceError::Execution(format!("failed to write file: {e}")))?;

        let relative = relative_to(&self.root, &path).display().to_string();
        // The conversation manager reads this back to add `relative` to the
        // conversation's plan-mode `createdFiles` set when in plan mode.
        Ok(ToolCallContent::json(&json!({
            "path": path.display().to_string(),
            "relativePath": relative,
            "size": content.len(),
        })))
    }
}

pub struct MoveTool {
    root: PathBuf,
}

impl MoveTool {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

#[async_trait]
impl Tool for MoveTool {
    fn name(&self) -> &str {
        "move"
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "move".to_string(),
            description: Some("Move or rename a file or directory.".to_string()),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "from": {"type": "string"},
                    "to": {"type": "string"},
                    "overwrite": {"type": "boolean"}
                },
                "required": ["from", "to"]
            }),
            requires_confirmation: true,
        }
    }

    async fn call(
        &self,
        args: Value,
        _ctx: Option<&ToolCallContext>,
    ) -> Result<ToolCallContent, ToolSourceError> {
        let from_param = args
            .get("from")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolSourceError::InvalidInput("missing from".to_string()))?;
        let to_param = args
            .get("to")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolSourceError::InvalidInput("missing to".to_string()))?;
        let from = resolve_path_under(&self.root, from_param)?;
        if !from.exists() {
            return Err(ToolSourceError::InvalidInput(format!(
                "source does not exist: {}",
                from.display()
            )));
        }
        let to = resolve_path_under(&self.root, to_param)?;
        let overwrite = args.get("overwrite").and_then(|v| v.as_bool()).unwrap_or(false);
        if to.exists() && !overwrite {
            return Err(ToolSourceError::InvalidInput(format!(
                "destination already exists: {}",
                to.display()
            )));
        }
        std::fs::rename(&from, &to)
            .map_err(|e| ToolSourceError::Execution(format!("failed to move: {e}")))?;
        Ok(ToolCallContent::json(&json!({
            "from": from.display().to_string(),
            "to": to.display().to_string(),
        })))
    }
}

pub struct DeleteTool {
    root: PathBuf,
}

impl DeleteTool {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

#[async_trait]
impl Tool for DeleteTool {
    fn name(&self) -> &str {
        "delete"
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "delete".to_string(),
            description: Some("Delete a file or empty directory.".to_string()),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "path": {"type": "string"},
                    "recursive": {"type": "boolean"}
                },
                "required": ["path"]
            }),
            requires_confirmation: true,
        }
    }

    async fn call(
        &self,
        args: Value,
        _ctx: Option<&ToolCallContext>,
    ) -> Result<ToolCallContent, ToolSourceError> {
        let path_param = args
            .get("path")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolSourceError::InvalidInput("missing path".to_string()))?;
        let path = resolve_path_under(&self.root, path_param)?;
        if !path.exists() {
            return Err(ToolSourceError::InvalidInput(format!(
                "path does not exist: {}",
                path.display()
            )));
        }
        let recursive = args.get("recursive").and_then(|v| v.as_bool()).unwrap_or(false);
        if path.is_dir() {
            if recursive {
                std::fs::remove_dir_all(&path)
            } else {
                std::fs::remove_dir(&path)
            }
        } else {
            std::fs::remove_file(&path)
        }
        .map_err(|e| ToolSourceError::Execution(format!("failed to delete: {e}")))?;
        Ok(ToolCallContent::json(&json!({ "deleted": path.display().to_string() })))
    }
}
