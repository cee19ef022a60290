//! `edit(path, operation, oldText?, newText?, lineRange?, createBackup?)`
//! with plan-mode protection (spec §4.2, §4.5).

use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::ToolSourceError;
use crate::tool_source::{ToolCallContent, ToolCallContext, ToolSpec};

use super::path::{relative_to, resolve_path_under};
use super::Tool;

pub struct EditTool {
    root: PathBuf,
}

impl EditTool {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Plan-mode protection check (spec §4.5). Re-reads mode/createdFiles
    /// from `ctx` on every call rather than caching it.
    fn check_plan_mode(
        &self,
        ctx: Option<&ToolCallContext>,
        relative_path: &str,
        exists: bool,
    ) -> Result<(), ToolSourceError> {
        let Some(ctx) = ctx else { return Ok(()) };
        if !ctx.plan_mode_enabled {
            return Ok(());
        }
        if ctx.plan_mode_created_files.contains(relative_path) {
            return Ok(());
        }
        if !exists {
            return Ok(());
        }
        Err(ToolSourceError::PlanMode(format!(
            "Cannot edit existing files in plan mode ({relative_path}); switch to code mode to make this change."
        )))
    }
}

fn timestamped_backup_path(path: &std::path::Path) -> PathBuf {
    let now = chrono::Utc::now().format("%Y%m%d%H%M%S");
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    path.with_file_name(format!("{file_name}.{now}.bak"))
}

#[async_trait]
impl Tool for EditTool {
    fn name(&self) -> &str {
        "edit"
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "edit".to_string(),
            description: Some("Mutate an existing file: replace, insert, delete, append, prepend, or rewrite.".to_string()),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "path": {"type": "string"},
                    "operation": {"type": "string", "enum": ["replace", "insert", "delete", "append", "prepend", "rewrite"]},
                    "oldText": {"type": "string"},
                    "newText": {"type": "string"},
                    "lineRange": {"type": "string"},
                    "createBackup": {"type": "boolean"}
                },
                "required": ["path", "operation"]
            }),
            requires_confirmation: true,
        }
    }

    async fn call(
        &self,
        args: Value,
        ctx: Option<&ToolCallContext>,
    ) -> Result<ToolCallContent, ToolSourceError> {
        let path_param = args
            .get("path")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolSourceError::InvalidInput("missing path".to_string()))?;
        let path = resolve_path_under(&self.root, path_param)?;
        let relative = relative_to(&self.root, &path).display().to_string();
        let exists = path.exists();

        self.check_plan_mode(ctx, &relative, exists)?;

        if !exists {
            return Err(ToolSourceError::InvalidInput(format!(
                "file does not exist: {}",
                path.display()
            )));
        }
        let metadata = std::fs::metadata(&path)
            .map_err(|e| ToolSourceError::Execution(format!("cannot stat file: {e}")))?;
        if metadata.permissions().readonly() {
            return Err(ToolSourceError::Execution(format!(
                "file is not writable: {}",
                path.display()
            )));
        }

        let operation = args
            .get("operation")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolSourceError::InvalidInput("missing operation".to_string()))?;
        let original = std::fs::read_to_string(&path)
            .map_err(|e| ToolSourceError::Execution(format!("failed to read file: {e}")))?;
        let original_size = original.len();

        let new_text = args.get("newText").and_then(|v| v.as_str()).unwrap_or("");
        let old_text = args.get("oldText").and_then(|v| v.as_str());
        let line_range = args.get("lineRange").and_then(|v| v.as_str());

        let updated = match operation {
            "replace" => {
                let old = old_text.ok_or_else(|| {
                    ToolSourceError::InvalidInput("replace requires oldText".to_string())
                })?;
                if !original.contains(old) {
                    return Err(ToolSourceError::InvalidInput(
                        "oldText does not occur verbatim in the file".to_string(),
                    ));
                }
                original.replacen(old, new_text, 1)
            }
            "delete" => {
                let old = old_text.ok_or_else(|| {
                    ToolSourceError::InvalidInput("delete requires oldText".to_string())
                })?;
                if !original.contains(old) {
                    return Err(ToolSourceError::InvalidInput(
                        "oldText does not occur verbatim in the file".to_string(),
                    ));
                }
                original.replacen(old, "", 1)
            }
            "insert" => {
                let spec = line_range.ok_or_else(|| {
                    ToolSourceError::InvalidInput("insert requires lineRange".to_string())
                })?;
                let line: usize = spec
                    .split(['-', ','])
                    .next()
                    .and_then(|s| s.trim().parse().ok())
                    .ok_or_else(|| {
                        ToolSourceError::InvalidInput(format!("invalid lineRange: {spec}"))
                    })?;
                let mut lines: Vec<&str> = original.lines().collect();
                let idx = line.saturating_sub(1).min(lines.len());
                lines.insert(idx, new_text);
                lines.join("\n") + "\n"
            }
            "append" => format!("{original}{new_text}"),
            "prepend" => format!("{new_text}{original}"),
            "rewrite" => new_text.to_string(),
            other => {
                return Err(ToolSourceError::InvalidInput(format!(
                    "unknown edit operation: {other}"
                )))
            }
        };

        let create_backup = args
            .get("createBackup")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        let backup_path = if create_backup {
            let backup = timestamped_backup_path(&path);
            std::fs::write(&backup, &original)
                .map_err(|e| ToolSourceError::Execution(format!("failed to write backup: {e}")))?;
            Some(backup.display().to_string())
        } else {
            None
        };

        std::fs::write(&path, &updated)
            .map_err(|e| ToolSourceError::Execution(format!("failed to write file: {e}")))?;

        let new_size = updated.len();
        Ok(ToolCallContent::json(&json!({
            "changesMade": updated != original,
            "backupPath": backup_path,
            "lineRange": line_range,
            "originalSize": original_size,
            "newSize": new_size,
            "sizeChange": new_size as i64 - original_size as i64,
        })))
    }
}
