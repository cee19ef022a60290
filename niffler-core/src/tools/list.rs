//! `list(path, recursive?, maxDepth?, includeHidden?, sortBy, sortOrder, filterType?)`
//! (spec §4.2 tool taxonomy).

use std::path::PathBuf;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use walkdir::WalkDir;

use crate::error::ToolSourceError;
use crate::tool_source::{ToolCallContent, ToolCallContext, ToolSpec};

use super::path::resolve_path_under;
use super::Tool;

const MAX_DEPTH_CAP: usize = 100;

pub struct ListTool {
    root: PathBuf,
}

impl ListTool {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

#[derive(Serialize, Clone)]
struct Entry {
    name: String,
    path: String,
    #[serde(rename = "type")]
    kind: String,
    size: u64,
    modified: Option<i64>,
    permissions: String,
    is_dir: bool,
    is_file: bool,
    is_link: bool,
}

fn permission_string(metadata: &std::fs::Metadata) -> String {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = metadata.permissions().mode();
        let bit = |m: u32, c: char| if mode & m != 0 { c } else { '-' };
        format!(
            "{}{}{}{}{}{}{}{}{}",
            bit(0o400, 'r'),
            bit(0o200, 'w'),
            bit(0o100, 'x'),
            bit(0o040, 'r'),
            bit(0o020, 'w'),
            bit(0o010, 'x'),
            bit(0o004, 'r'),
            bit(0o002, 'w'),
            bit(0o001, 'x'),
        )
    }
    #[cfg(not(unix))]
    {
        let _ = metadata;
        "---------".to_string()
    }
}

fn to_entry(path: &std::path::Path) -> Option<Entry> {
    let metadata = std::fs::symlink_metadata(path).ok()?;
    let is_link = metadata.file_type().is_symlink();
    let kind = if is_link {
        "link"
    } else if metadata.is_dir() {
        "directory"
    } else if metadata.is_file() {
        "file"
    } else {
        "other"
    };
    Some(Entry {
        name: path.file_name()?.to_string_lossy().to_string(),
        path: path.display().to_string(),
        kind: kind.to_string(),
        size: metadata.len(),
        modified: metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_secs() as i64),
        permissions: permission_string(&metadata),
        is_dir: metadata.is_dir(),
        is_file: metadata.is_file(),
        is_link,
    })
}

#[async_trait]
impl Tool for ListTool {
    fn name(&self) -> &str {
        "list"
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "list".to_string(),
            description: Some("List directory contents, optionally recursive.".to_string()),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "path": {"type": "string"},
                    "recursive": {"type": "boolean"},
                    "maxDepth": {"type": "integer"},
                    "includeHidden": {"type": "boolean"},
                    "sortBy": {"type": "string", "enum": ["name", "size", "modified", "type"]},
                    "sortOrder": {"type": "string", "enum": ["asc", "desc"]},
                    "filterType": {"type": "string", "enum": ["file", "directory", "link", "other"]}
                },
                "required": ["path"]
            }),
            requires_confirmation: false,
        }
    }

    async fn call(
        &self,
        args: Value,
        _ctx: Option<&ToolCallContext>,
    ) -> Result<ToolCallContent, ToolSourceError> {
        let path_param = args.get("path").and_then(|v| v.as_str()).unwrap_or(".");
        let path = resolve_path_under(&self.root, path_param)?;
        if !path.is_dir() {
            return Err(ToolSourceError::InvalidInput(format!(
                "not a directory: {}",
                path.display()
            )));
        }

        let recursive = args
            .get("recursive")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        let max_depth = args
            .get("maxDepth")
            .and_then(|v| v.as_u64())
            .map(|d| (d as usize).min(MAX_DEPTH_CAP))
            .unwrap_or(if recursive { MAX_DEPTH_CAP } else { 1 });
        let include_hidden = args
            .get("includeHidden")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        let filter_type = args.get("filterType").and_then(|v| v.as_str());

        let walker = WalkDir::new(&path)
            .min_depth(1)
            .max_depth(max_depth)
            .into_iter();

        let mut entries: Vec<Entry> = Vec::new();
        for item in walker {
            let item = match item {
                Ok(i) => i,
                Err(_) => continue,
            };
            if !include_hidden
                && item
                    .file_name()
                    .to_string_lossy()
                    .starts_with('.')
            {
                continue;
            }
            if let Some(entry) = to_entry(item.path()) {
                if let Some(filter) = filter_type {
                    if entry.kind != filter {
                        continue;
                    }
                }
                entries.push(entry);
            }
        }

        let sort_by = args.get("sortBy").and_then(|v| v.as_str()).unwrap_or("name");
        let descending = args.get("sortOrder").and_then(|v| v.as_str()) == Some("desc");
        entries.sort_by(|a, b| {
            let ord = match sort_by {
                "size" => a.size.cmp(&b.size),
                "modified" => a.modified.cmp(&b.modified),
                "type" => a.kind.cmp(&b.kind),
                _ => a.name.cmp(&b.name),
            };
            if descending {
                ord.reverse()
            } else {
                ord
            }
        });

        Ok(ToolCallContent::json(&json!({ "entries": entries })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn lists_top_level_entries_by_default() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "x").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        let tool = ListTool::new(dir.path().to_path_buf());
        let result = tool.call(json!({"path": "."}), None).await.unwrap();
        assert!(result.text.contains("\"a.txt\""));
        assert!(result.text.contains("\"sub\""));
    }

    #[tokio::test]
    async fn max_depth_caps_at_100_on_deep_tree() {
        let dir = tempdir().unwrap();
        let mut cursor = dir.path().to_path_buf();
        for i in 0..5 {
            cursor = cursor.join(format!("d{i}"));
            std::fs::create_dir(&cursor).unwrap();
        }
        let tool = ListTool::new(dir.path().to_path_buf());
        let result = tool
            .call(json!({"path": ".", "recursive": true, "maxDepth": 300}), None)
            .await
            .unwrap();
        // maxDepth is clamped to 100 internally; this just shouldn't error
        // or panic on a tree far shallower than the cap.
        assert!(result.text.contains("d0"));
    }

    #[tokio::test]
    async fn hidden_entries_excluded_unless_requested() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(".hidden"), "x").unwrap();
        let tool = ListTool::new(dir.path().to_path_buf());
        let result = tool.call(json!({"path": "."}), None).await.unwrap();
        assert!(!result.text.contains(".hidden"));
        let result = tool
            .call(json!({"path": ".", "includeHidden": true}), None)
            .await
            .unwrap();
        assert!(result.text.contains(".hidden"));
    }
}
