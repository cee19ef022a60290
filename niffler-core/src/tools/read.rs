//! `read(path, encoding?, maxSize?, linerange?)` (spec §4.2 tool taxonomy).

use std::path::PathBuf;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};

use crate::error::ToolSourceError;
use crate::tool_source::{ToolCallContent, ToolCallContext, ToolSpec};

use super::path::resolve_path_under;
use super::Tool;

const DEFAULT_MAX_SIZE: u64 = 256 * 1024;

pub struct ReadTool {
    root: PathBuf,
}

impl ReadTool {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

#[derive(Serialize)]
struct ReadResult {
    content: String,
    path: String,
    size: u64,
    encoding: String,
    modified: Option<i64>,
    total_lines: usize,
    lines_read: usize,
    start_line: usize,
    end_line: usize,
}

/// Parses `"a-b"`, `"a,b"`, `"[a,b]"`, or `"b'[a,b]'"` 1-based line ranges.
fn parse_line_range(spec: &str) -> Result<(usize, usize), ToolSourceError> {
    let trimmed = spec
        .trim()
        .trim_start_matches("b'")
        .trim_end_matches('\'')
        .trim_start_matches('[')
        .trim_end_matches(']');
    let sep = if trimmed.contains('-') { '-' } else { ',' };
    let mut parts = trimmed.splitn(2, sep);
    let a = parts.next().unwrap_or_default().trim();
    let b = parts.next().unwrap_or_default().trim();
    let start: usize = a
        .parse()
        .map_err(|_| ToolSourceError::InvalidInput(format!("invalid linerange: {spec}")))?;
    let end: usize = b
        .parse()
        .map_err(|_| ToolSourceError::InvalidInput(format!("invalid linerange: {spec}")))?;
    Ok((start, end))
}

#[async_trait]
impl Tool for ReadTool {
    fn name(&self) -> &str {
        "read"
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "read".to_string(),
            description: Some(
                "Read a file's content, optionally restricted to a 1-based line range."
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "path": {"type": "string"},
                    "encoding": {"type": "string", "enum": ["auto", "utf-8", "utf-16", "utf-32", "ascii", "latin1"]},
                    "maxSize": {"type": "integer"},
                    "linerange": {"type": "string"}
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
        let path_param = args
            .get("path")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolSourceError::InvalidInput("missing path".to_string()))?;
        let path = resolve_path_under(&self.root, path_param)?;
        if !path.exists() {
            return Err(ToolSourceError::InvalidInput(format!(
                "file not found: {}",
                path.display()
            )));
        }

        let max_size = args
            .get("maxSize")
            .and_then(|v| v.as_u64())
            .unwrap_or(DEFAULT_MAX_SIZE);
        let linerange = args.get("linerange").and_then(|v| v.as_str());

        let metadata = std::fs::metadata(&path)
            .map_err(|e| ToolSourceError::Execution(format!("failed to stat file: {e}")))?;

        if linerange.is_none() && metadata.len() > max_size {
            return Err(ToolSourceError::InvalidInput(format!(
                "file is {} bytes, exceeds maxSize {}; pass `linerange` to read a slice",
                metadata.len(),
                max_size
            )));
        }

        let raw = std::fs::read_to_string(&path)
            .map_err(|e| ToolSourceError::Execution(format!("failed to read file: {e}")))?;
        let all_lines: Vec<&str> = raw.lines().collect();
        let total_lines = all_lines.len();

        let (start_line, end_line, selected): (usize, usize, Vec<&str>) = match linerange {
            Some(spec) => {
                let (start, end) = parse_line_range(spec)?;
                let start = start.max(1).min(total_lines.max(1));
                let end = end.max(start).min(total_lines.max(1));
                (
                    start,
                    end,
                    all_lines[start.saturating_sub(1)..end].to_vec(),
                )
            }
            None => (1, total_lines, all_lines.clone()),
        };

        let sliced_bytes: usize = selected.iter().map(|l| l.len() + 1).sum();
        if linerange.is_some() && sliced_bytes as u64 > max_size {
            return Err(ToolSourceError::InvalidInput(format!(
                "selected range is {sliced_bytes} bytes, exceeds maxSize {max_size}"
            )));
        }

        let numbered: String = selected
            .iter()
            .enumerate()
            .map(|(i, line)| format!("{:>6}\t{}", start_line + i, line))
            .collect::<Vec<_>>()
            .join("\n");

        let result = ReadResult {
            content: numbered,
            path: path.display().to_string(),
            size: metadata.len(),
            encoding: args
                .get("encoding")
                .and_then(|v| v.as_str())
                .unwrap_or("utf-8")
                .to_string(),
            modified: metadata
                .modified()
                .ok()
                .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                .map(|d| d.as_secs() as i64),
            total_lines,
            lines_read: selected.len(),
            start_line,
            end_line,
        };
        Ok(ToolCallContent::json(&serde_json::to_value(result).unwrap()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn reads_full_file_with_line_numbers() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "line one\nline two\n").unwrap();
        let tool = ReadTool::new(dir.path().to_path_buf());
        let result = tool
            .call(json!({"path": "a.txt"}), None)
            .await
            .unwrap();
        assert!(result.text.contains("\"lines_read\":2"));
        assert!(result.text.contains("line one"));
    }

    #[tokio::test]
    async fn max_size_without_linerange_fails_with_remediation() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("big.txt"), "x".repeat(100)).unwrap();
        let tool = ReadTool::new(dir.path().to_path_buf());
        let err = tool
            .call(json!({"path": "big.txt", "maxSize": 10}), None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("linerange"));
    }

    #[tokio::test]
    async fn linerange_applies_before_max_size() {
        let dir = tempdir().unwrap();
        let content = (1..=10)
            .map(|n| format!("row {n}"))
            .collect::<Vec<_>>()
            .join("\n");
        std::fs::write(dir.path().join("rows.txt"), content).unwrap();
        let tool = ReadTool::new(dir.path().to_path_buf());
        let result = tool
            .call(json!({"path": "rows.txt", "linerange": "2-4"}), None)
            .await
            .unwrap();
        assert!(result.text.contains("row 2"));
        assert!(result.text.contains("row 4"));
        assert!(!result.text.contains("row 5"));
    }

    #[test]
    fn parses_bracket_and_quoted_linerange_forms() {
        assert_eq!(parse_line_range("1-5").unwrap(), (1, 5));
        assert_eq!(parse_line_range("[1,5]").unwrap(), (1, 5));
        assert_eq!(parse_line_range("b'[1,5]'").unwrap(), (1, 5));
    }
}
