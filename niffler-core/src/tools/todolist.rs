//! `todolist(operation ∈ {add,update,delete,list,show,bulk_update}, …)`
//! (spec §4.2, §2's TodoItem/TodoList shape). CRUD addresses items by
//! 1-based position, remapped to a stable id at call time; `bulk_update`
//! parses a markdown checklist and hard-replaces the item set.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::ToolSourceError;
use crate::tool_source::{ToolCallContent, ToolCallContext, ToolSpec};

use super::Tool;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TodoState {
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TodoPriority {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize)]
pub struct TodoItem {
    pub id: String,
    pub content: String,
    pub state: TodoState,
    pub priority: TodoPriority,
    pub created_at: i64,
    pub updated_at: i64,
}

pub struct TodoListTool {
    items: Mutex<Vec<TodoItem>>,
}

impl TodoListTool {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(Vec::new()),
        }
    }
}

impl Default for TodoListTool {
    fn default() -> Self {
        Self::new()
    }
}

fn now() -> i64 {
    Utc::now().timestamp()
}

fn new_item(content: String, priority: TodoPriority) -> TodoItem {
    let ts = now();
    TodoItem {
        id: Uuid::new_v4().to_string(),
        content,
        state: TodoState::Pending,
        priority,
        created_at: ts,
        updated_at: ts,
    }
}

fn parse_state(s: &str) -> Result<TodoState, ToolSourceError> {
    match s {
        "pending" => Ok(TodoState::Pending),
        "in_progress" => Ok(TodoState::InProgress),
        "completed" => Ok(TodoState::Completed),
        "cancelled" => Ok(TodoState::Cancelled),
        other => Err(ToolSourceError::InvalidInput(format!(
            "unknown todo state: {other}"
        ))),
    }
}

fn parse_priority(s: &str) -> Result<TodoPriority, ToolSourceError> {
    match s {
        "low" => Ok(TodoPriority::Low),
        "medium" => Ok(TodoPriority::Medium),
        "high" => Ok(TodoPriority::High),
        other => Err(ToolSourceError::InvalidInput(format!(
            "unknown todo priority: {other}"
        ))),
    }
}

/// Renders one `- [ ] content (!)` style markdown checklist line.
fn render_line(item: &TodoItem) -> String {
    let marker = match item.state {
        TodoState::Pending => " ",
        TodoState::Completed => "x",
        TodoState::InProgress => "~",
        TodoState::Cancelled => "-",
    };
    let suffix = match item.priority {
        TodoPriority::High => " (!)",
        TodoPriority::Low => " (low)",
        TodoPriority::Medium => "",
    };
    format!("- [{marker}] {}{suffix}", item.content)
}

/// Parses `- [ ]/[x]/[~]/[-] content` lines with optional ` (!)` / ` (low)`
/// priority suffixes. Unrecognized lines are skipped.
fn parse_checklist(markdown: &str) -> Vec<(String, TodoState, TodoPriority)> {
    let mut out = Vec::new();
    for line in markdown.lines() {
        let trimmed = line.trim();
        let Some(rest) = trimmed.strip_prefix("- [") else {
            continue;
        };
        let Some((marker, rest)) = rest.split_once(']') else {
            continue;
        };
        let state = match marker {
            " " => TodoState::Pending,
            "x" | "X" => TodoState::Completed,
            "~" => TodoState::InProgress,
            "-" => TodoState::Cancelled,
            _ => continue,
        };
        let mut content = rest.trim().to_string();
        let mut priority = TodoPriority::Medium;
        if let Some(stripped) = content.strip_suffix("(!)") {
            priority = TodoPriority::High;
            content = stripped.trim().to_string();
        } else if let Some(stripped) = content.strip_suffix("(low)") {
            priority = TodoPriority::Low;
            content = stripped.trim().to_string();
        }
        out.push((content, state, priority));
    }
    out
}

#[async_trait]
impl Tool for TodoListTool {
    fn name(&self) -> &str {
        "todolist"
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "todolist".to_string(),
            description: Some(
                "Manage a structured todo list: add, update, delete, list, show, bulk_update."
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "operation": {"type": "string", "enum": ["add", "update", "delete", "list", "show", "bulk_update"]},
                    "content": {"type": "string"},
                    "position": {"type": "integer"},
                    "state": {"type": "string", "enum": ["pending", "in_progress", "completed", "cancelled"]},
                    "priority": {"type": "string", "enum": ["low", "medium", "high"]},
                    "markdown": {"type": "string"}
                },
                "required": ["operation"]
            }),
            requires_confirmation: false,
        }
    }

    async fn call(
        &self,
        args: Value,
        _ctx: Option<&ToolCallContext>,
    ) -> Result<ToolCallContent, ToolSourceError> {
        let operation = args
            .get("operation")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolSourceError::InvalidInput("missing operation".to_string()))?;

        let mut items = self.items.lock().unwrap();

        match operation {
            "add" => {
                let content = args
                    .get("content")
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| ToolSourceError::InvalidInput("add requires content".to_string()))?;
                let priority = args
                    .get("priority")
                    .and_then(|v| v.as_str())
                    .map(parse_priority)
                    .transpose()?
                    .unwrap_or(TodoPriority::Medium);
                let item = new_item(content.to_string(), priority);
                items.push(item.clone());
                Ok(ToolCallContent::json(&json!({ "item": item })))
            }
            "update" => {
                let position = args
                    .get("position")
                    .and_then(|v| v.as_u64())
                    .ok_or_else(|| ToolSourceError::InvalidInput("update requires position".to_string()))?
                    as usize;
                let idx = position
                    .checked_sub(1)
                    .filter(|i| *i < items.len())
                    .ok_or_else(|| ToolSourceError::InvalidInput(format!("no item at position {position}")))?;
                if let Some(content) = args.get("content").and_then(|v| v.as_str()) {
                    items[idx].content = content.to_string();
                }
                if let Some(state) = args.get("state").and_then(|v| v.as_str()) {
                    items[idx].state = parse_state(state)?;
                }
                if let Some(priority) = args.get("priority").and_then(|v| v.as_str()) {
                    items[idx].priority = parse_priority(priority)?;
                }
                items[idx].updated_at = now();
                Ok(ToolCallContent::json(&json!({ "item": items[idx].clone() })))
            }
            "delete" => {
                let position = args
                    .get("position")
                    .and_then(|v| v.as_u64())
                    .ok_or_else(|| ToolSourceError::InvalidInput("delete requires position".to_string()))?
                    as usize;
                let idx = position
                    .checked_sub(1)
                    .filter(|i| *i < items.len())
                    .ok_or_else(|| ToolSourceError::InvalidInput(format!("no item at position {position}")))?;
                let removed = items.remove(idx);
                Ok(ToolCallContent::json(&json!({ "deleted": removed })))
            }
            "list" => Ok(ToolCallContent::json(&json!({ "items": items.clone() }))),
            "show" => {
                let position = args
                    .get("position")
                    .and_then(|v| v.as_u64())
                    .ok_or_else(|| ToolSourceError::InvalidInput("show requires position".to_string()))?
                    as usize;
                let idx = position
                    .checked_sub(1)
                    .filter(|i| *i < items.len())
                    .ok_or_else(|| ToolSourceError::InvalidInput(format!("no item at position {position}")))?;
                Ok(ToolCallContent::json(&json!({ "item": items[idx].clone() })))
            }
            "bulk_update" => {
                let markdown = args
                    .get("markdown")
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| ToolSourceError::InvalidInput("bulk_update requires markdown".to_string()))?;
                let parsed = parse_checklist(markdown);
                *items = parsed
                    .into_iter()
                    .map(|(content, state, priority)| {
                        let mut item = new_item(content, priority);
                        item.state = state;
                        item
                    })
                    .collect();
                Ok(ToolCallContent::json(&json!({ "items": items.clone() })))
            }
            other => Err(ToolSourceError::InvalidInput(format!(
                "unknown todolist operation: {other}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn add_then_list_returns_the_item() {
        let tool = TodoListTool::new();
        tool.call(json!({"operation": "add", "content": "write tests"}), None)
            .await
            .unwrap();
        let result = tool.call(json!({"operation": "list"}), None).await.unwrap();
        assert!(result.text.contains("write tests"));
    }

    #[tokio::test]
    async fn update_by_position_changes_state() {
        let tool = TodoListTool::new();
        tool.call(json!({"operation": "add", "content": "a"}), None).await.unwrap();
        tool.call(json!({"operation": "add", "content": "b"}), None).await.unwrap();
        let result = tool
            .call(json!({"operation": "update", "position": 2, "state": "completed"}), None)
            .await
            .unwrap();
        assert!(result.text.contains("\"content\":\"b\""));
        assert!(result.text.contains("\"completed\""));
    }

    #[tokio::test]
    async fn delete_unknown_position_is_invalid_input() {
        let tool = TodoListTool::new();
        let err = tool
            .call(json!({"operation": "delete", "position": 1}), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolSourceError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn bulk_update_round_trips_rendered_list_modulo_position() {
        let tool = TodoListTool::new();
        tool.call(json!({"operation": "add", "content": "alpha", "priority": "high"}), None)
            .await
            .unwrap();
        tool.call(json!({"operation": "add", "content": "beta"}), None)
            .await
            .unwrap();
        tool.call(json!({"operation": "update", "position": 2, "state": "in_progress"}), None)
            .await
            .unwrap();

        let before = tool.items.lock().unwrap().clone();
        let rendered = before.iter().map(render_line).collect::<Vec<_>>().join("\n");

        tool.call(json!({"operation": "bulk_update", "markdown": rendered}), None)
            .await
            .unwrap();
        let after = tool.items.lock().unwrap().clone();

        assert_eq!(before.len(), after.len());
        for (b, a) in before.iter().zip(after.iter()) {
            assert_eq!(b.content, a.content);
            assert_eq!(b.state, a.state);
            assert_eq!(b.priority, a.priority);
        }
    }

    #[test]
    fn parse_checklist_recognizes_all_four_markers_and_priority_suffixes() {
        let md = "- [ ] pending task\n- [x] done task\n- [~] active task (!)\n- [-] dropped task (low)\n";
        let parsed = parse_checklist(md);
        assert_eq!(parsed.len(), 4);
        assert_eq!(parsed[0].1, TodoState::Pending);
        assert_eq!(parsed[1].1, TodoState::Completed);
        assert_eq!(parsed[2].1, TodoState::InProgress);
        assert_eq!(parsed[2].2, TodoPriority::High);
        assert_eq!(parsed[3].1, TodoState::Cancelled);
        assert_eq!(parsed[3].2, TodoPriority::Low);
    }
}
