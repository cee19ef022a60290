//! Built-in tool taxonomy (spec §4.2 "Tool taxonomy") plus the registry that
//! dispatches calls to them by name.

mod aggregate_source;
pub mod bash;
pub mod edit;
pub mod fetch;
pub mod file_ops;
pub mod glob;
pub mod grep;
pub mod list;
mod path;
pub mod read;
mod registry;
pub mod task;
pub mod todolist;
mod r#trait;

pub use aggregate_source::AggregateToolSource;
pub use bash::BashTool;
pub use edit::EditTool;
pub use fetch::FetchTool;
pub use file_ops::{CreateTool, DeleteTool, MoveTool};
pub use glob::GlobTool;
pub use grep::GrepTool;
pub use list::ListTool;
pub use path::{relative_to, resolve_path_under};
pub use r#trait::Tool;
pub use read::ReadTool;
pub use registry::{ToolRegistry, ToolRegistryLocked};
pub use task::TaskTool;
pub use todolist::TodoListTool;

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Builds a registry of every built-in tool rooted at `working_dir`,
/// optionally restricted to `allowed` names (spec §2 `AgentDefinition`'s
/// tool whitelist). `task` itself is only included when `task_runner` is
/// supplied, since a task-spawned child must never expose it (spec §9).
pub async fn build_registry(
    working_dir: &Path,
    allowed: Option<&HashSet<String>>,
    agents_dir: Option<PathBuf>,
    task_runner: Option<Arc<dyn task::TaskRunner>>,
) -> ToolRegistryLocked {
    let registry = ToolRegistryLocked::new();
    let wanted = |name: &str| allowed.map(|set| set.contains(name)).unwrap_or(true);
    let root = working_dir.to_path_buf();

    if wanted("read") {
        registry.register(Box::new(ReadTool::new(root.clone()))).await;
    }
    if wanted("list") {
        registry.register(Box::new(ListTool::new(root.clone()))).await;
    }
    if wanted("edit") {
        registry.register(Box::new(EditTool::new(root.clone()))).await;
    }
    if wanted("create") {
        registry.register(Box::new(CreateTool::new(root.clone()))).await;
    }
    if wanted("move") {
        registry.register(Box::new(MoveTool::new(root.clone()))).await;
    }
    if wanted("delete") {
        registry.register(Box::new(DeleteTool::new(root.clone()))).await;
    }
    if wanted("glob") {
        registry.register(Box::new(GlobTool::new(root.clone()))).await;
    }
    if wanted("grep") {
        registry.register(Box::new(GrepTool::new(root.clone()))).await;
    }
    if wanted("bash") {
        registry.register(Box::new(BashTool::new())).await;
    }
    if wanted("fetch") {
        registry.register(Box::new(FetchTool::new())).await;
    }
    if wanted("todolist") {
        registry.register(Box::new(TodoListTool::new())).await;
    }
    if wanted("task") {
        if let (Some(agents_dir), Some(runner)) = (agents_dir, task_runner) {
            registry.register(Box::new(TaskTool::new(agents_dir, runner))).await;
        }
    }

    registry
}
