//! The API worker (streaming LLM client) and tool worker (spec §4.2, §4.3).

mod api_worker;
mod child_runner;
mod orchestrator;
mod tool_worker;

pub use api_worker::{ApiWorker, TurnOutcome};
pub use child_runner::ChildTaskRunner;
pub use orchestrator::{RunResult, TurnRunner};
pub use tool_worker::ToolWorker;
