//! Crate-wide error taxonomy.
//!
//! Mirrors the error-handling design in spec §7: validation errors are
//! user-visible and never logged as worker failures; execution/timeout
//! errors are returned to the model as structured tool results; provider
//! errors end the current turn without killing the conversation; only
//! [`FatalError`] terminates the process.

use thiserror::Error;

/// Errors from tool lookup, argument validation, or tool execution.
///
/// **Interaction**: returned by [`crate::tools::Tool::call`] and
/// [`crate::tool_source::ToolSource`]; the tool worker (§4.2) converts every
/// variant into a structured [`crate::tool_worker::ToolResponse`] rather than
/// propagating it.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ToolSourceError {
    #[error("tool not found: {0}")]
    NotFound(String),
    #[error("invalid arguments: {0}")]
    InvalidInput(String),
    #[error("path safety violation: {0}")]
    PathSafety(String),
    #[error("plan mode: {0}")]
    PlanMode(String),
    #[error("execution error: {0}")]
    Execution(String),
    /// Execution error with the process's captured exit code and output
    /// (spec §6 tool error wire shape `exitCode?`/`output?`).
    #[error("execution error: {message}")]
    ExecutionWithOutput {
        message: String,
        exit_code: i32,
        output: serde_json::Value,
    },
    /// Deadline exceeded; `exit_code` is the process's reported code after
    /// termination (§8 boundary: bash timeout always reports -1).
    #[error("timeout: {message}")]
    Timeout {
        message: String,
        exit_code: i32,
        output: serde_json::Value,
    },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("declined by user")]
    Declined,
}

impl ToolSourceError {
    /// `(exitCode, output, kind)` for errors that carry them, per spec §6's
    /// tool error wire shape and §8's `kind=timeout` boundary case. `None`
    /// fields are omitted from the JSON object the orchestrator builds.
    pub fn structured_fields(&self) -> (Option<i32>, Option<serde_json::Value>, Option<&'static str>) {
        match self {
            ToolSourceError::ExecutionWithOutput { exit_code, output, .. } => {
                (Some(*exit_code), Some(output.clone()), None)
            }
            ToolSourceError::Timeout { exit_code, output, .. } => {
                (Some(*exit_code), Some(output.clone()), Some("timeout"))
            }
            _ => (None, None, None),
        }
    }
}

/// Errors from the streaming parser (§4.3).
#[derive(Debug, Error)]
pub enum StreamParseError {
    #[error("malformed event stream: {0}")]
    Malformed(String),
    #[error("malformed tool call arguments for block {index}: {source}")]
    ToolArgs {
        index: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("provider error: {0}")]
    Provider(String),
    #[error("maximum tool-use turns ({0}) exceeded")]
    TurnLimitExceeded(usize),
    #[error("transport error: {0}")]
    Transport(String),
}

/// Errors from the conversation store (§4.4, §6).
#[derive(Debug, Error)]
pub enum ConversationError {
    #[error("conversation not found: {0}")]
    NotFound(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("invariant violated: {0}")]
    Invariant(String),
}

/// Errors while loading or interpolating configuration (§4.7, §6).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    NotFound(String),
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("unresolved environment variable: {0}")]
    MissingEnvVar(String),
}

/// Process-fatal errors (§7): channel fabric failure, unreachable database at
/// startup. Anything else is recoverable at the conversation or turn level.
#[derive(Debug, Error)]
pub enum FatalError {
    #[error("channel fabric failure: {0}")]
    ChannelClosed(String),
    #[error("storage unreachable: {0}")]
    StorageUnreachable(String),
}
