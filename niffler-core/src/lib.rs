//! # niffler-core
//!
//! Channel fabric, tool subsystem, streaming LLM parser, token estimation,
//! conversation persistence, and worker loops for Niffler — an interactive
//! terminal assistant that drives LLMs through streaming HTTP APIs while
//! letting the model invoke local side-effectful tools under user
//! supervision.
//!
//! ## Main modules
//!
//! - [`channels`]: the mailbox set tying the CLI, API worker, and tool
//!   worker together for one process lifetime ([`channels::ChannelFabric`]).
//! - [`stream`]: provider-specific SSE parsing into a uniform
//!   [`stream::StreamEvent`] vocabulary ([`stream::StreamParser`]).
//! - [`tokenizer`]: heuristic token estimation plus a learned per-model
//!   correction factor ([`tokenizer::estimate_tokens`],
//!   [`tokenizer::TokenCorrectionTable`]).
//! - [`tools`]: the built-in tool taxonomy (`read`, `list`, `edit`,
//!   `create`/`move`/`delete`, `bash`, `fetch`, `glob`, `grep`, `todolist`,
//!   `task`) behind the [`tools::Tool`] trait.
//! - [`tool_source`]: the provider-agnostic [`tool_source::ToolSource`]
//!   trait shared by built-in, MCP, and task-tool-spawned sources.
//! - [`conversation`]: SQLite-backed conversation history, plan-mode state,
//!   and token usage ([`conversation::ConversationManager`]).
//! - [`worker`]: the API worker (streaming HTTP client) and tool worker
//!   ([`worker::ApiWorker`], [`worker::ToolWorker`]).
//! - [`prompts`]: instruction-file parsing and system-prompt templating.
//! - [`config`]: YAML configuration with `${VAR}` interpolation
//!   ([`config::NifflerConfig`]).

pub mod channels;
pub mod config;
pub mod conversation;
pub mod error;
pub mod message;
pub mod prompts;
pub mod protocol;
pub mod stream;
pub mod tokenizer;
pub mod tool_source;
pub mod tools;
pub mod worker;
