//! Interactive REPL loop: read stdin, run one conversation turn, print
//! output, repeat until EOF or `/exit`. Slash commands are handled entirely
//! here rather than sent through the channel fabric (spec §6 "CLI surface").

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use niffler_core::config::{build_config_summary, ModelConfig, NifflerConfig};
use niffler_core::conversation::ConversationManager;
use niffler_core::message::Message;
use niffler_core::protocol::ToolResponse;
use niffler_core::stream::infer_provider_format;
use niffler_core::tokenizer::{estimate_tokens, TokenCorrectionTable};
use niffler_core::tool_source::{ToolCallContext, ToolSpec};
use niffler_core::worker::TurnRunner;

/// Recognized slash commands and quit tokens, matched case-insensitively.
fn is_quit_command(s: &str) -> bool {
    matches!(s.trim().to_lowercase().as_str(), "/exit" | "exit" | "quit")
}

/// Mutable state for one interactive session, shared between the REPL loop
/// and the tool worker's per-call context closure.
pub struct Session {
    pub conversation_id: Mutex<String>,
    pub config: Arc<NifflerConfig>,
    pub manager: Arc<ConversationManager>,
    pub correction_table: Arc<TokenCorrectionTable>,
    pub current_model: Mutex<ModelConfig>,
    pub plan_mode: Mutex<bool>,
    pub db_path: String,
    pub shared_tool_ctx: Arc<Mutex<Option<ToolCallContext>>>,
    /// Declarations for every top-level tool, handed to the model each turn
    /// so it can be prompted to emit matching tool calls (spec §4.2 step 1).
    /// Static for the process's lifetime; `task` children resolve their own,
    /// narrower set independently.
    pub tool_schemas: Vec<ToolSpec>,
}

impl Session {
    fn conversation_id(&self) -> String {
        self.conversation_id.lock().unwrap().clone()
    }

    /// Re-reads mode and created-files from storage and publishes the
    /// result for the tool worker's next dispatch, matching the plan-mode
    /// re-read discipline `ConversationManager::tool_call_context` already
    /// follows for each individual tool call.
    async fn refresh_tool_context(&self) {
        if let Ok(ctx) = self.manager.tool_call_context(&self.conversation_id()).await {
            *self.plan_mode.lock().unwrap() = ctx.plan_mode_enabled;
            *self.shared_tool_ctx.lock().unwrap() = Some(ctx);
        }
    }

    async fn handle_slash_command(&self, command: &str) -> Option<String> {
        let mut parts = command.trim().splitn(2, char::is_whitespace);
        let name = parts.next().unwrap_or("");
        let arg = parts.next().map(str::trim).unwrap_or("");

        match name {
            "/model" => {
                if arg.is_empty() {
                    return Some(format!("current model: {}", self.current_model.lock().unwrap().nickname));
                }
                let Some(model) = self.config.model(arg) else {
                    return Some(format!("unknown model nickname: {arg}"));
                };
                if let Err(e) = self.manager.switch_model(&self.conversation_id(), arg).await {
                    return Some(format!("failed to switch model: {e}"));
                }
                *self.current_model.lock().unwrap() = model.clone();
                Some(format!("switched to model {arg}"))
            }
            "/mode" => {
                let plan = match arg {
                    "plan" => true,
                    "code" => false,
                    _ => return Some("usage: /mode plan|code".to_string()),
                };
                if let Err(e) = self.manager.set_mode(&self.conversation_id(), plan).await {
                    return Some(format!("failed to set mode: {e}"));
                }
                *self.plan_mode.lock().unwrap() = plan;
                Some(format!("mode set to {arg}"))
            }
            "/config" => {
                let model = self.current_model.lock().unwrap().clone();
                let summary = build_config_summary(&self.config, &model, &self.db_path);
                Some(summary.render())
            }
            "/agent" => {
                if arg.is_empty() {
                    Some("usage: /agent <name>".to_string())
                } else {
                    Some(format!("agent definitions are resolved per task() call; pass \"{arg}\" as agentName"))
                }
            }
            "/context" => {
                let usage = self
                    .manager
                    .total_token_usage(&self.conversation_id())
                    .await
                    .unwrap_or((0, 0, 0));
                let model = self.current_model.lock().unwrap().clone();
                let correction = self.correction_table.snapshot(&model.nickname);
                let (avg_correction, samples) = correction
                    .map(|c| (c.avg_correction, c.total_samples))
                    .unwrap_or((1.0, 0));
                Some(format!(
                    "input={} output={} reasoning={} correction={:.3} ({} samples) context_window={}",
                    usage.0, usage.1, usage.2, avg_correction, samples, model.context
                ))
            }
            "/clear" => {
                let nickname = self.current_model.lock().unwrap().nickname.clone();
                match self.manager.start_conversation(&nickname).await {
                    Ok(new_id) => {
                        *self.conversation_id.lock().unwrap() = new_id;
                        *self.plan_mode.lock().unwrap() = false;
                        *self.shared_tool_ctx.lock().unwrap() = None;
                        Some("conversation cleared".to_string())
                    }
                    Err(e) => Some(format!("failed to start a fresh conversation: {e}")),
                }
            }
            _ => Some(format!("unrecognized command: {name}")),
        }
    }
}

/// Runs one conversation turn: persists the user message, drives the model
/// through [`TurnRunner`], persists every new message it produced, and
/// records a correction-factor sample from the turn's actual usage.
pub async fn run_turn(
    session: &Session,
    turn_runner: &TurnRunner,
    mode_system_prompt: &str,
    user_text: &str,
    tool_responses: &mut mpsc::Receiver<ToolResponse>,
) -> Result<String, Box<dyn std::error::Error>> {
    let conversation_id = session.conversation_id();
    session.manager.append_message(&conversation_id, &Message::user(user_text)).await?;
    session.refresh_tool_context().await;

    let mut history = session.manager.load_history(&conversation_id).await?;
    let before = history.len();
    let model = session.current_model.lock().unwrap().clone();
    let provider_format = infer_provider_format(&model);

    let result = turn_runner
        .run(
            &conversation_id,
            &model,
            mode_system_prompt,
            provider_format,
            &session.tool_schemas,
            &mut history,
            tool_responses,
        )
        .await?;

    for message in &history[before..] {
        session.manager.append_message(&conversation_id, message).await?;
    }
    session
        .manager
        .record_model_token_usage(
            &conversation_id,
            &model.nickname,
            result.total_input_tokens,
            result.total_output_tokens,
            result.total_reasoning_tokens,
        )
        .await?;

    let estimated = estimate_tokens(&result.final_outcome.content) as f64;
    session
        .correction_table
        .record_sample(&model.nickname, estimated, result.total_output_tokens as f64, Utc::now());

    Ok(result.final_outcome.content)
}

/// Runs the REPL loop: prompt, read line, dispatch slash commands or turns,
/// print the reply, repeat. Exits on EOF, `/exit`, `exit`, or `quit`.
pub async fn run_repl_loop(
    session: &Session,
    turn_runner: &TurnRunner,
    mode_system_prompt: impl Fn() -> String,
    tool_responses: &mut mpsc::Receiver<ToolResponse>,
) -> Result<(), Box<dyn std::error::Error>> {
    use std::io::Write;

    let mut reader = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let line = match reader.next_line().await? {
            None => break,
            Some(s) if s.trim().is_empty() => continue,
            Some(s) if is_quit_command(&s) => break,
            Some(s) => s,
        };

        if line.trim_start().starts_with('/') {
            if let Some(output) = session.handle_slash_command(&line).await {
                println!("{output}");
            }
            continue;
        }

        match run_turn(session, turn_runner, &mode_system_prompt(), &line, tool_responses).await {
            Ok(reply) => println!("{reply}"),
            Err(e) => eprintln!("error: {e}"),
        }
    }

    println!("Bye.");
    Ok(())
}

/// Closure handed to [`niffler_core::worker::ToolWorker::run`]: returns the
/// most recently published [`ToolCallContext`] without blocking on storage.
pub fn tool_ctx_reader(shared: Arc<Mutex<Option<ToolCallContext>>>) -> impl FnMut() -> Option<ToolCallContext> {
    move || shared.lock().unwrap().clone()
}

/// Built-in set of tool names the CLI exposes at the top level (excludes
/// `task`, whose availability is config/agent-driven).
pub fn top_level_tool_names() -> HashSet<String> {
    [
        "read", "list", "edit", "create", "move", "delete", "glob", "grep", "bash", "fetch", "todolist", "task",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}
