//! Niffler CLI binary: an interactive terminal assistant driving an LLM
//! through streaming HTTP APIs with local tool execution under user
//! supervision (spec §1, §6).

mod logging;
mod repl;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use clap::Parser;

use niffler_core::channels::ChannelFabric;
use niffler_core::config::NifflerConfig;
use niffler_core::conversation::ConversationManager;
use niffler_core::prompts::{InstructionFile, TemplateContext};
use niffler_core::protocol::ConfirmResponse;
use niffler_core::tokenizer::TokenCorrectionTable;
use niffler_core::tools::build_registry;
use niffler_core::worker::{ApiWorker, ChildTaskRunner, ToolWorker, TurnRunner};

use repl::{run_turn, tool_ctx_reader, Session};

const DEFAULT_CONFIG_PATH: &str = "niffler.yaml";
const DEFAULT_DB_PATH: &str = "niffler.db";

#[derive(Parser, Debug)]
#[command(name = "niffler")]
#[command(about = "Niffler — interactive terminal LLM assistant")]
struct Args {
    /// One-shot message; omit to start the interactive REPL.
    #[arg(short, long, value_name = "TEXT")]
    message: Option<String>,

    /// Positional words, joined as the message when -m/--message is absent.
    #[arg(trailing_var_arg = true)]
    rest: Vec<String>,

    /// Path to the YAML config file.
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Directory tools operate under; default: current directory.
    #[arg(short, long, value_name = "DIR")]
    working_dir: Option<PathBuf>,

    /// Directory of agent definition markdown files for the `task` tool.
    #[arg(long, value_name = "DIR")]
    agents_dir: Option<PathBuf>,

    /// Model nickname to start with; default: the first configured model.
    #[arg(long, value_name = "NICKNAME")]
    model: Option<String>,

    /// Start in plan mode instead of code mode.
    #[arg(long)]
    plan: bool,
}

/// Locates the config file: an explicit `--config` wins outright; otherwise
/// tries `$NIFFLER_CONFIG`, then `~/.niffler/config.yaml`, then the default
/// name in the current directory, taking the first candidate that exists.
/// With nothing on disk, falls back to the default path so the resulting
/// "not found" error names something sensible.
fn resolve_config_path(args: &Args) -> PathBuf {
    if let Some(explicit) = &args.config {
        return explicit.clone();
    }
    let mut candidates = Vec::new();
    if let Ok(env_path) = std::env::var("NIFFLER_CONFIG") {
        candidates.push(PathBuf::from(env_path));
    }
    if let Some(home) = dirs::home_dir() {
        candidates.push(home.join(".niffler").join("config.yaml"));
    }
    candidates.push(PathBuf::from(DEFAULT_CONFIG_PATH));

    candidates
        .iter()
        .find(|p| p.exists())
        .cloned()
        .unwrap_or_else(|| candidates.into_iter().next().unwrap())
}

fn load_instructions(config: &NifflerConfig, working_dir: &std::path::Path) -> InstructionFile {
    let mut merged = InstructionFile::default();
    for path in &config.instruction_files {
        let full_path = working_dir.join(path);
        if let Ok(markdown) = std::fs::read_to_string(&full_path) {
            let base_dir = full_path.parent().unwrap_or(working_dir);
            let parsed = InstructionFile::parse(&markdown, base_dir);
            merged.common = parsed.common.or(merged.common);
            merged.plan_mode = parsed.plan_mode.or(merged.plan_mode);
            merged.code_mode = parsed.code_mode.or(merged.code_mode);
        }
    }
    merged
}

fn render_mode_prompt(instructions: &InstructionFile, plan_mode: bool, template_ctx: &TemplateContext) -> String {
    let common = instructions.common.as_deref().unwrap_or_default();
    let mode_specific = if plan_mode {
        instructions.plan_mode.as_deref().unwrap_or_default()
    } else {
        instructions.code_mode.as_deref().unwrap_or_default()
    };
    let combined = format!("{common}\n\n{mode_specific}");
    template_ctx.render(&combined)
}

#[tokio::main]
async fn main() {
    logging::init().ok();

    let args = Args::parse();

    let message = args.message.clone().or_else(|| {
        if args.rest.is_empty() {
            None
        } else {
            Some(args.rest.join(" "))
        }
    });

    let config_path = resolve_config_path(&args);
    let config = match NifflerConfig::load(&config_path) {
        Ok(config) => Arc::new(config),
        Err(e) => {
            eprintln!("niffler: configuration error: {e}");
            std::process::exit(2);
        }
    };

    let working_dir = args.working_dir.clone().unwrap_or_else(|| PathBuf::from("."));
    let agents_dir = args.agents_dir.clone().unwrap_or_else(|| working_dir.join("agents"));

    let default_model_nickname = match args.model.clone().or_else(|| config.models.first().map(|m| m.nickname.clone())) {
        Some(nickname) => nickname,
        None => {
            eprintln!("niffler: no models configured");
            std::process::exit(2);
        }
    };
    let Some(initial_model) = config.model(&default_model_nickname).cloned() else {
        eprintln!("niffler: unknown model nickname: {default_model_nickname}");
        std::process::exit(2);
    };

    let db_path = working_dir.join(DEFAULT_DB_PATH);
    let manager = match ConversationManager::open(&db_path) {
        Ok(manager) => Arc::new(manager),
        Err(e) => {
            eprintln!("niffler: failed to open conversation store: {e}");
            std::process::exit(1);
        }
    };

    let conversation_id = match manager.start_conversation(&default_model_nickname).await {
        Ok(id) => id,
        Err(e) => {
            eprintln!("niffler: failed to start conversation: {e}");
            std::process::exit(1);
        }
    };
    if args.plan {
        let _ = manager.set_mode(&conversation_id, true).await;
    }

    let instructions = load_instructions(&config, &working_dir);
    let task_runner: Arc<dyn niffler_core::tools::task::TaskRunner> = Arc::new(ChildTaskRunner::new(
        working_dir.clone(),
        config.clone(),
        default_model_nickname.clone(),
    ));
    let registry = build_registry(&working_dir, None, Some(agents_dir), Some(task_runner)).await;
    let tool_schemas = registry.list().await;

    let fabric = ChannelFabric::new();
    let (cli, api_ep, tool_ep, _api_req_rx, mut stream_rx, tool_req_rx, mut tool_resp_rx, mut confirm_req_rx, confirm_resp_rx, _shutdown) =
        fabric.split();

    let mut tool_worker = ToolWorker::new(registry, tool_req_rx, tool_ep.tool_responses, tool_ep.confirm_requests, confirm_resp_rx);
    let shared_tool_ctx = Arc::new(Mutex::new(None));
    let ctx_reader = tool_ctx_reader(shared_tool_ctx.clone());
    tokio::spawn(async move {
        tool_worker.run(ctx_reader).await;
    });

    let confirm_responses = cli.confirm_responses.clone();
    tokio::spawn(async move {
        use std::io::Write;
        let mut reader = tokio::io::BufReader::new(tokio::io::stdin());
        while let Some(request) = confirm_req_rx.recv().await {
            print!("confirm `{}`: {} [y/N] ", request.tool_name, request.summary);
            let _ = std::io::stdout().flush();
            let mut line = String::new();
            let approved = tokio::io::AsyncBufReadExt::read_line(&mut reader, &mut line)
                .await
                .map(|_| line.trim().eq_ignore_ascii_case("y"))
                .unwrap_or(false);
            let _ = confirm_responses
                .send(ConfirmResponse { id: request.id, approved })
                .await;
        }
    });

    tokio::spawn(async move {
        use niffler_core::stream::StreamEvent;
        use std::io::Write;
        while let Some(event) = stream_rx.recv().await {
            match event {
                StreamEvent::ContentDelta { text } => {
                    print!("{text}");
                    let _ = std::io::stdout().flush();
                }
                StreamEvent::Done { .. } => println!(),
                StreamEvent::Error { message } => eprintln!("\nstream error: {message}"),
                _ => {}
            }
        }
    });

    let api_worker = ApiWorker::new(api_ep.stream_events, api_ep.tool_requests);
    let turn_runner = TurnRunner::new(api_worker);

    let session = Session {
        conversation_id: Mutex::new(conversation_id),
        config: config.clone(),
        manager: manager.clone(),
        correction_table: Arc::new(TokenCorrectionTable::new()),
        current_model: Mutex::new(initial_model),
        plan_mode: Mutex::new(args.plan),
        db_path: db_path.display().to_string(),
        shared_tool_ctx,
        tool_schemas,
    };

    let template_ctx = TemplateContext {
        available_tools: repl::top_level_tool_names().into_iter().collect(),
        current_dir: working_dir.display().to_string(),
        current_time: chrono::Utc::now().to_rfc3339(),
        os_info: std::env::consts::OS.to_string(),
        git_info: None,
        project_info: None,
    };
    let mode_system_prompt = || render_mode_prompt(&instructions, *session.plan_mode.lock().unwrap(), &template_ctx);

    if let Some(ref text) = message {
        match run_turn(&session, &turn_runner, &mode_system_prompt(), text, &mut tool_resp_rx).await {
            Ok(reply) => println!("{reply}"),
            Err(e) => {
                eprintln!("niffler: {e}");
                std::process::exit(1);
            }
        }
        return;
    }

    if let Err(e) = repl::run_repl_loop(&session, &turn_runner, mode_system_prompt, &mut tool_resp_rx).await {
        eprintln!("niffler: {e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_config_path_prefers_explicit_flag_over_default() {
        let args = Args {
            message: None,
            rest: vec![],
            config: Some(PathBuf::from("/tmp/custom.yaml")),
            working_dir: None,
            agents_dir: None,
            model: None,
            plan: false,
        };
        assert_eq!(resolve_config_path(&args), PathBuf::from("/tmp/custom.yaml"));
    }

    #[test]
    fn render_mode_prompt_selects_plan_section_in_plan_mode() {
        let instructions = InstructionFile {
            common: Some("Be helpful.".to_string()),
            plan_mode: Some("No edits.".to_string()),
            code_mode: Some("Edit freely.".to_string()),
        };
        let ctx = TemplateContext::default();
        let rendered = render_mode_prompt(&instructions, true, &ctx);
        assert!(rendered.contains("No edits."));
        assert!(!rendered.contains("Edit freely."));
    }

    #[test]
    fn load_instructions_merges_multiple_files_keeping_first_match_per_section() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("a.md"),
            "# Common System Prompt\nFrom A.\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("b.md"),
            "# Common System Prompt\nFrom B.\n\n# Plan Mode Prompt\nPlan from B.\n",
        )
        .unwrap();
        let mut config = NifflerConfig::default();
        config.instruction_files = vec!["a.md".to_string(), "b.md".to_string()];
        let merged = load_instructions(&config, dir.path());
        assert_eq!(merged.common.as_deref(), Some("From A."));
        assert_eq!(merged.plan_mode.as_deref(), Some("Plan from B."));
    }
}
