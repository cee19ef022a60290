//! Run config summary: printable sections for the CLI's `/config` command
//! (spec §6 "CLI surface"). Mirrors the section-trait-plus-aggregate shape
//! the teacher uses for its own run config summary.

use std::io::Write;

use super::{ModelConfig, NifflerConfig};

/// One block of run config (model, tools, storage) for display.
pub trait ConfigSection: Send + Sync {
    /// Section label, e.g. `"Model"`, `"Tools"`, `"Storage"`.
    fn section_name(&self) -> &str;
    /// Key-value pairs in display order.
    fn entries(&self) -> Vec<(&'static str, String)>;
    /// Writes one line to `out` in the form `[section_name] k1=v1 k2=v2 ...`.
    fn print_to(&self, out: &mut impl Write) {
        let entries: Vec<String> = self
            .entries()
            .into_iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        let _ = writeln!(out, "[{}] {}", self.section_name(), entries.join(" "));
    }
}

pub struct ModelConfigSummary {
    pub nickname: String,
    pub model_id: String,
    pub context: u32,
    pub max_tokens: u32,
    pub reasoning_level: String,
}

impl ConfigSection for ModelConfigSummary {
    fn section_name(&self) -> &str {
        "Model"
    }
    fn entries(&self) -> Vec<(&'static str, String)> {
        vec![
            ("nickname", self.nickname.clone()),
            ("model_id", self.model_id.clone()),
            ("context", self.context.to_string()),
            ("max_tokens", self.max_tokens.to_string()),
            ("reasoning", self.reasoning_level.clone()),
        ]
    }
}

pub struct ToolsConfigSummary {
    pub enabled_tools: Vec<String>,
    pub mcp_servers: Vec<String>,
}

impl ConfigSection for ToolsConfigSummary {
    fn section_name(&self) -> &str {
        "Tools"
    }
    fn entries(&self) -> Vec<(&'static str, String)> {
        vec![
            ("enabled", self.enabled_tools.join(",")),
            ("mcp_servers", self.mcp_servers.join(",")),
        ]
    }
}

pub struct StorageConfigSummary {
    pub db_path: String,
    pub instruction_files: usize,
}

impl ConfigSection for StorageConfigSummary {
    fn section_name(&self) -> &str {
        "Storage"
    }
    fn entries(&self) -> Vec<(&'static str, String)> {
        vec![
            ("db_path", self.db_path.clone()),
            ("instruction_files", self.instruction_files.to_string()),
        ]
    }
}

/// Aggregated run config summary, printed one section per line.
pub struct RunConfigSummary {
    sections: Vec<Box<dyn ConfigSection>>,
}

impl RunConfigSummary {
    pub fn new() -> Self {
        Self { sections: vec![] }
    }

    pub fn with_section(mut self, section: Box<dyn ConfigSection>) -> Self {
        self.sections.push(section);
        self
    }

    pub fn sections(&self) -> &[Box<dyn ConfigSection>] {
        &self.sections
    }

    pub fn render(&self) -> String {
        let mut buf = Vec::new();
        for section in &self.sections {
            section.print_to(&mut buf);
        }
        String::from_utf8_lossy(&buf).into_owned()
    }
}

impl Default for RunConfigSummary {
    fn default() -> Self {
        Self::new()
    }
}

/// Builds the active-model, tools, and storage sections for one configured
/// model nickname, always including every built-in tool name since niffler
/// has no config-driven tool disabling beyond agent-scoped whitelists.
pub fn build_config_summary(config: &NifflerConfig, active_model: &ModelConfig, db_path: &str) -> RunConfigSummary {
    RunConfigSummary::new()
        .with_section(Box::new(ModelConfigSummary {
            nickname: active_model.nickname.clone(),
            model_id: active_model.model_id.clone(),
            context: active_model.context,
            max_tokens: active_model.max_tokens,
            reasoning_level: format!("{:?}", active_model.reasoning_level).to_lowercase(),
        }))
        .with_section(Box::new(ToolsConfigSummary {
            enabled_tools: vec![
                "read".into(), "list".into(), "edit".into(), "create".into(), "move".into(),
                "delete".into(), "glob".into(), "grep".into(), "bash".into(), "fetch".into(),
                "todolist".into(), "task".into(),
            ],
            mcp_servers: config.mcp_servers.keys().cloned().collect(),
        }))
        .with_section(Box::new(StorageConfigSummary {
            db_path: db_path.to_string(),
            instruction_files: config.instruction_files.len(),
        }))
}
