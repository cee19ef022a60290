//! Process-wide configuration: models, instruction files, tool security, and
//! MCP server declarations, loaded once from YAML at startup (spec §6
//! "Configuration").

mod interpolate;
mod model;
pub mod summary;

pub use interpolate::interpolate_env;
pub use model::{ModelConfig, ReasoningLevel, ReasoningVisibility};
pub use summary::{build_config_summary, ConfigSection, RunConfigSummary};

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::ConfigError;

#[derive(Debug, Clone, Deserialize)]
pub struct TextExtractionConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default = "default_text_extraction_mode")]
    pub mode: TextExtractionMode,
    #[serde(default = "default_true")]
    pub fallback_to_builtin: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextExtractionMode {
    Url,
    Stdin,
}

fn default_text_extraction_mode() -> TextExtractionMode {
    TextExtractionMode::Stdin
}

fn default_true() -> bool {
    true
}

impl Default for TextExtractionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            command: None,
            mode: default_text_extraction_mode(),
            fallback_to_builtin: true,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToolSecurityConfig {
    #[serde(default)]
    pub allowed_fetch_schemes: Vec<String>,
    #[serde(default)]
    pub allowed_fetch_methods: Vec<String>,
    #[serde(default)]
    pub bash_timeout_max_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct McpServerConfig {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NifflerConfig {
    #[serde(default)]
    pub models: Vec<ModelConfig>,
    #[serde(default)]
    pub instruction_files: Vec<String>,
    #[serde(default)]
    pub text_extraction: TextExtractionConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub mcp_servers: HashMap<String, McpServerConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToolsConfig {
    #[serde(default)]
    pub security: ToolSecurityConfig,
}

impl NifflerConfig {
    /// Loads, interpolates, and parses the YAML config at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::NotFound(path.display().to_string()))?;
        Self::load_and_apply(&raw)
    }

    /// Interpolates `${VAR}` / `${VAR:-default}` references against the
    /// process environment, then parses the result as YAML.
    pub fn load_and_apply(raw: &str) -> Result<Self, ConfigError> {
        let interpolated = interpolate_env(raw, |var| std::env::var(var).ok())?;
        let config: NifflerConfig = serde_yaml::from_str(&interpolated)?;
        Ok(config)
    }

    pub fn model(&self, nickname: &str) -> Option<&ModelConfig> {
        self.models.iter().find(|m| m.nickname == nickname)
    }
}
