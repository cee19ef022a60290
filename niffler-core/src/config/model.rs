//! Per-model configuration entry (spec §6 "models[]").

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasoningLevel {
    Off,
    Low,
    Medium,
    High,
}

impl Default for ReasoningLevel {
    fn default() -> Self {
        ReasoningLevel::Off
    }
}

/// Whether reasoning/thinking content is shown to the user, logged only, or
/// entirely suppressed before it reaches the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasoningVisibility {
    Visible,
    LogOnly,
    Hidden,
}

impl Default for ReasoningVisibility {
    fn default() -> Self {
        ReasoningVisibility::Visible
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub nickname: String,
    pub model_id: String,
    pub base_url: String,
    pub api_env_var: String,
    pub context: u32,
    pub max_tokens: u32,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub top_p: Option<f32>,
    #[serde(default)]
    pub reasoning_level: ReasoningLevel,
    #[serde(default)]
    pub reasoning_visibility: ReasoningVisibility,
    pub input_cost_per_m_token: f64,
    pub output_cost_per_m_token: f64,
    pub reasoning_cost_per_m_token: f64,
    #[serde(default)]
    pub thinking_budget: Option<u32>,
}

impl ModelConfig {
    /// Reads the provider API key from the environment variable this model
    /// is configured to use.
    pub fn api_key(&self) -> Result<String, crate::error::ConfigError> {
        std::env::var(&self.api_env_var)
            .map_err(|_| crate::error::ConfigError::MissingEnvVar(self.api_env_var.clone()))
    }

    /// A minimal, deterministic model config for unit tests that need a
    /// well-formed `ModelConfig` but don't exercise provider-specific fields.
    pub fn default_for_test() -> Self {
        Self {
            nickname: "test-model".to_string(),
            model_id: "test-model-v1".to_string(),
            base_url: "https://example.invalid".to_string(),
            api_env_var: "NIFFLER_TEST_API_KEY".to_string(),
            context: 200_000,
            max_tokens: 4096,
            temperature: None,
            top_p: None,
            reasoning_level: ReasoningLevel::Off,
            reasoning_visibility: ReasoningVisibility::Visible,
            input_cost_per_m_token: 1.0,
            output_cost_per_m_token: 1.0,
            reasoning_cost_per_m_token: 1.0,
            thinking_budget: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_key_reads_configured_env_var() {
        std::env::set_var("NIFFLER_MODEL_TEST_VAR", "secret-value");
        let mut model = ModelConfig::default_for_test();
        model.api_env_var = "NIFFLER_MODEL_TEST_VAR".to_string();
        assert_eq!(model.api_key().unwrap(), "secret-value");
        std::env::remove_var("NIFFLER_MODEL_TEST_VAR");
    }

    #[test]
    fn missing_env_var_is_reported() {
        let mut model = ModelConfig::default_for_test();
        model.api_env_var = "NIFFLER_DEFINITELY_UNSET_VAR".to_string();
        assert!(model.api_key().is_err());
    }
}
