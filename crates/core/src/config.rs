use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use secrecy::Secret;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub model: ModelConfig,
    pub orchestrator: OrchestratorConfig,
    pub tools: ToolsConfig,
    pub sandbox: SandboxSettings,
    pub logging: LoggingConfig,
    pub run: RunConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ModelConfig {
    /// "openai" or "anthropic".
    pub provider: String,
    pub coordinator_model: String,
    pub specialist_model: String,
    pub selection_model: String,
    pub temperature: f32,
    pub openai_api_key: Option<Secret<String>>,
    pub anthropic_api_key: Option<Secret<String>>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: "openai".into(),
            coordinator_model: "gpt-4o".into(),
            specialist_model: "gpt-4o".into(),
            selection_model: "gpt-4o-mini".into(),
            temperature: 0.7,
            openai_api_key: None,
            anthropic_api_key: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub max_coordinator_turns: usize,
    pub max_specialist_turns: usize,
    pub model_timeout_secs: u64,
    pub tool_timeout_secs: u64,
    pub delegation_timeout_secs: u64,
    pub selection_timeout_secs: u64,
    /// Run all delegations requested in one coordinator turn concurrently.
    pub parallel_delegations: bool,
}

impl OrchestratorConfig {
    pub fn model_timeout(&self) -> Duration {
        Duration::from_secs(self.model_timeout_secs)
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }

    pub fn delegation_timeout(&self) -> Duration {
        Duration::from_secs(self.delegation_timeout_secs)
    }

    pub fn selection_timeout(&self) -> Duration {
        Duration::from_secs(self.selection_timeout_secs)
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_coordinator_turns: 12,
            max_specialist_turns: 8,
            model_timeout_secs: 120,
            tool_timeout_secs: 60,
            delegation_timeout_secs: 600,
            selection_timeout_secs: 30,
            parallel_delegations: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ToolsConfig {
    /// Root directory the file tools are confined to.
    pub workspace_root: String,
    pub search_endpoint: String,
    pub search_max_results: usize,
    pub search_retries: u32,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            workspace_root: "./workspace".into(),
            search_endpoint: "https://api.duckduckgo.com/".into(),
            search_max_results: 5,
            search_retries: 2,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SandboxSettings {
    pub enabled: bool,
    pub image: String,
    pub memory_limit_mb: i64,
    pub timeout_secs: u64,
}

impl Default for SandboxSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            image: "python:3.12-slim".into(),
            memory_limit_mb: 512,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct LoggingConfig {
    pub json: bool,
    /// Overrides `RUST_LOG` when set.
    pub filter: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct RunConfig {
    pub team_file: Option<String>,
    pub goal: Option<String>,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("BIASBOUNCER_ENV").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(File::with_name("config/local").required(false))
            // Map APP__ORCHESTRATOR__MAX_COORDINATOR_TURNS=20 to orchestrator.max_coordinator_turns
            .add_source(Environment::with_prefix("APP").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.model.selection_model, "gpt-4o-mini");
        assert_eq!(cfg.tools.search_max_results, 5);
        assert!(!cfg.orchestrator.parallel_delegations);
        assert_eq!(cfg.orchestrator.tool_timeout(), Duration::from_secs(60));
    }

    #[test]
    fn test_partial_source_keeps_defaults() {
        let cfg: AppConfig = Config::builder()
            .add_source(config::File::from_str(
                "[orchestrator]\nmax_coordinator_turns = 3\n\n[logging]\njson = true\n",
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(cfg.orchestrator.max_coordinator_turns, 3);
        assert_eq!(cfg.orchestrator.max_specialist_turns, 8);
        assert!(cfg.logging.json);
        assert_eq!(cfg.model.provider, "openai");
    }
}
