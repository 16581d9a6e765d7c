#![deny(unused)]
//! Model gateway for BiasBouncer.
//!
//! Builds `LlmClient`s for the three model roles (coordinator, specialist
//! and tool selection) from configuration.

pub mod rig_client;

pub use rig_client::{RigConfig, RigLlmClient, RigProvider};

use std::sync::Arc;

use bouncer_core::{config::ModelConfig, traits::LlmClient, Result};
use secrecy::ExposeSecret;

/// One client per model role.
pub struct ModelClients {
    pub coordinator: Arc<dyn LlmClient>,
    pub specialist: Arc<dyn LlmClient>,
    pub selection: Arc<dyn LlmClient>,
}

/// Configured keys that should be copied into the environment.
///
/// Keys already present in the environment (per `is_set`) win.
pub fn pending_key_exports(
    config: &ModelConfig,
    is_set: impl Fn(&str) -> bool,
) -> Vec<(&'static str, String)> {
    [
        ("OPENAI_API_KEY", config.openai_api_key.as_ref()),
        ("ANTHROPIC_API_KEY", config.anthropic_api_key.as_ref()),
    ]
    .into_iter()
    .filter_map(|(var, key)| Some((var, key?.expose_secret().clone())))
    .filter(|(var, key)| !key.trim().is_empty() && !is_set(*var))
    .collect()
}

/// Copy API keys from configuration into the environment Rig reads them from.
///
/// Mutates the process environment, so call it before the async runtime or
/// any other thread is started.
pub fn export_api_keys(config: &ModelConfig) {
    for (var, key) in pending_key_exports(config, |var| std::env::var_os(var).is_some()) {
        std::env::set_var(var, key);
    }
}

/// Create the role clients described by `config`.
pub fn create_clients(config: &ModelConfig) -> Result<ModelClients> {
    let provider = RigProvider::parse(&config.provider)?;
    let build = |model: &str, temperature: f32| -> Arc<dyn LlmClient> {
        Arc::new(RigLlmClient::new(RigConfig {
            provider,
            model: model.to_string(),
            temperature: Some(temperature),
        }))
    };

    tracing::info!(
        provider = ?provider,
        coordinator = %config.coordinator_model,
        specialist = %config.specialist_model,
        selection = %config.selection_model,
        "Model clients configured"
    );

    Ok(ModelClients {
        coordinator: build(&config.coordinator_model, config.temperature),
        specialist: build(&config.specialist_model, config.temperature),
        selection: build(&config.selection_model, 0.0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::Secret;

    #[test]
    fn test_unknown_provider_rejected() {
        let config = ModelConfig {
            provider: "mystery".into(),
            ..Default::default()
        };
        assert!(create_clients(&config).is_err());
        assert!(create_clients(&ModelConfig::default()).is_ok());
    }

    #[test]
    fn test_environment_keys_win_over_config() {
        let config = ModelConfig {
            openai_api_key: Some(Secret::new("sk-config".into())),
            anthropic_api_key: Some(Secret::new("  ".into())),
            ..Default::default()
        };

        let exports = pending_key_exports(&config, |_| false);
        assert_eq!(exports, vec![("OPENAI_API_KEY", "sk-config".to_string())]);

        assert!(pending_key_exports(&config, |var| var == "OPENAI_API_KEY").is_empty());
        assert!(pending_key_exports(&ModelConfig::default(), |_| false).is_empty());
    }
}
