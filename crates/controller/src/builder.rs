//! Builder for TeamSession.

use std::sync::Arc;

use bouncer_core::{
    config::OrchestratorConfig,
    traits::{LlmClient, ToolRegistry},
    Error, Result,
};

use crate::factory::AgentFactory;
use crate::limits::RunLimits;
use crate::orchestrator::Orchestrator;
use crate::selection::{LlmToolSelector, ToolSelector};
use crate::session::TeamSession;

/// Builder for constructing a TeamSession.
#[derive(Default)]
pub struct SessionBuilder {
    limits: RunLimits,
    registry: Option<Arc<dyn ToolRegistry>>,
    selector: Option<Arc<dyn ToolSelector>>,
    coordinator_llm: Option<Arc<dyn LlmClient>>,
    specialist_llm: Option<Arc<dyn LlmClient>>,
    selection_llm: Option<Arc<dyn LlmClient>>,
}

impl SessionBuilder {
    /// Create a new builder with default limits.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set limits directly.
    pub fn with_limits(mut self, limits: RunLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Take limits from the `[orchestrator]` config section.
    pub fn with_config(self, config: &OrchestratorConfig) -> Self {
        self.with_limits(RunLimits::from(config))
    }

    /// Set the tool registry specialists draw from.
    pub fn with_registry(mut self, registry: Arc<dyn ToolRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Override the tool-selection policy.
    pub fn with_selector(mut self, selector: Arc<dyn ToolSelector>) -> Self {
        self.selector = Some(selector);
        self
    }

    /// Use one client for every role.
    pub fn with_llm(mut self, llm: Arc<dyn LlmClient>) -> Self {
        self.coordinator_llm = Some(llm.clone());
        self.specialist_llm = Some(llm.clone());
        self.selection_llm = Some(llm);
        self
    }

    pub fn with_coordinator_llm(mut self, llm: Arc<dyn LlmClient>) -> Self {
        self.coordinator_llm = Some(llm);
        self
    }

    pub fn with_specialist_llm(mut self, llm: Arc<dyn LlmClient>) -> Self {
        self.specialist_llm = Some(llm);
        self
    }

    /// Client for the default selector; falls back to the specialist client.
    pub fn with_selection_llm(mut self, llm: Arc<dyn LlmClient>) -> Self {
        self.selection_llm = Some(llm);
        self
    }

    /// Build the TeamSession.
    pub fn build(self) -> Result<TeamSession> {
        let registry = self
            .registry
            .ok_or_else(|| Error::config("session needs a tool registry"))?;
        let coordinator_llm = self
            .coordinator_llm
            .ok_or_else(|| Error::config("session needs a coordinator model"))?;
        let specialist_llm = self
            .specialist_llm
            .ok_or_else(|| Error::config("session needs a specialist model"))?;

        let selector: Arc<dyn ToolSelector> = match self.selector {
            Some(selector) => selector,
            None => {
                let llm = self.selection_llm.unwrap_or_else(|| specialist_llm.clone());
                Arc::new(LlmToolSelector::new(llm, self.limits.selection_timeout))
            }
        };

        let factory = AgentFactory::new(registry, selector, specialist_llm, self.limits.clone());
        let orchestrator = Orchestrator::new(coordinator_llm, self.limits);
        Ok(TeamSession::new(factory, orchestrator))
    }
}
