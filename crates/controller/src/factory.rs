//! Agent factory: spec in, configured specialist out.

use std::sync::Arc;

use bouncer_core::{
    traits::{LlmClient, Tool, ToolRegistry},
    types::AgentSpec,
    Result,
};

use crate::limits::RunLimits;
use crate::prompts::specialist_system_prompt;
use crate::selection::ToolSelector;
use crate::specialist::SpecialistAgent;

/// Builds specialists and binds their tools.
pub struct AgentFactory {
    registry: Arc<dyn ToolRegistry>,
    selector: Arc<dyn ToolSelector>,
    llm: Arc<dyn LlmClient>,
    limits: RunLimits,
}

impl AgentFactory {
    pub fn new(
        registry: Arc<dyn ToolRegistry>,
        selector: Arc<dyn ToolSelector>,
        llm: Arc<dyn LlmClient>,
        limits: RunLimits,
    ) -> Self {
        Self {
            registry,
            selector,
            llm,
            limits,
        }
    }

    pub fn limits(&self) -> &RunLimits {
        &self.limits
    }

    /// Create a specialist from `spec`.
    ///
    /// Tool selection never fails the call; only an invalid spec does.
    pub async fn create_agent(&self, spec: AgentSpec) -> Result<SpecialistAgent> {
        spec.validate()?;

        tracing::info!(agent = %spec.name, "Creating agent");
        let system_prompt = specialist_system_prompt(&spec);

        let catalog = self.registry.list().await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Tool registry unavailable; agent gets no tools");
            Vec::new()
        });
        let selected = self.selector.select_tools(&system_prompt, &catalog).await;

        for name in &selected {
            if !catalog.iter().any(|tool| &tool.name == name) {
                tracing::debug!(agent = %spec.name, tool = %name, "Dropping unknown tool from selection");
            }
        }

        let mut tools: Vec<Arc<dyn Tool>> = Vec::new();
        for definition in catalog.iter().filter(|d| selected.contains(&d.name)) {
            match self.registry.get(&definition.name).await {
                Ok(tool) => tools.push(tool),
                Err(e) => tracing::debug!(tool = %definition.name, error = %e, "Selected tool vanished"),
            }
        }

        let agent = SpecialistAgent::new(spec, system_prompt, tools, self.llm.clone(), self.limits.clone());
        tracing::info!(agent = %agent.name(), tools = ?agent.tool_names(), "Agent created");
        Ok(agent)
    }
}
