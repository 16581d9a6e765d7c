//! Turn limits and timeouts shared by the coordinator and specialists.

use std::time::Duration;

use bouncer_core::config::OrchestratorConfig;

/// Run limits configuration.
#[derive(Debug, Clone)]
pub struct RunLimits {
    /// Coordinator turns before the run fails.
    pub max_coordinator_turns: usize,
    /// Turns a specialist may take per delegated task.
    pub max_specialist_turns: usize,
    /// Bound on every model call.
    pub model_timeout: Duration,
    /// Bound on every primitive tool call.
    pub tool_timeout: Duration,
    /// Bound on a whole delegation.
    pub delegation_timeout: Duration,
    /// Bound on the tool-selection call.
    pub selection_timeout: Duration,
    /// Dispatch all delegations of one coordinator turn concurrently.
    pub parallel_delegations: bool,
}

impl Default for RunLimits {
    fn default() -> Self {
        Self::from(&OrchestratorConfig::default())
    }
}

impl From<&OrchestratorConfig> for RunLimits {
    fn from(config: &OrchestratorConfig) -> Self {
        Self {
            max_coordinator_turns: config.max_coordinator_turns,
            max_specialist_turns: config.max_specialist_turns,
            model_timeout: config.model_timeout(),
            tool_timeout: config.tool_timeout(),
            delegation_timeout: config.delegation_timeout(),
            selection_timeout: config.selection_timeout(),
            parallel_delegations: config.parallel_delegations,
        }
    }
}
