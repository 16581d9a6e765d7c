//! The Project Manager agent.

use std::sync::Arc;
use std::time::Duration;

use bouncer_core::{
    traits::Tool,
    types::{RosterEntry, ToolDefinition},
};

use crate::delegation::{extract_role, wrap_as_tool, DelegationTool};
use crate::prompts::coordinator_system_prompt;
use crate::specialist::SpecialistAgent;

/// Role shown for a member whose prompt carries no role line.
const FALLBACK_ROLE: &str = "Specialist Agent";

/// Coordinator with one delegation tool per specialist, in team order.
pub struct CoordinatorAgent {
    system_prompt: String,
    roster: Vec<RosterEntry>,
    tools: Vec<DelegationTool>,
}

impl CoordinatorAgent {
    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn roster(&self) -> &[RosterEntry] {
        &self.roster
    }

    pub fn delegation_tools(&self) -> &[DelegationTool] {
        &self.tools
    }

    /// Delegation tool by name.
    pub fn tool(&self, name: &str) -> Option<&DelegationTool> {
        self.tools.iter().find(|t| t.name() == name)
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.name().to_string()).collect()
    }

    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.definition()).collect()
    }
}

/// Build the coordinator for a team.
pub fn build_coordinator(team: &[Arc<SpecialistAgent>], delegation_timeout: Duration) -> CoordinatorAgent {
    let tools: Vec<DelegationTool> = team
        .iter()
        .map(|agent| wrap_as_tool(agent.clone(), delegation_timeout))
        .collect();

    let roster: Vec<RosterEntry> = tools
        .iter()
        .map(|tool| RosterEntry {
            name: tool.name().to_string(),
            role: extract_role(tool.target().system_prompt())
                .unwrap_or_else(|| FALLBACK_ROLE.to_string()),
        })
        .collect();

    tracing::info!(members = roster.len(), tools = ?tools.iter().map(|t| t.name()).collect::<Vec<_>>(), "Coordinator built");

    CoordinatorAgent {
        system_prompt: coordinator_system_prompt(&roster),
        roster,
        tools,
    }
}
