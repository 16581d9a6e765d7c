use serde::{Deserialize, Serialize};

use crate::{Error, Result};

// =============================================================================
// Agent Specification
// =============================================================================

/// Declarative definition of a specialist agent.
///
/// Specs are immutable once handed to the factory; editing a team member
/// produces a new spec and re-instantiates the agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentSpec {
    /// Human label, unique within a team.
    pub name: String,
    /// Short job title.
    pub role: String,
    /// Detailed behavioral instructions.
    pub description: String,
}

impl AgentSpec {
    pub fn new(
        name: impl Into<String>,
        role: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            role: role.into(),
            description: description.into(),
        }
    }

    /// Reject specs with blank fields.
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("name", &self.name),
            ("role", &self.role),
            ("description", &self.description),
        ] {
            if value.trim().is_empty() {
                return Err(Error::invalid_request(format!(
                    "agent {} must not be empty",
                    field
                )));
            }
        }
        Ok(())
    }
}

/// Full replacement of the team member at `index`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentPatch {
    pub index: usize,
    pub name: String,
    pub role: String,
    pub description: String,
}

impl AgentPatch {
    pub fn into_spec(self) -> (usize, AgentSpec) {
        (
            self.index,
            AgentSpec {
                name: self.name,
                role: self.role,
                description: self.description,
            },
        )
    }
}

/// One line of the coordinator's roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    /// Delegation tool name the coordinator calls.
    pub name: String,
    pub role: String,
}

// =============================================================================
// Team Files
// =============================================================================

#[derive(Serialize)]
struct TeamFile<'a> {
    team_members: &'a [AgentSpec],
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TeamDocument {
    Wrapped { team_members: Vec<AgentSpec> },
    Bare(Vec<AgentSpec>),
}

/// Parse a team definition from YAML or JSON.
///
/// Accepts either `team_members: [...]` or a bare list of members.
pub fn parse_team(content: &str) -> Result<Vec<AgentSpec>> {
    let doc: TeamDocument = serde_yaml::from_str(content)
        .map_err(|e| Error::config(format!("Invalid team definition: {}", e)))?;
    let members = match doc {
        TeamDocument::Wrapped { team_members } => team_members,
        TeamDocument::Bare(members) => members,
    };
    if members.is_empty() {
        return Err(Error::config("Team definition contains no members"));
    }
    Ok(members)
}

/// Render a team in the wrapped `team_members:` YAML form `parse_team` reads.
pub fn team_to_yaml(specs: &[AgentSpec]) -> Result<String> {
    serde_yaml::to_string(&TeamFile {
        team_members: specs,
    })
    .map_err(|e| Error::internal(format!("Failed to render team: {}", e)))
}
