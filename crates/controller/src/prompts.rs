//! Prompt templates for specialists, the coordinator and tool selection.
//!
//! Templates are plain `format!` strings: the same inputs always render the
//! same prompt, which keeps agent construction reproducible.

use bouncer_core::types::{AgentSpec, RosterEntry, ToolDefinition};

/// Marker that precedes the role line in every specialist prompt.
pub const ROLE_DELIMITER: &str = "Your designated role is: ";

/// Render a specialist's system prompt from its spec.
pub fn specialist_system_prompt(spec: &AgentSpec) -> String {
    format!(
        "You are a specialized AI agent named '{name}'.\n\
         {ROLE_DELIMITER}{role}.\n\
         \n\
         Your primary objective and methodology are defined by the following detailed instructions:\n\
         {description}\n\
         \n\
         You must strictly adhere to these instructions to fulfill your role in the team.\n\
         If a task falls outside your role, say so plainly instead of improvising.\n",
        name = spec.name,
        role = spec.role,
        description = spec.description,
    )
}

/// Prompt asking the selection model which tools an agent needs.
pub fn tool_selection_prompt(instructions: &str, catalog: &[ToolDefinition]) -> String {
    let tools = catalog
        .iter()
        .map(|tool| format!("- {}: {}", tool.name, tool.description))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Given the following agent's instructions and a list of available tools, \
         select the tools that are most relevant for the agent to perform its duties.\n\
         \n\
         **Agent Instructions:**\n\
         ---\n\
         {instructions}\n\
         ---\n\
         \n\
         **Available Tools:**\n\
         ---\n\
         {tools}\n\
         ---\n\
         \n\
         Respond with a JSON object containing a single key \"tools\" which is a list of \
         the names of the recommended tools. For example: {{\"tools\": [\"web_search\", \"write_to_file\"]}}\n"
    )
}

/// Render the roster block shown to the coordinator.
pub fn roster_lines(roster: &[RosterEntry]) -> String {
    roster
        .iter()
        .map(|entry| format!("- **{}**: {}", entry.name, entry.role))
        .collect::<Vec<_>>()
        .join("\n")
}

/// System prompt for the Project Manager.
pub fn coordinator_system_prompt(roster: &[RosterEntry]) -> String {
    format!(
        "You are the Project Manager, a master AI agent responsible for coordinating a team \
         of specialist agents.\n\
         Your primary goal is to achieve the user's objective by breaking it down into logical \
         sub-tasks and delegating them to the appropriate team member.\n\
         \n\
         Here are your team members and their roles:\n\
         {team}\n\
         \n\
         **Your Core Responsibilities:**\n\
         1. **Analyze the Goal:** Carefully review the user's request to fully understand the desired outcome.\n\
         2. **Formulate a Plan:** Create a step-by-step plan to achieve the goal.\n\
         3. **Delegate Tasks:** For each step, identify the most suitable agent from your team and call \
         them using their designated tool. Give them all the context and information they need.\n\
         4. **Synthesize Results:** After a team member completes a task, analyze their output. Decide \
         whether the task is complete or if another agent needs to continue the work.\n\
         5. **Report to User:** Your final response should be a comprehensive answer to the user's \
         original request, synthesized from the work of your team.\n\
         \n\
         You must exclusively use your team members (the provided tools) to accomplish the goal. \
         Do not attempt to answer directly without delegating. If a team member reports an error, \
         decide whether to retry, reassign the work or continue without it.\n",
        team = roster_lines(roster),
    )
}

/// Function the team designer must call to produce a team.
pub const CREATE_TEAM_FUNCTION: &str = "create_team";

/// Function the member editor must call to apply a change.
pub const UPDATE_AGENT_FUNCTION: &str = "update_agent_details";

/// System prompt for designing a team from a user's goal.
pub const TEAM_DESIGN_PROMPT: &str = "\
You are BiasBouncer, an assistant that designs diversified teams of AI agents for a user's task.
Ask at most two short clarifying questions, and only when the goal is genuinely unclear. \
If the user wants a team right away, build it without asking.
Once you have enough information you MUST call the `create_team` function. Make sure some \
roles exist to challenge assumptions and counter bias (for example a 'Red Teamer' or an \
'Ethics Auditor').

Write every member's description as a markdown bulleted list (`- point`) covering at least:
- its role and core responsibilities in more detail
- how it will carry out its tasks (its methodology)
- what the ideal outcome of its work looks like

Never list the team in plain text; create it with the function.
";

/// System prompt for editing member `index` of a team through chat.
pub fn member_edit_prompt(index: usize, member: &AgentSpec) -> String {
    format!(
        "You are helping a user refine one member of an AI agent team.\n\
         \n\
         Team member #{index}:\n\
         - name: {name}\n\
         - role: {role}\n\
         - description:\n\
         {description}\n\
         \n\
         When the user asks for a change you MUST call the `{function}` function with index \
         {index} and the complete new name, role and description, repeating unchanged fields \
         as they are. Do not only describe the change in text.\n\
         If the user just asks a question, answer in plain text and mention that you can edit \
         this member's details from the chat.\n",
        function = UPDATE_AGENT_FUNCTION,
        name = member.name,
        role = member.role,
        description = member.description,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_specialist_prompt_embeds_spec_verbatim() {
        let spec = AgentSpec::new(
            "Researcher",
            "Finds and verifies facts",
            "Search the web.\nCite every source.",
        );
        let prompt = specialist_system_prompt(&spec);

        assert!(prompt.contains("named 'Researcher'"));
        assert!(prompt.contains("Your designated role is: Finds and verifies facts.\n"));
        assert!(prompt.contains("Search the web.\nCite every source."));
        assert_eq!(prompt, specialist_system_prompt(&spec));
    }

    #[test]
    fn test_design_prompts() {
        assert!(TEAM_DESIGN_PROMPT.contains("`create_team`"));
        assert!(TEAM_DESIGN_PROMPT.contains("Red Teamer"));

        let member = AgentSpec::new("Writer", "Writes reports", "- draft\n- revise");
        let prompt = member_edit_prompt(2, &member);
        assert!(prompt.contains("Team member #2:"));
        assert!(prompt.contains("- role: Writes reports"));
        assert!(prompt.contains("- draft\n- revise"));
        assert!(prompt.contains("`update_agent_details`"));
    }

    #[test]
    fn test_selection_prompt_lists_catalog() {
        let catalog = vec![
            ToolDefinition {
                name: "web_search".into(),
                description: "Searches the web".into(),
                parameters: json!({}),
            },
            ToolDefinition {
                name: "read_file".into(),
                description: "Reads a file".into(),
                parameters: json!({}),
            },
        ];
        let prompt = tool_selection_prompt("Be a researcher", &catalog);

        assert!(prompt.contains("- web_search: Searches the web\n- read_file: Reads a file"));
        assert!(prompt.contains("Be a researcher"));
        assert!(prompt.contains("\"tools\""));
    }

    #[test]
    fn test_coordinator_prompt_contains_roster() {
        let roster = vec![
            RosterEntry {
                name: "Researcher".into(),
                role: "Finds facts".into(),
            },
            RosterEntry {
                name: "Writer".into(),
                role: "Writes prose".into(),
            },
        ];
        let prompt = coordinator_system_prompt(&roster);

        assert!(prompt.contains("- **Researcher**: Finds facts\n- **Writer**: Writes prose"));
        assert!(prompt.contains("Do not attempt to answer directly without delegating"));
    }
}
