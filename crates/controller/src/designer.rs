//! Team designer: turns a conversation about a goal into team specs, and
//! chat requests about one member into patches.
//!
//! The model is offered a single function (`create_team` or
//! `update_agent_details`). Replies go through the same `ResponseParser` as
//! agent turns, so structured and text-only providers both work.

use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

use bouncer_core::{
    traits::{ChatMessage, ChatRequest, LlmClient},
    types::{parse_team, AgentPatch, AgentSpec, ToolCall, ToolDefinition},
    Error, Result,
};

use crate::parser::{strip_code_fence, ParsedReply, ResponseParser};
use crate::prompts::{
    member_edit_prompt, CREATE_TEAM_FUNCTION, TEAM_DESIGN_PROMPT, UPDATE_AGENT_FUNCTION,
};

/// Outcome of one design turn.
#[derive(Debug, Clone, PartialEq)]
pub enum DesignReply {
    /// The model created a team.
    Team(Vec<AgentSpec>),
    /// The model answered in text, usually a clarifying question.
    Message(String),
}

/// Outcome of one edit turn.
#[derive(Debug, Clone, PartialEq)]
pub enum EditReply {
    /// The model asked to replace the member.
    Patch(AgentPatch),
    /// The model answered in text.
    Message(String),
}

#[derive(Deserialize)]
struct CreateTeamArgs {
    team_members: Vec<AgentSpec>,
}

#[derive(Deserialize)]
struct UpdateAgentArgs {
    #[serde(default)]
    index: Option<usize>,
    name: String,
    role: String,
    description: String,
}

fn create_team_definition() -> ToolDefinition {
    let member = json!({
        "type": "object",
        "properties": {
            "name": {"type": "string", "description": "The name of the team member."},
            "role": {"type": "string", "description": "The member's specific role or job title."},
            "description": {
                "type": "string",
                "description": "A detailed, multi-point description formatted as a markdown bulleted list."
            }
        },
        "required": ["name", "role", "description"]
    });
    ToolDefinition {
        name: CREATE_TEAM_FUNCTION.into(),
        description: "Creates a team of AI agents with the given names, roles and descriptions.".into(),
        parameters: json!({
            "type": "object",
            "properties": {
                "team_members": {"type": "array", "description": "The team members.", "items": member}
            },
            "required": ["team_members"]
        }),
    }
}

fn update_agent_definition() -> ToolDefinition {
    ToolDefinition {
        name: UPDATE_AGENT_FUNCTION.into(),
        description: "Replaces the details of a single team member.".into(),
        parameters: json!({
            "type": "object",
            "properties": {
                "index": {"type": "integer", "description": "Index of the member to update."},
                "name": {"type": "string", "description": "The new name of the member."},
                "role": {"type": "string", "description": "The new role of the member."},
                "description": {
                    "type": "string",
                    "description": "The new description, as a markdown bulleted list."
                }
            },
            "required": ["index", "name", "role", "description"]
        }),
    }
}

/// Check a designed team before it reaches the session.
fn validate_team(members: Vec<AgentSpec>) -> Result<Vec<AgentSpec>> {
    if members.is_empty() {
        return Err(Error::invalid_request("designed team has no members"));
    }
    for member in &members {
        member.validate()?;
    }
    Ok(members)
}

fn find_call<'a>(calls: &'a [ToolCall], function: &str) -> Result<&'a ToolCall> {
    calls.iter().find(|call| call.name == function).ok_or_else(|| {
        let called: Vec<&str> = calls.iter().map(|c| c.name.as_str()).collect();
        Error::invalid_request(format!(
            "expected a call to '{}', model called {:?}",
            function, called
        ))
    })
}

/// Designs and edits teams through a chat model.
pub struct TeamDesigner {
    llm: Arc<dyn LlmClient>,
    timeout: Duration,
}

impl TeamDesigner {
    pub fn new(llm: Arc<dyn LlmClient>, timeout: Duration) -> Self {
        Self { llm, timeout }
    }

    /// One design turn over the user/assistant `conversation` so far.
    pub async fn design(&self, conversation: &[ChatMessage]) -> Result<DesignReply> {
        let mut messages = vec![ChatMessage::system(TEAM_DESIGN_PROMPT)];
        messages.extend_from_slice(conversation);
        let request = ChatRequest::new(messages).with_tools(vec![create_team_definition()]);

        match self.call(&request).await? {
            ParsedReply::ToolCalls(calls) => {
                let call = find_call(&calls, CREATE_TEAM_FUNCTION)?;
                let args: CreateTeamArgs = serde_json::from_value(call.arguments.clone())
                    .map_err(|e| Error::invalid_request(format!("create_team arguments: {}", e)))?;
                let team = validate_team(args.team_members)?;
                tracing::info!(members = team.len(), "Team designed");
                Ok(DesignReply::Team(team))
            }
            ParsedReply::Final(text) => {
                // Some models put the team document in the reply body.
                let body = strip_code_fence(&text);
                if body.starts_with('{') || body.starts_with('[') {
                    if let Ok(team) = parse_team(body) {
                        let team = validate_team(team)?;
                        tracing::info!(members = team.len(), "Team designed from reply text");
                        return Ok(DesignReply::Team(team));
                    }
                }
                tracing::debug!(reply_len = text.len(), "Designer answered in text");
                Ok(DesignReply::Message(text))
            }
        }
    }

    /// One edit turn for member `index` of `team`.
    ///
    /// The patch always targets `index`, whatever index the model echoes.
    pub async fn edit(
        &self,
        team: &[AgentSpec],
        index: usize,
        conversation: &[ChatMessage],
    ) -> Result<EditReply> {
        let member = team.get(index).ok_or(Error::InvalidAgentIndex {
            index,
            len: team.len(),
        })?;

        let mut messages = vec![ChatMessage::system(member_edit_prompt(index, member))];
        messages.extend_from_slice(conversation);
        let request = ChatRequest::new(messages).with_tools(vec![update_agent_definition()]);

        match self.call(&request).await? {
            ParsedReply::ToolCalls(calls) => {
                let call = find_call(&calls, UPDATE_AGENT_FUNCTION)?;
                let args: UpdateAgentArgs = serde_json::from_value(call.arguments.clone())
                    .map_err(|e| {
                        Error::invalid_request(format!("update_agent_details arguments: {}", e))
                    })?;
                if args.index.is_some_and(|echoed| echoed != index) {
                    tracing::debug!(index, echoed = ?args.index, "Ignoring echoed member index");
                }

                let patch = AgentPatch {
                    index,
                    name: args.name,
                    role: args.role,
                    description: args.description,
                };
                patch.clone().into_spec().1.validate()?;
                tracing::info!(index, agent = %patch.name, "Member edit proposed");
                Ok(EditReply::Patch(patch))
            }
            ParsedReply::Final(text) => Ok(EditReply::Message(text)),
        }
    }

    async fn call(&self, request: &ChatRequest) -> Result<ParsedReply> {
        match tokio::time::timeout(self.timeout, self.llm.chat(request)).await {
            Ok(Ok(response)) => Ok(ResponseParser::parse(&response)),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(Error::timeout(format!(
                "team designer model call exceeded {}s",
                self.timeout.as_secs_f32()
            ))),
        }
    }
}

/// Arguments of a `create_team` call, for scripted replies and tests.
pub fn create_team_arguments(team: &[AgentSpec]) -> Value {
    json!({ "team_members": team })
}
