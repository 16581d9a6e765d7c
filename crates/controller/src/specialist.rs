//! Specialist agents and their tool loop.
//!
//! A specialist runs a short ReAct loop for each delegated task:
//! 1. Ask the model, offering only the agent's bound tools
//! 2. Execute any requested tool calls
//! 3. Feed the observations back
//! 4. Stop at the first final text or at the turn limit
//!
//! Tool failures are observations, not errors. Only model failures, the turn
//! limit and cancellation end a specialist run with `Err`.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use bouncer_core::{
    traits::{ChatMessage, ChatRequest, LlmClient, LlmResponse, Tool},
    types::{AgentSpec, ToolCall, ToolDefinition},
    Error, Result,
};

use crate::limits::RunLimits;
use crate::parser::{ParsedReply, ResponseParser};

/// A worker agent built from an [`AgentSpec`].
pub struct SpecialistAgent {
    spec: AgentSpec,
    system_prompt: String,
    tools: Vec<Arc<dyn Tool>>,
    llm: Arc<dyn LlmClient>,
    limits: RunLimits,
}

impl SpecialistAgent {
    pub fn new(
        spec: AgentSpec,
        system_prompt: String,
        tools: Vec<Arc<dyn Tool>>,
        llm: Arc<dyn LlmClient>,
        limits: RunLimits,
    ) -> Self {
        Self {
            spec,
            system_prompt,
            tools,
            llm,
            limits,
        }
    }

    pub fn spec(&self) -> &AgentSpec {
        &self.spec
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Names of the bound tools, in registry order.
    pub fn tool_names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.name().to_string()).collect()
    }

    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.definition()).collect()
    }

    /// Work on `task` in a fresh conversation and return the final text.
    pub async fn run(&self, task: &str, cancel: &CancellationToken) -> Result<String> {
        tracing::info!(agent = %self.spec.name, task_len = task.len(), "Specialist started");

        let tools = self.tool_definitions();
        let mut messages = vec![
            ChatMessage::system(self.system_prompt.clone()),
            ChatMessage::user(task),
        ];

        for turn in 1..=self.limits.max_specialist_turns {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let request = ChatRequest::new(messages.clone()).with_tools(tools.clone());
            let response = self.call_model(&request, cancel).await?;

            match ResponseParser::parse(&response) {
                ParsedReply::Final(text) => {
                    tracing::info!(
                        agent = %self.spec.name,
                        turns = turn,
                        answer_len = text.len(),
                        "Specialist finished"
                    );
                    return Ok(text);
                }
                ParsedReply::ToolCalls(calls) => {
                    tracing::debug!(agent = %self.spec.name, turn, calls = calls.len(), "Specialist tool calls");
                    messages.push(ChatMessage::assistant_with_calls(
                        response.content.clone(),
                        calls.clone(),
                    ));
                    for call in &calls {
                        let observation = self.invoke_tool(call).await;
                        messages.push(ChatMessage::tool_result(call, observation));
                    }
                }
            }
        }

        tracing::warn!(agent = %self.spec.name, limit = self.limits.max_specialist_turns, "Specialist turn limit reached");
        Err(Error::MaxTurnsExceeded(self.limits.max_specialist_turns))
    }

    async fn call_model(&self, request: &ChatRequest, cancel: &CancellationToken) -> Result<LlmResponse> {
        let timeout = self.limits.model_timeout;
        tokio::select! {
            _ = cancel.cancelled() => Err(Error::Cancelled),
            result = tokio::time::timeout(timeout, self.llm.chat(request)) => match result {
                Ok(response) => response,
                Err(_) => Err(Error::timeout(format!(
                    "model call for '{}' exceeded {}s",
                    self.spec.name,
                    timeout.as_secs_f32()
                ))),
            },
        }
    }

    /// Execute one tool call and render the outcome as observation text.
    async fn invoke_tool(&self, call: &ToolCall) -> String {
        let Some(tool) = self.tools.iter().find(|t| t.name() == call.name) else {
            tracing::warn!(agent = %self.spec.name, tool = %call.name, "Unbound tool requested");
            return format!(
                "Error: tool '{}' is not available. Available tools: {}",
                call.name,
                self.tool_names().join(", ")
            );
        };

        tracing::info!(agent = %self.spec.name, tool = %call.name, "Executing tool call");
        match tokio::time::timeout(self.limits.tool_timeout, tool.execute(call.arguments.clone())).await {
            Ok(Ok(output)) if output.success => {
                format!("Tool '{}' succeeded:\n{}", call.name, output.content)
            }
            Ok(Ok(output)) => format!("Tool '{}' failed:\n{}", call.name, output.content),
            Ok(Err(e)) => {
                tracing::warn!(agent = %self.spec.name, tool = %call.name, error = %e, "Tool failed");
                format!("Error: tool '{}' failed: {}", call.name, e)
            }
            Err(_) => {
                tracing::warn!(agent = %self.spec.name, tool = %call.name, "Tool timed out");
                format!(
                    "Error: tool '{}' timed out after {}s",
                    call.name,
                    self.limits.tool_timeout.as_secs_f32()
                )
            }
        }
    }
}

impl std::fmt::Debug for SpecialistAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpecialistAgent")
            .field("name", &self.spec.name)
            .field("tools", &self.tool_names())
            .finish()
    }
}
