//! Rig LLM client adapter.
//!
//! Wraps Rig's prompt API for integration with our LlmClient trait. Rig's
//! agent prompt is text-in/text-out, so the tool catalog and the reply
//! contract are rendered into the prompt and tool calls come back as text
//! for the controller's response parser.

use async_trait::async_trait;

use bouncer_core::{
    traits::{ChatMessage, ChatRequest, LlmClient, LlmResponse, LlmUsage, ToolChoice},
    types::ToolDefinition,
    Error, Result,
};

// Import required Rig traits
use rig::client::{CompletionClient, ProviderClient};
use rig::completion::Prompt;

/// Provider type for Rig clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RigProvider {
    OpenAI,
    Anthropic,
}

impl RigProvider {
    /// Parse a provider name from configuration.
    pub fn parse(name: &str) -> Result<Self> {
        match name.trim().to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "anthropic" => Ok(Self::Anthropic),
            other => Err(Error::config(format!("Unsupported model provider '{}'", other))),
        }
    }

    /// Environment variable holding the provider's API key.
    pub fn api_key_var(&self) -> &'static str {
        match self {
            Self::OpenAI => "OPENAI_API_KEY",
            Self::Anthropic => "ANTHROPIC_API_KEY",
        }
    }
}

/// Configuration for Rig client.
#[derive(Debug, Clone)]
pub struct RigConfig {
    /// Provider to use.
    pub provider: RigProvider,
    /// Model name.
    pub model: String,
    /// Temperature used when a request does not set one.
    pub temperature: Option<f32>,
}

impl Default for RigConfig {
    fn default() -> Self {
        Self {
            provider: RigProvider::OpenAI,
            model: "gpt-4o-mini".to_string(),
            temperature: Some(0.7),
        }
    }
}

impl RigConfig {
    /// Create config for OpenAI.
    pub fn openai(model: impl Into<String>) -> Self {
        Self {
            provider: RigProvider::OpenAI,
            model: model.into(),
            ..Default::default()
        }
    }

    /// Create config for Anthropic.
    pub fn anthropic(model: impl Into<String>) -> Self {
        Self {
            provider: RigProvider::Anthropic,
            model: model.into(),
            ..Default::default()
        }
    }

    /// Set temperature.
    pub fn with_temperature(mut self, temp: f32) -> Self {
        self.temperature = Some(temp);
        self
    }
}

/// Rig-based LLM client.
pub struct RigLlmClient {
    config: RigConfig,
}

impl RigLlmClient {
    /// Create a new Rig client with the given configuration.
    pub fn new(config: RigConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RigConfig {
        &self.config
    }

    fn render_tools(tools: &[ToolDefinition]) -> String {
        tools
            .iter()
            .map(|tool| {
                format!(
                    "- {}: {}\n  parameters: {}",
                    tool.name, tool.description, tool.parameters
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Split a request into the preamble and the conversation prompt.
    pub(crate) fn build_prompt(request: &ChatRequest) -> (Option<String>, String) {
        let mut preamble: Vec<&str> = Vec::new();
        let mut prompt = String::new();

        for msg in &request.messages {
            match msg.role.as_str() {
                "system" => preamble.push(&msg.content),
                "user" => prompt.push_str(&format!("User: {}\n\n", msg.content)),
                "assistant" => prompt.push_str(&Self::render_assistant(msg)),
                "tool" => prompt.push_str(&format!(
                    "Tool Result [{}]: {}\n\n",
                    msg.tool_call_id.as_deref().unwrap_or("-"),
                    msg.content
                )),
                _ => prompt.push_str(&format!("{}: {}\n\n", msg.role, msg.content)),
            }
        }

        if !request.tools.is_empty() && request.tool_choice != ToolChoice::None {
            prompt.push_str(&format!(
                "AVAILABLE TOOLS:\n{}\n\n\
                 To call one or more tools, reply with ONLY a JSON object of the form \
                 {{\"tool_calls\": [{{\"name\": \"<tool>\", \"arguments\": {{...}}}}]}}.\n\
                 When you have everything you need, reply with FINAL ANSWER: <answer>.\n\n",
                Self::render_tools(&request.tools)
            ));
        }
        if request.json_response {
            prompt.push_str("Respond with a single JSON object and nothing else.\n\n");
        }
        prompt.push_str("Assistant:");

        let preamble = if preamble.is_empty() {
            None
        } else {
            Some(preamble.join("\n\n"))
        };
        (preamble, prompt)
    }

    fn render_assistant(msg: &ChatMessage) -> String {
        if msg.tool_calls.is_empty() {
            return format!("Assistant: {}\n\n", msg.content);
        }
        let calls: Vec<serde_json::Value> = msg
            .tool_calls
            .iter()
            .map(|call| serde_json::json!({ "id": call.id, "name": call.name, "arguments": call.arguments }))
            .collect();
        format!(
            "Assistant: {}\n\n",
            serde_json::json!({ "tool_calls": calls })
        )
    }

    fn check_key(&self) -> Result<()> {
        let var = self.config.provider.api_key_var();
        match std::env::var(var) {
            Ok(key) if !key.trim().is_empty() => Ok(()),
            _ => Err(Error::authentication(format!("{} not set", var))),
        }
    }

    fn map_provider_error(&self, message: String) -> Error {
        let lower = message.to_lowercase();
        if lower.contains("401")
            || lower.contains("unauthorized")
            || lower.contains("invalid_api_key")
            || lower.contains("invalid api key")
            || lower.contains("authentication")
        {
            Error::authentication(message)
        } else {
            Error::model_provider(format!("{:?} error: {}", self.config.provider, message))
        }
    }

    async fn call(&self, preamble: Option<&str>, prompt: &str, temperature: Option<f32>) -> Result<String> {
        use rig::providers::{anthropic, openai};

        self.check_key()?;
        let temperature = temperature.or(self.config.temperature);

        // Each arm builds its own agent type.
        let result = match self.config.provider {
            RigProvider::OpenAI => {
                let client = openai::Client::from_env();
                let mut builder = client.agent(&self.config.model);
                if let Some(system) = preamble {
                    builder = builder.preamble(system);
                }
                if let Some(t) = temperature {
                    builder = builder.temperature(t as f64);
                }
                builder.build().prompt(prompt).await
            }
            RigProvider::Anthropic => {
                let client = anthropic::Client::from_env();
                // Anthropic rejects requests without an explicit token cap.
                let mut builder = client.agent(&self.config.model).max_tokens(4096);
                if let Some(system) = preamble {
                    builder = builder.preamble(system);
                }
                if let Some(t) = temperature {
                    builder = builder.temperature(t as f64);
                }
                builder.build().prompt(prompt).await
            }
        };

        result.map_err(|e| self.map_provider_error(e.to_string()))
    }

    fn response(prompt_len: usize, content: String) -> LlmResponse {
        LlmResponse {
            usage: LlmUsage {
                prompt_tokens: (prompt_len / 4) as u64,
                completion_tokens: (content.len() / 4) as u64,
                total_tokens: ((prompt_len + content.len()) / 4) as u64,
            },
            ..LlmResponse::text(content)
        }
    }
}

#[async_trait]
impl LlmClient for RigLlmClient {
    async fn complete(&self, prompt: &str) -> Result<LlmResponse> {
        tracing::debug!(
            provider = ?self.config.provider,
            model = %self.config.model,
            prompt_len = prompt.len(),
            "Calling LLM"
        );

        let content = self.call(None, prompt, None).await?;
        Ok(Self::response(prompt.len(), content))
    }

    async fn chat(&self, request: &ChatRequest) -> Result<LlmResponse> {
        let (preamble, prompt) = Self::build_prompt(request);

        tracing::debug!(
            provider = ?self.config.provider,
            model = %self.config.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            prompt_len = prompt.len(),
            "Calling LLM"
        );

        let content = self
            .call(preamble.as_deref(), &prompt, request.temperature)
            .await?;
        Ok(Self::response(prompt.len(), content))
    }
}
