//! Tool-selection policy.
//!
//! Decides which registry tools a new specialist receives. The policy is
//! total: every failure degrades to "no tools" and a warning.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use bouncer_core::{
    traits::{ChatMessage, ChatRequest, LlmClient},
    types::ToolDefinition,
    Error, Result,
};

use crate::parser::strip_code_fence;
use crate::prompts::tool_selection_prompt;

/// Chooses tool names for an agent from a catalog.
#[async_trait]
pub trait ToolSelector: Send + Sync {
    /// Names judged relevant. Never fails; may contain names outside the catalog.
    async fn select_tools(&self, instructions: &str, catalog: &[ToolDefinition]) -> BTreeSet<String>;
}

#[derive(Deserialize)]
struct SelectionReply {
    tools: Vec<String>,
}

/// Parse the selection model's JSON reply.
pub fn parse_selection(content: &str) -> Result<BTreeSet<String>> {
    let reply: SelectionReply = serde_json::from_str(strip_code_fence(content))
        .map_err(|e| Error::tool_selection(format!("unparseable reply: {}", e)))?;
    Ok(reply
        .tools
        .into_iter()
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .collect())
}

/// Selection by a single deterministic model call.
pub struct LlmToolSelector {
    llm: Arc<dyn LlmClient>,
    timeout: Duration,
}

impl LlmToolSelector {
    pub fn new(llm: Arc<dyn LlmClient>, timeout: Duration) -> Self {
        Self { llm, timeout }
    }

    async fn try_select(&self, instructions: &str, catalog: &[ToolDefinition]) -> Result<BTreeSet<String>> {
        let request = ChatRequest::new(vec![ChatMessage::user(tool_selection_prompt(
            instructions,
            catalog,
        ))])
        .with_temperature(0.0)
        .json();

        let response = tokio::time::timeout(self.timeout, self.llm.chat(&request))
            .await
            .map_err(|_| {
                Error::tool_selection(format!("timed out after {}s", self.timeout.as_secs_f32()))
            })?
            .map_err(|e| Error::tool_selection(e.to_string()))?;

        parse_selection(&response.content)
    }
}

#[async_trait]
impl ToolSelector for LlmToolSelector {
    async fn select_tools(&self, instructions: &str, catalog: &[ToolDefinition]) -> BTreeSet<String> {
        if catalog.is_empty() {
            return BTreeSet::new();
        }

        match self.try_select(instructions, catalog).await {
            Ok(tools) => {
                tracing::debug!(selected = ?tools, "Tools selected");
                tools
            }
            Err(e) => {
                tracing::warn!(error = %e, "Tool selection failed; the agent will have no tools");
                BTreeSet::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bouncer_core::mocks::{MockLlm, MockReply};
    use serde_json::json;

    fn catalog() -> Vec<ToolDefinition> {
        vec![ToolDefinition {
            name: "web_search".into(),
            description: "Searches the web".into(),
            parameters: json!({}),
        }]
    }

    #[test]
    fn test_parse_selection() {
        let names = parse_selection("```json\n{\"tools\": [\" web_search \", \"\"]}\n```").unwrap();
        assert_eq!(names.into_iter().collect::<Vec<_>>(), vec!["web_search"]);

        assert!(parse_selection("{\"picked\": []}").is_err());
        assert!(parse_selection("{\"tools\": [1, 2]}").is_err());
        assert!(parse_selection("web_search").is_err());
    }

    #[tokio::test]
    async fn test_select_uses_deterministic_json_request() {
        let llm = Arc::new(MockLlm::constant(r#"{"tools": ["web_search"]}"#));
        let selector = LlmToolSelector::new(llm.clone(), Duration::from_secs(5));

        let names = selector.select_tools("Research things", &catalog()).await;
        assert!(names.contains("web_search"));

        let requests = llm.requests();
        let request = &requests[0];
        assert_eq!(request.temperature, Some(0.0));
        assert!(request.json_response);
        assert!(request.tools.is_empty());
    }

    #[tokio::test]
    async fn test_failures_degrade_to_empty() {
        for reply in [
            MockReply::text("I think web_search would help"),
            MockReply::ModelError("overloaded".into()),
        ] {
            let llm = Arc::new(MockLlm::new(vec![reply]));
            let selector = LlmToolSelector::new(llm, Duration::from_secs(5));
            assert!(selector.select_tools("Research", &catalog()).await.is_empty());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_degrades_to_empty() {
        let llm = Arc::new(MockLlm::new(vec![MockReply::Hang]));
        let selector = LlmToolSelector::new(llm, Duration::from_secs(30));
        assert!(selector.select_tools("Research", &catalog()).await.is_empty());
    }

    #[tokio::test]
    async fn test_empty_catalog_skips_model() {
        let llm = Arc::new(MockLlm::constant(r#"{"tools": ["web_search"]}"#));
        let selector = LlmToolSelector::new(llm.clone(), Duration::from_secs(5));
        assert!(selector.select_tools("Research", &[]).await.is_empty());
        assert_eq!(llm.call_count(), 0);
    }
}
