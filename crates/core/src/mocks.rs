//! Mock implementations of core traits for testing.
//!
//! Shared by unit and integration tests across the workspace.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use crate::{
    traits::{ChatMessage, ChatRequest, LlmClient, LlmResponse, LlmUsage, Tool},
    types::{ToolCall, ToolOutput},
    Error, Result,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// =============================================================================
// Mock LLM Client
// =============================================================================

/// One scripted model reply.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Plain text content.
    Text(String),
    /// Structured tool calls.
    ToolCalls(Vec<ToolCall>),
    /// Provider failure.
    ModelError(String),
    /// Rejected credentials.
    AuthError(String),
    /// Never resolves; exercises timeouts and cancellation.
    Hang,
}

impl MockReply {
    pub fn text(content: impl Into<String>) -> Self {
        Self::Text(content.into())
    }

    /// A single tool call with the given arguments.
    pub fn call(name: &str, args: Value) -> Self {
        Self::ToolCalls(vec![ToolCall::new(name, args)])
    }

    /// A delegation-style call carrying a `task` argument.
    pub fn delegate(name: &str, task: &str) -> Self {
        Self::call(name, json!({ "task": task }))
    }
}

type Responder = Box<dyn Fn(&ChatRequest) -> MockReply + Send + Sync>;

/// Scripted mock LLM that returns predefined replies and records requests.
pub struct MockLlm {
    replies: Mutex<VecDeque<MockReply>>,
    fallback: MockReply,
    responder: Option<Responder>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl MockLlm {
    /// Create a mock that plays `replies` in order, then answers "Done".
    pub fn new(replies: Vec<MockReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            fallback: MockReply::text("Done"),
            responder: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Create a mock that always returns the same text.
    pub fn constant(response: &str) -> Self {
        let mut mock = Self::new(Vec::new());
        mock.fallback = MockReply::text(response);
        mock
    }

    /// Create a mock that computes each reply from the request.
    pub fn with_responder(
        responder: impl Fn(&ChatRequest) -> MockReply + Send + Sync + 'static,
    ) -> Self {
        let mut mock = Self::new(Vec::new());
        mock.responder = Some(Box::new(responder));
        mock
    }

    /// Get the number of calls made to this mock.
    pub fn call_count(&self) -> usize {
        lock(&self.requests).len()
    }

    /// All requests received so far.
    pub fn requests(&self) -> Vec<ChatRequest> {
        lock(&self.requests).clone()
    }

    fn next_reply(&self, request: &ChatRequest) -> MockReply {
        lock(&self.requests).push(request.clone());
        if let Some(responder) = &self.responder {
            return responder(request);
        }
        lock(&self.replies)
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

#[async_trait]
impl LlmClient for MockLlm {
    async fn complete(&self, prompt: &str) -> Result<LlmResponse> {
        self.chat(&ChatRequest::new(vec![ChatMessage::user(prompt)]))
            .await
    }

    async fn chat(&self, request: &ChatRequest) -> Result<LlmResponse> {
        match self.next_reply(request) {
            MockReply::Text(content) => Ok(LlmResponse {
                usage: LlmUsage {
                    prompt_tokens: 10,
                    completion_tokens: 20,
                    total_tokens: 30,
                },
                ..LlmResponse::text(content)
            }),
            MockReply::ToolCalls(calls) => Ok(LlmResponse::with_tool_calls(calls)),
            MockReply::ModelError(msg) => Err(Error::model_provider(msg)),
            MockReply::AuthError(msg) => Err(Error::authentication(msg)),
            MockReply::Hang => futures::future::pending().await,
        }
    }
}

// =============================================================================
// Mock Tools
// =============================================================================

/// Tool that echoes its arguments and records every call.
pub struct RecordingTool {
    name: String,
    description: String,
    calls: Mutex<Vec<Value>>,
}

impl RecordingTool {
    pub fn new(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<Value> {
        lock(&self.calls).clone()
    }
}

#[async_trait]
impl Tool for RecordingTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, args: Value) -> Result<ToolOutput> {
        lock(&self.calls).push(args.clone());
        Ok(ToolOutput::text(format!("{} handled {}", self.name, args)))
    }
}

/// Tool that always fails with a tool execution error.
pub struct FailingTool {
    name: String,
    message: String,
}

impl FailingTool {
    pub fn new(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            message: message.to_string(),
        }
    }
}

#[async_trait]
impl Tool for FailingTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Always fails"
    }

    fn parameters(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _args: Value) -> Result<ToolOutput> {
        Err(Error::tool_execution(self.message.clone()))
    }
}
