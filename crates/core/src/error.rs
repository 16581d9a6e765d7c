//! Error types for BiasBouncer.

use thiserror::Error;

/// Result type alias using BiasBouncer's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for BiasBouncer.
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Team Errors
    // =========================================================================
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Team is busy: a run is in progress")]
    TeamBusy,

    #[error("Agent index {index} out of range for team of {len}")]
    InvalidAgentIndex { index: usize, len: usize },

    #[error("Tool selection failed: {0}")]
    ToolSelection(String),

    // =========================================================================
    // Orchestration Errors
    // =========================================================================
    #[error("Delegation to '{tool}' failed: {message}")]
    Delegation { tool: String, message: String },

    #[error("Coordinator model error: {0}")]
    CoordinatorModel(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Turn limit exceeded after {0} turns")]
    MaxTurnsExceeded(usize),

    #[error("Run cancelled")]
    Cancelled,

    // =========================================================================
    // Tool Errors
    // =========================================================================
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Tool execution failed: {0}")]
    ToolExecution(String),

    #[error("Search unavailable: {0}")]
    SearchUnavailable(String),

    #[error("I/O error on '{path}': {message}")]
    Io { path: String, message: String },

    #[error("Code execution failed: {0}")]
    Execution(String),

    #[error("Security violation: {0}")]
    SecurityViolation(String),

    // =========================================================================
    // Model Gateway Errors
    // =========================================================================
    #[error("Model provider error: {0}")]
    ModelProvider(String),

    // =========================================================================
    // Generic Errors
    // =========================================================================
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Create an invalid request error.
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// Create a tool selection error.
    pub fn tool_selection(msg: impl Into<String>) -> Self {
        Self::ToolSelection(msg.into())
    }

    /// Create a delegation error for the named delegation tool.
    pub fn delegation(tool: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Delegation {
            tool: tool.into(),
            message: msg.into(),
        }
    }

    /// Create a coordinator model error.
    pub fn coordinator_model(msg: impl Into<String>) -> Self {
        Self::CoordinatorModel(msg.into())
    }

    /// Create an authentication error.
    pub fn authentication(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a tool not found error.
    pub fn tool_not_found(name: impl Into<String>) -> Self {
        Self::ToolNotFound(name.into())
    }

    /// Create a tool execution error.
    pub fn tool_execution(msg: impl Into<String>) -> Self {
        Self::ToolExecution(msg.into())
    }

    /// Create a search unavailable error.
    pub fn search_unavailable(msg: impl Into<String>) -> Self {
        Self::SearchUnavailable(msg.into())
    }

    /// Create an I/O error carrying the offending path.
    pub fn io(path: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Io {
            path: path.into(),
            message: msg.into(),
        }
    }

    /// Create a code execution error.
    pub fn execution(msg: impl Into<String>) -> Self {
        Self::Execution(msg.into())
    }

    /// Create a model provider error.
    pub fn model_provider(msg: impl Into<String>) -> Self {
        Self::ModelProvider(msg.into())
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a timeout error.
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether this error is an authentication failure.
    pub fn is_authentication(&self) -> bool {
        matches!(self, Self::Authentication(_))
    }

    /// Whether this error terminates an orchestration run when it reaches the coordinator.
    ///
    /// Everything else is recovered at a smaller boundary and turned into
    /// text the coordinator can reason about.
    pub fn is_fatal_for_run(&self) -> bool {
        matches!(
            self,
            Self::CoordinatorModel(_)
                | Self::Authentication(_)
                | Self::MaxTurnsExceeded(_)
                | Self::Cancelled
        )
    }
}
