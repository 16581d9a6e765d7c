//! Tool traits.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use crate::error::Result;
use crate::types::{ToolDefinition, ToolOutput};

/// A named, described capability a model may invoke.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the unique name of the tool.
    fn name(&self) -> &str;

    /// Get the human-readable description.
    fn description(&self) -> &str;

    /// Get the JSON Schema for parameters.
    fn parameters(&self) -> Value;

    /// Execute the tool with the given arguments.
    async fn execute(&self, args: Value) -> Result<ToolOutput>;

    /// Data-only view of this tool.
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }
}

/// Catalog of callable tools, listed in registration order.
#[async_trait]
pub trait ToolRegistry: Send + Sync {
    /// Register a new tool. Names are unique.
    async fn register(&self, tool: Box<dyn Tool>) -> Result<()>;

    /// Get a tool by name, failing with `ToolNotFound`.
    async fn get(&self, name: &str) -> Result<Arc<dyn Tool>>;

    /// List all available tools in registration order.
    async fn list(&self) -> Result<Vec<ToolDefinition>>;

    /// Execute a tool by name with arguments.
    async fn execute(&self, name: &str, args: Value) -> Result<ToolOutput>;
}
