//! Tool registry implementation.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bouncer_core::{
    traits::{Tool, ToolRegistry},
    types::{ToolDefinition, ToolOutput},
    Error, Result,
};

struct ToolEntry {
    /// Registration order, used to keep `list` stable.
    seq: u64,
    tool: Arc<dyn Tool>,
}

/// Default tool registry using DashMap.
pub struct DefaultToolRegistry {
    tools: DashMap<String, ToolEntry>,
    next_seq: AtomicU64,
}

impl DefaultToolRegistry {
    /// Create a new tool registry.
    pub fn new() -> Self {
        Self {
            tools: DashMap::new(),
            next_seq: AtomicU64::new(0),
        }
    }

    /// Get the number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if registry is empty.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    fn ordered(&self) -> Vec<Arc<dyn Tool>> {
        let mut entries: Vec<(u64, Arc<dyn Tool>)> = self
            .tools
            .iter()
            .map(|entry| (entry.seq, entry.tool.clone()))
            .collect();
        entries.sort_by_key(|(seq, _)| *seq);
        entries.into_iter().map(|(_, tool)| tool).collect()
    }
}

impl Default for DefaultToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolRegistry for DefaultToolRegistry {
    async fn register(&self, tool: Box<dyn Tool>) -> Result<()> {
        let name = tool.name().to_string();
        tracing::info!(tool = %name, "Registering tool");

        match self.tools.entry(name) {
            Entry::Occupied(existing) => Err(Error::invalid_request(format!(
                "Tool '{}' is already registered",
                existing.key()
            ))),
            Entry::Vacant(slot) => {
                let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
                slot.insert(ToolEntry {
                    seq,
                    tool: Arc::from(tool),
                });
                Ok(())
            }
        }
    }

    async fn get(&self, name: &str) -> Result<Arc<dyn Tool>> {
        self.tools
            .get(name)
            .map(|entry| entry.tool.clone())
            .ok_or_else(|| Error::tool_not_found(name))
    }

    async fn list(&self) -> Result<Vec<ToolDefinition>> {
        Ok(self.ordered().iter().map(|tool| tool.definition()).collect())
    }

    async fn execute(&self, name: &str, args: serde_json::Value) -> Result<ToolOutput> {
        let tool = self.get(name).await?;

        tracing::debug!(tool = %name, "Executing tool");

        tool.execute(args).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bouncer_core::mocks::RecordingTool;

    #[tokio::test]
    async fn test_register_and_list_keeps_order() {
        let registry = DefaultToolRegistry::new();

        for name in ["web_search", "write_to_file", "read_file", "execute_code"] {
            registry
                .register(Box::new(RecordingTool::new(name, "test tool")))
                .await
                .unwrap();
        }

        let names: Vec<String> = registry
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(
            names,
            vec!["web_search", "write_to_file", "read_file", "execute_code"]
        );
    }

    #[tokio::test]
    async fn test_duplicate_rejected() {
        let registry = DefaultToolRegistry::new();
        registry
            .register(Box::new(RecordingTool::new("read_file", "a")))
            .await
            .unwrap();
        let result = registry
            .register(Box::new(RecordingTool::new("read_file", "b")))
            .await;
        assert!(result.is_err());
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_execute() {
        let registry = DefaultToolRegistry::new();
        registry
            .register(Box::new(RecordingTool::new("web_search", "Search")))
            .await
            .unwrap();

        let result = registry
            .execute("web_search", serde_json::json!({"query": "Hello"}))
            .await
            .unwrap();

        assert!(result.success);
        assert!(result.content.contains("Hello"));
    }

    #[tokio::test]
    async fn test_get_not_found() {
        let registry = DefaultToolRegistry::new();

        assert!(matches!(
            registry.get("nonexistent").await,
            Err(Error::ToolNotFound(_))
        ));
        assert!(registry
            .execute("nonexistent", serde_json::json!({}))
            .await
            .is_err());
    }
}
