//! File tools confined to a workspace directory.

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use std::path::PathBuf;

use bouncer_core::{fs_policy::resolve_in_workspace, traits::Tool, types::ToolOutput, Error, Result};

#[derive(Debug, Deserialize, JsonSchema)]
pub struct WriteFileArgs {
    /// Path relative to the workspace.
    #[serde(alias = "filepath")]
    pub path: String,
    /// Text to write. Existing files are overwritten.
    pub content: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ReadFileArgs {
    /// Path relative to the workspace.
    #[serde(alias = "filepath")]
    pub path: String,
}

/// `write_to_file`: saves text under the workspace root.
pub struct WriteFileTool {
    root: PathBuf,
}

impl WriteFileTool {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_to_file"
    }

    fn description(&self) -> &str {
        "Writes the given content to a file at the specified path. \
         Use this to save work, create reports, or store lengthy text."
    }

    fn parameters(&self) -> serde_json::Value {
        serde_json::to_value(schemars::schema_for!(WriteFileArgs)).unwrap_or_default()
    }

    async fn execute(&self, args: serde_json::Value) -> Result<ToolOutput> {
        let args: WriteFileArgs = serde_json::from_value(args)
            .map_err(|e| Error::invalid_request(format!("write_to_file: {}", e)))?;
        let target = resolve_in_workspace(&self.root, &args.path)?;

        tracing::info!(path = %args.path, bytes = args.content.len(), "Writing file");

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::io(&args.path, e.to_string()))?;
        }
        tokio::fs::write(&target, args.content.as_bytes())
            .await
            .map_err(|e| Error::io(&args.path, e.to_string()))?;

        Ok(ToolOutput::text(format!("Successfully wrote to {}.", args.path))
            .with_data(serde_json::json!({ "bytes": args.content.len() })))
    }
}

/// `read_file`: loads text from under the workspace root.
pub struct ReadFileTool {
    root: PathBuf,
}

impl ReadFileTool {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Reads the content of the file at the specified path. \
         Use this to load data or review previous work."
    }

    fn parameters(&self) -> serde_json::Value {
        serde_json::to_value(schemars::schema_for!(ReadFileArgs)).unwrap_or_default()
    }

    async fn execute(&self, args: serde_json::Value) -> Result<ToolOutput> {
        let args: ReadFileArgs = serde_json::from_value(args)
            .map_err(|e| Error::invalid_request(format!("read_file: {}", e)))?;
        let target = resolve_in_workspace(&self.root, &args.path)?;

        tracing::info!(path = %args.path, "Reading file");

        let content = tokio::fs::read_to_string(&target)
            .await
            .map_err(|e| Error::io(&args.path, e.to_string()))?;

        Ok(ToolOutput::text(content))
    }
}
