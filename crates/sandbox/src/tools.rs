//! `execute_code` and the sandbox lifecycle behind it.

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use bouncer_core::{traits::Tool, types::ToolOutput, Error, Result};

use crate::engine::{SandboxConfig, SandboxEngine, SandboxId};

// =============================================================================
// Sandbox Manager
// =============================================================================

/// Owns one lazily created sandbox shared by every code execution.
pub struct SandboxManager {
    engine: Arc<dyn SandboxEngine>,
    config: SandboxConfig,
    active_sandbox: tokio::sync::RwLock<Option<SandboxId>>,
}

impl SandboxManager {
    pub fn new(engine: Arc<dyn SandboxEngine>, config: SandboxConfig) -> Self {
        Self {
            engine,
            config,
            active_sandbox: tokio::sync::RwLock::new(None),
        }
    }

    /// Get or create the active sandbox.
    pub async fn get_or_create(&self) -> Result<SandboxId> {
        if let Some(id) = self.active_sandbox.read().await.as_ref() {
            return Ok(id.clone());
        }

        let mut guard = self.active_sandbox.write().await;
        // Another task may have won the race for the write lock.
        if let Some(id) = guard.as_ref() {
            return Ok(id.clone());
        }

        let id = self.engine.create(&self.config).await?;
        *guard = Some(id.clone());
        Ok(id)
    }

    /// Destroy the active sandbox, if any.
    pub async fn teardown(&self) -> Result<()> {
        if let Some(id) = self.active_sandbox.write().await.take() {
            self.engine.destroy(&id).await?;
        }
        Ok(())
    }

    pub fn engine(&self) -> &Arc<dyn SandboxEngine> {
        &self.engine
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    pub async fn is_available(&self) -> bool {
        self.engine.is_available().await
    }
}

// =============================================================================
// Execute Code Tool
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum CodeLanguage {
    #[default]
    Python,
    Shell,
}

impl CodeLanguage {
    fn file_name(self, stem: &str) -> String {
        match self {
            Self::Python => format!("{}.py", stem),
            Self::Shell => format!("{}.sh", stem),
        }
    }

    fn command(self, file: &str) -> String {
        match self {
            Self::Python => format!("python3 {}", file),
            Self::Shell => format!("sh {}", file),
        }
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ExecuteCodeArgs {
    /// Source code to run.
    pub code: String,
    /// Interpreter to use; defaults to python.
    #[serde(default)]
    pub language: CodeLanguage,
}

/// `execute_code`: runs a snippet inside the sandbox and returns its output.
pub struct ExecuteCodeTool {
    manager: Arc<SandboxManager>,
}

impl ExecuteCodeTool {
    pub fn new(manager: Arc<SandboxManager>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl Tool for ExecuteCodeTool {
    fn name(&self) -> &str {
        "execute_code"
    }

    fn description(&self) -> &str {
        "Executes a snippet of Python (or shell) code in an isolated sandbox without \
         network access and returns its output. Use it for calculations, data analysis \
         and checking logic."
    }

    fn parameters(&self) -> Value {
        serde_json::to_value(schemars::schema_for!(ExecuteCodeArgs)).unwrap_or_default()
    }

    async fn execute(&self, args: Value) -> Result<ToolOutput> {
        let args: ExecuteCodeArgs = serde_json::from_value(args)
            .map_err(|e| Error::invalid_request(format!("execute_code: {}", e)))?;
        if args.code.trim().is_empty() {
            return Err(Error::invalid_request("execute_code: code must not be empty"));
        }

        let sandbox_id = self.manager.get_or_create().await?;
        let stem = format!("snippet_{}", uuid::Uuid::new_v4().simple());
        let file = args.language.file_name(&stem);

        tracing::info!(sandbox = %sandbox_id, language = ?args.language, bytes = args.code.len(), "Executing code");

        let engine = self.manager.engine();
        engine
            .write_file(&sandbox_id, &file, args.code.as_bytes())
            .await?;
        let timeout = self.manager.config().default_timeout;
        let result = engine
            .exec(&sandbox_id, &args.language.command(&file), timeout)
            .await?;

        if result.timed_out {
            return Err(Error::execution(format!(
                "timed out after {}s\n{}",
                timeout.as_secs(),
                result.combined_output()
            )));
        }
        if !result.success() {
            return Err(Error::execution(format!(
                "exit code {}\n{}",
                result.exit_code,
                result.combined_output()
            )));
        }

        let output = result.combined_output();
        let content = if output.trim().is_empty() {
            "Code ran successfully with no output.".to_string()
        } else {
            output
        };
        Ok(ToolOutput::text(content).with_data(json!({ "exit_code": result.exit_code })))
    }
}
