//! Sandbox execution engine.
//!
//! `SandboxEngine` abstracts an isolated place to run model-written code.
//! `DockerSandbox` backs it with a locked-down container driven through
//! `bollard`; `MockSandbox` keeps tests independent of a Docker daemon.

use async_trait::async_trait;
use base64::Engine;
use bollard::models::{HostConfig, Mount, MountTmpfsOptions, MountTypeEnum, ResourcesUlimits};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use bouncer_core::{config::SandboxSettings, Error, Result};

/// Unique identifier for a sandbox instance.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct SandboxId(pub String);

impl std::fmt::Display for SandboxId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Configuration for creating a sandbox.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxConfig {
    /// Container image with a Python 3 interpreter.
    pub image: String,
    /// Maximum memory in bytes.
    pub memory_limit: i64,
    /// CPU quota per 100ms period.
    pub cpu_quota: i64,
    /// Execution timeout for a single snippet.
    pub default_timeout: Duration,
    /// Unprivileged user commands run as.
    pub user: String,
    /// Writable scratch directory inside the container.
    pub workdir: String,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self::from(&SandboxSettings::default())
    }
}

impl From<&SandboxSettings> for SandboxConfig {
    fn from(settings: &SandboxSettings) -> Self {
        Self {
            image: settings.image.clone(),
            memory_limit: settings.memory_limit_mb * 1024 * 1024,
            cpu_quota: 100_000,
            default_timeout: Duration::from_secs(settings.timeout_secs),
            user: "nobody".to_string(),
            workdir: "/workspace".to_string(),
        }
    }
}

/// Result of executing a command in the sandbox.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecResult {
    pub exit_code: i64,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
}

impl ExecResult {
    /// Exit code 0 and no timeout.
    pub fn success(&self) -> bool {
        self.exit_code == 0 && !self.timed_out
    }

    /// Stdout followed by stderr, separated when both are present.
    pub fn combined_output(&self) -> String {
        match (self.stdout.is_empty(), self.stderr.is_empty()) {
            (_, true) => self.stdout.clone(),
            (true, false) => self.stderr.clone(),
            (false, false) => format!("{}\n--- stderr ---\n{}", self.stdout, self.stderr),
        }
    }
}

/// Backend for isolated code execution.
#[async_trait]
pub trait SandboxEngine: Send + Sync {
    /// Create a new sandbox.
    async fn create(&self, config: &SandboxConfig) -> Result<SandboxId>;

    /// Execute a shell command inside the sandbox.
    async fn exec(&self, id: &SandboxId, command: &str, timeout: Duration) -> Result<ExecResult>;

    /// Write a file relative to the sandbox workdir.
    async fn write_file(&self, id: &SandboxId, path: &str, content: &[u8]) -> Result<()>;

    /// Destroy the sandbox and clean up resources.
    async fn destroy(&self, id: &SandboxId) -> Result<()>;

    /// Whether the backend can be reached (e.g. Docker daemon running).
    async fn is_available(&self) -> bool;
}

// =============================================================================
// Docker Sandbox Implementation
// =============================================================================

/// Docker-based engine.
///
/// Containers get no network, a read-only root filesystem with a tmpfs
/// workdir, memory/CPU/pid limits, all capabilities dropped and a
/// non-root user.
pub struct DockerSandbox {
    docker: bollard::Docker,
}

impl DockerSandbox {
    /// Connect to the local Docker daemon.
    pub fn new() -> Result<Self> {
        let docker = bollard::Docker::connect_with_local_defaults().map_err(|e| {
            Error::internal(format!(
                "Failed to connect to Docker daemon: {}. Is Docker running?",
                e
            ))
        })?;
        Ok(Self { docker })
    }
}

fn locked_down_host(config: &SandboxConfig) -> HostConfig {
    HostConfig {
        memory: Some(config.memory_limit),
        cpu_quota: Some(config.cpu_quota),
        cpu_period: Some(100_000),
        network_mode: Some("none".to_string()),
        mounts: Some(vec![Mount {
            target: Some(config.workdir.clone()),
            typ: Some(MountTypeEnum::TMPFS),
            tmpfs_options: Some(MountTmpfsOptions {
                size_bytes: Some(config.memory_limit / 2),
                mode: Some(0o1777),
                ..Default::default()
            }),
            ..Default::default()
        }]),
        readonly_rootfs: Some(true),
        cap_drop: Some(vec!["ALL".to_string()]),
        security_opt: Some(vec!["no-new-privileges:true".to_string()]),
        pids_limit: Some(64),
        ulimits: Some(vec![ResourcesUlimits {
            name: Some("nofile".to_string()),
            soft: Some(1024),
            hard: Some(2048),
        }]),
        ..Default::default()
    }
}

/// Raw bytes per write command. A multiple of 3 so every chunk is a
/// complete base64 group.
const WRITE_CHUNK_BYTES: usize = 48 * 1024;

fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\\''"))
}

/// Shell commands that write `content` to `path`, relative to the
/// container's working directory (`SandboxConfig::workdir`).
///
/// The payload is split so no single command nears the exec argv limit.
fn write_commands(path: &str, content: &[u8]) -> Vec<String> {
    let target = shell_quote(path.trim_start_matches('/'));
    let mut commands = vec![format!(
        "mkdir -p -- \"$(dirname -- {target})\" && : > {target}"
    )];
    commands.extend(content.chunks(WRITE_CHUNK_BYTES).map(|chunk| {
        format!(
            "printf '%s' '{}' | base64 -d >> {}",
            base64::engine::general_purpose::STANDARD.encode(chunk),
            target
        )
    }));
    commands
}

#[async_trait]
impl SandboxEngine for DockerSandbox {
    async fn create(&self, config: &SandboxConfig) -> Result<SandboxId> {
        use bollard::container::{Config, CreateContainerOptions};

        let sandbox_id = format!("biasbouncer-sandbox-{}", uuid::Uuid::new_v4());

        let container_config = Config {
            image: Some(config.image.clone()),
            working_dir: Some(config.workdir.clone()),
            user: Some(config.user.clone()),
            cmd: Some(vec!["sleep".to_string(), "infinity".to_string()]),
            host_config: Some(locked_down_host(config)),
            labels: Some(HashMap::from([(
                "managed-by".to_string(),
                "biasbouncer".to_string(),
            )])),
            ..Default::default()
        };

        let options = CreateContainerOptions {
            name: sandbox_id.as_str(),
            platform: None,
        };

        self.docker
            .create_container(Some(options), container_config)
            .await
            .map_err(|e| Error::execution(format!("Failed to create sandbox container: {}", e)))?;

        self.docker
            .start_container::<String>(&sandbox_id, None)
            .await
            .map_err(|e| Error::execution(format!("Failed to start sandbox container: {}", e)))?;

        tracing::info!(sandbox_id = %sandbox_id, image = %config.image, "Sandbox container started");

        Ok(SandboxId(sandbox_id))
    }

    async fn exec(&self, id: &SandboxId, command: &str, timeout: Duration) -> Result<ExecResult> {
        use bollard::container::LogOutput;
        use bollard::exec::{CreateExecOptions, StartExecResults};
        use futures::StreamExt;

        let exec = self
            .docker
            .create_exec(
                &id.0,
                CreateExecOptions {
                    cmd: Some(vec!["sh", "-c", command]),
                    attach_stdout: Some(true),
                    attach_stderr: Some(true),
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| Error::execution(format!("Failed to create exec in sandbox: {}", e)))?;

        let started = self
            .docker
            .start_exec(&exec.id, None)
            .await
            .map_err(|e| Error::execution(format!("Failed to start exec in sandbox: {}", e)))?;

        let mut stdout = String::new();
        let mut stderr = String::new();

        if let StartExecResults::Attached { mut output, .. } = started {
            let drain = async {
                while let Some(frame) = output.next().await {
                    match frame {
                        Ok(LogOutput::StdOut { message }) => {
                            stdout.push_str(&String::from_utf8_lossy(&message))
                        }
                        Ok(LogOutput::StdErr { message }) => {
                            stderr.push_str(&String::from_utf8_lossy(&message))
                        }
                        Ok(_) => {}
                        Err(e) => {
                            stderr.push_str(&format!("\n[sandbox stream error: {}]", e));
                            break;
                        }
                    }
                }
            };

            if tokio::time::timeout(timeout, drain).await.is_err() {
                tracing::warn!(sandbox = %id, "Sandbox exec timed out");
                return Ok(ExecResult {
                    exit_code: -1,
                    stdout,
                    stderr: format!("{}\n[Execution timed out after {:?}]", stderr, timeout),
                    timed_out: true,
                });
            }
        }

        let inspect = self
            .docker
            .inspect_exec(&exec.id)
            .await
            .map_err(|e| Error::execution(format!("Failed to inspect exec result: {}", e)))?;

        Ok(ExecResult {
            exit_code: inspect.exit_code.unwrap_or(-1),
            stdout,
            stderr,
            timed_out: false,
        })
    }

    async fn write_file(&self, id: &SandboxId, path: &str, content: &[u8]) -> Result<()> {
        for command in write_commands(path, content) {
            let result = self.exec(id, &command, Duration::from_secs(10)).await?;
            if !result.success() {
                return Err(Error::execution(format!(
                    "Failed to write '{}' in sandbox: {}",
                    path, result.stderr
                )));
            }
        }
        Ok(())
    }

    async fn destroy(&self, id: &SandboxId) -> Result<()> {
        use bollard::container::{RemoveContainerOptions, StopContainerOptions};

        if let Err(e) = self
            .docker
            .stop_container(&id.0, Some(StopContainerOptions { t: 5 }))
            .await
        {
            tracing::debug!(sandbox = %id, error = %e, "Stop before removal failed");
        }

        self.docker
            .remove_container(
                &id.0,
                Some(RemoveContainerOptions {
                    force: true,
                    ..Default::default()
                }),
            )
            .await
            .map_err(|e| Error::internal(format!("Failed to remove sandbox container: {}", e)))?;

        tracing::info!(sandbox_id = %id, "Sandbox container destroyed");
        Ok(())
    }

    async fn is_available(&self) -> bool {
        self.docker.ping().await.is_ok()
    }
}

// =============================================================================
// Mock Sandbox (for testing without Docker)
// =============================================================================

/// In-memory sandbox that replays scripted exec results.
#[derive(Default)]
pub struct MockSandbox {
    pub exec_responses: Arc<Mutex<Vec<ExecResult>>>,
    pub files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    pub commands: Arc<Mutex<Vec<String>>>,
}

impl MockSandbox {
    /// Create a mock sandbox with predefined exec responses.
    pub fn new(responses: Vec<ExecResult>) -> Self {
        Self {
            exec_responses: Arc::new(Mutex::new(responses)),
            ..Default::default()
        }
    }
}

#[async_trait]
impl SandboxEngine for MockSandbox {
    async fn create(&self, _config: &SandboxConfig) -> Result<SandboxId> {
        Ok(SandboxId(format!("mock-sandbox-{}", uuid::Uuid::new_v4())))
    }

    async fn exec(&self, _id: &SandboxId, command: &str, _timeout: Duration) -> Result<ExecResult> {
        self.commands.lock().await.push(command.to_string());
        let mut responses = self.exec_responses.lock().await;
        if responses.is_empty() {
            Ok(ExecResult {
                exit_code: 0,
                stdout: "[mock] command executed".to_string(),
                stderr: String::new(),
                timed_out: false,
            })
        } else {
            Ok(responses.remove(0))
        }
    }

    async fn write_file(&self, _id: &SandboxId, path: &str, content: &[u8]) -> Result<()> {
        self.files
            .lock()
            .await
            .insert(path.to_string(), content.to_vec());
        Ok(())
    }

    async fn destroy(&self, _id: &SandboxId) -> Result<()> {
        Ok(())
    }

    async fn is_available(&self) -> bool {
        true
    }
}
