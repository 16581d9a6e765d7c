#![deny(unused)]
//! Isolated code execution for BiasBouncer.
//!
//! Backs the `execute_code` tool with a Docker container so that
//! model-written code never runs on the host.
//!
//! ```text
//! ┌────────────────────────────────────────┐
//! │  Specialist agent                      │
//! │    ↓ calls execute_code                │
//! ├────────────────────────────────────────┤
//! │  ExecuteCodeTool → SandboxManager      │
//! ├────────────────────────────────────────┤
//! │  SandboxEngine (DockerSandbox)         │
//! │    ↓ Docker API via bollard            │
//! ├────────────────────────────────────────┤
//! │  Container: no network, read-only      │
//! │  rootfs, tmpfs /workspace, no caps     │
//! └────────────────────────────────────────┘
//! ```

pub mod engine;
pub mod tools;

pub use engine::{DockerSandbox, ExecResult, MockSandbox, SandboxConfig, SandboxEngine, SandboxId};
pub use tools::{CodeLanguage, ExecuteCodeTool, SandboxManager};
