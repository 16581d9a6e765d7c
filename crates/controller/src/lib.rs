#![deny(unused)]
//! Orchestration controller for BiasBouncer.
//!
//! A coordinator ("Project Manager") agent breaks a goal into sub-tasks and
//! delegates them to specialist agents, each exposed to it as a tool.
//!
//! ```text
//! TeamDesigner ── goal chat → Vec<AgentSpec>, member chat → AgentPatch
//!
//! TeamSession ── AgentFactory ── ToolSelector ── ToolRegistry
//!      │
//!      └── Orchestrator ── CoordinatorAgent ── DelegationTool ── SpecialistAgent
//!                │
//!                └── RunObserver (RunEvent stream)
//! ```

pub mod builder;
pub mod coordinator;
pub mod delegation;
pub mod designer;
pub mod factory;
pub mod limits;
pub mod observer;
pub mod orchestrator;
pub mod parser;
pub mod prompts;
pub mod selection;
pub mod session;
pub mod specialist;

pub use builder::SessionBuilder;
pub use coordinator::{build_coordinator, CoordinatorAgent};
pub use delegation::{normalize_tool_name, wrap_as_tool, DelegationTool};
pub use designer::{create_team_arguments, DesignReply, EditReply, TeamDesigner};
pub use factory::AgentFactory;
pub use limits::RunLimits;
pub use observer::{ChannelObserver, CollectingObserver, CompositeObserver, TracingObserver};
pub use orchestrator::Orchestrator;
pub use parser::{ParsedReply, ResponseParser};
pub use selection::{LlmToolSelector, ToolSelector};
pub use session::{Team, TeamSession};
pub use specialist::SpecialistAgent;
