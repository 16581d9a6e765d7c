//! Core traits for BiasBouncer.
//!
//! - `skills`: Tool and ToolRegistry
//! - `llm`: LlmClient and the chat message model
//! - `observer`: RunObserver lifecycle hooks

pub mod llm;
pub mod observer;
pub mod skills;

pub use llm::*;
pub use observer::*;
pub use skills::*;
