#![deny(unused)]
//! Core types, traits, and error definitions for BiasBouncer.
//!
//! This crate provides the building blocks shared by the tool, sandbox,
//! model gateway and orchestration crates: agent specifications, tool
//! contracts, run events, the LLM client interface and configuration.

pub mod config;
pub mod error;
pub mod events;
pub mod fs_policy;
pub mod mocks;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
pub use events::*;
pub use traits::*;
pub use types::*;
