//! Core type definitions for BiasBouncer.

pub mod agent;
pub mod tool;

pub use agent::*;
pub use tool::*;
