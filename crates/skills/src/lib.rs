#![deny(unused)]
//! Tool registry and host tools for BiasBouncer.
//!
//! This crate provides:
//! - An ordered, thread-safe tool registry
//! - `web_search` backed by the DuckDuckGo instant answer API
//! - `write_to_file` and `read_file` confined to a workspace root

pub mod files;
pub mod registry;
pub mod search;

pub use files::{ReadFileTool, WriteFileTool};
pub use registry::DefaultToolRegistry;
pub use search::{SearchConfig, WebSearchTool};
