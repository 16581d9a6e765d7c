//! Filesystem confinement for the host file tools.
//!
//! Agents name files relative to a workspace root. Paths are normalized
//! lexically so that absolute paths and `..` escapes are rejected before
//! anything touches the disk.

use crate::{Error, Result};
use std::path::{Component, Path, PathBuf};

/// Normalizes `input_path` and returns it relative to the workspace root.
///
/// Rejects empty paths, absolute paths (including Windows drive paths on any
/// OS) and any `..` component that would climb above the root.
pub fn normalize_relative_path(input_path: &str) -> Result<PathBuf> {
    let trimmed = input_path.trim();
    if trimmed.is_empty() {
        return Err(Error::invalid_request("path must not be empty"));
    }

    let bytes = trimmed.as_bytes();
    if bytes.len() >= 2 && bytes[1] == b':' && bytes[0].is_ascii_alphabetic() {
        return Err(Error::SecurityViolation(format!(
            "Absolute paths are not allowed in the workspace: {}",
            trimmed
        )));
    }

    let mut normalized = PathBuf::new();
    for component in Path::new(trimmed).components() {
        match component {
            Component::Normal(part) => normalized.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    return Err(Error::SecurityViolation(format!(
                        "Path escapes the workspace: {}",
                        trimmed
                    )));
                }
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(Error::SecurityViolation(format!(
                    "Absolute paths are not allowed in the workspace: {}",
                    trimmed
                )));
            }
        }
    }

    if normalized.as_os_str().is_empty() {
        return Err(Error::invalid_request(format!(
            "path does not name a file: {}",
            trimmed
        )));
    }

    Ok(normalized)
}

/// Resolves `input_path` under `root`, returning the full path to operate on.
pub fn resolve_in_workspace(root: &Path, input_path: &str) -> Result<PathBuf> {
    let relative = normalize_relative_path(input_path)?;
    let full = root.join(relative);
    if !full.starts_with(root) {
        return Err(Error::SecurityViolation(format!(
            "Access denied: {} is outside of {}",
            input_path,
            root.display()
        )));
    }
    Ok(full)
}
