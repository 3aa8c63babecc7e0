//! Object store keys
//!
//! A storage path is a relative, `/`-separated key under the blob root.

use crate::{Error, Result};
use std::path::{Component, Path};

/// Reject empty, absolute and parent-escaping paths
pub fn validate_storage_path(path: &str) -> Result<()> {
    if path.trim().is_empty() {
        return Err(Error::Validation("storage path is empty".to_string()));
    }
    if path.contains('\\') {
        return Err(Error::Validation(format!("storage path contains '\\': {}", path)));
    }
    let ok = Path::new(path)
        .components()
        .all(|c| matches!(c, Component::Normal(_)));
    if !ok {
        return Err(Error::Validation(format!("storage path must be relative: {}", path)));
    }
    Ok(())
}
