//! Checkpoint persistence for single context keys
//!
//! A checkpoint is a snapshot of one context key scoped by the stage that
//! produced it. Stores are addressed by `(stage, key, mode)` and lay files out
//! as `{base_dir}/{stage}/{key}.{ext}`:
//!
//! ```text
//! checkpoints/
//! ├── loading/
//! │   └── dataset.csv      structured (tabular)
//! └── processing/
//!     └── dataset.bin      opaque (bincode)
//! ```
//!
//! A missing checkpoint is the normal cold-start case and loads as `Ok(None)`.
//! A checkpoint that exists but cannot be read is an error distinct from that.

pub mod file;
pub mod memory;

use crate::dataset::Dataset;
use crate::error::CheckpointError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub use file::FileCheckpointStore;
pub use memory::MemoryCheckpointStore;

/// How a checkpoint is serialized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SerializationMode {
    /// Tabular record set (CSV)
    Structured,
    /// Opaque binary blob (bincode)
    Opaque,
}

impl SerializationMode {
    pub fn extension(&self) -> &'static str {
        match self {
            SerializationMode::Structured => "csv",
            SerializationMode::Opaque => "bin",
        }
    }
}

/// A checkpointed context value
#[derive(Debug, Clone, PartialEq)]
pub enum CheckpointValue {
    Table(Dataset),
    Json(serde_json::Value),
}

impl CheckpointValue {
    pub fn as_table(&self) -> Option<&Dataset> {
        match self {
            CheckpointValue::Table(dataset) => Some(dataset),
            CheckpointValue::Json(_) => None,
        }
    }
}

/// Storage backend for checkpoints
///
/// Implementations can use different storage media (local files, memory, ...).
pub trait CheckpointStore: Send + Sync {
    /// Persist `value` for `(stage, key)`, returning where it was written
    fn save(
        &self,
        stage: &str,
        key: &str,
        value: &CheckpointValue,
        mode: SerializationMode,
    ) -> Result<PathBuf, CheckpointError>;

    /// Load the value for `(stage, key)`; `Ok(None)` when nothing was saved
    fn load(
        &self,
        stage: &str,
        key: &str,
        mode: SerializationMode,
    ) -> Result<Option<CheckpointValue>, CheckpointError>;

    /// Delete a checkpoint, reporting whether one existed
    fn remove(
        &self,
        stage: &str,
        key: &str,
        mode: SerializationMode,
    ) -> Result<bool, CheckpointError>;

    /// Check if a checkpoint exists without decoding it
    fn exists(&self, stage: &str, key: &str, mode: SerializationMode) -> bool;
}

/// Relative location of a checkpoint: `{stage}/{key}.{ext}`
pub fn relative_path(
    stage: &str,
    key: &str,
    mode: SerializationMode,
) -> Result<PathBuf, CheckpointError> {
    validate_segment(stage)?;
    validate_segment(key)?;
    Ok(PathBuf::from(stage).join(format!("{}.{}", key, mode.extension())))
}

/// Stage and key names must each be a single, plain path segment
fn validate_segment(name: &str) -> Result<(), CheckpointError> {
    let invalid = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(&['/', '\\', '\0'][..])
        || name.trim() != name;

    if invalid {
        return Err(CheckpointError::InvalidName(name.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_path_convention() {
        let path = relative_path("processing", "dataset", SerializationMode::Opaque).unwrap();
        assert_eq!(path, PathBuf::from("processing").join("dataset.bin"));

        let path = relative_path("loading", "dataset", SerializationMode::Structured).unwrap();
        assert_eq!(path, PathBuf::from("loading").join("dataset.csv"));
    }

    #[test]
    fn test_invalid_names_rejected() {
        for name in ["", ".", "..", "a/b", "a\\b", " padded"] {
            let result = relative_path(name, "dataset", SerializationMode::Opaque);
            assert!(
                matches!(result, Err(CheckpointError::InvalidName(_))),
                "{:?} should be rejected",
                name
            );
        }
        assert!(relative_path("stage", "..", SerializationMode::Opaque).is_err());
    }

    #[test]
    fn test_as_table() {
        let value = CheckpointValue::Table(Dataset::new(["a"]));
        assert!(value.as_table().is_some());
        assert!(CheckpointValue::Json(serde_json::json!(1)).as_table().is_none());
    }
}
