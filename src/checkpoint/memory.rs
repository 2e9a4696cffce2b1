use super::{relative_path, CheckpointStore, CheckpointValue, SerializationMode};
use crate::error::CheckpointError;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

type Slot = (String, String, SerializationMode);

/// In-memory checkpoint store for tests and dry runs
///
/// Follows the same contract as the file store: structured mode only takes
/// tables, names are validated, and `save` reports the relative path the
/// file store would have used. Failures can be injected to exercise the
/// non-fatal error paths.
#[derive(Default)]
pub struct MemoryCheckpointStore {
    slots: Mutex<HashMap<Slot, CheckpointValue>>,
    fail_saves: AtomicBool,
    corrupt_loads: AtomicBool,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `save` fail with an IO error
    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::Relaxed);
    }

    /// Make every subsequent `load` of an existing slot fail as corrupt
    pub fn corrupt_loads(&self, corrupt: bool) {
        self.corrupt_loads.store(corrupt, Ordering::Relaxed);
    }

    /// Number of stored checkpoints
    pub fn len(&self) -> usize {
        self.slots.lock().map(|slots| slots.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slot(stage: &str, key: &str, mode: SerializationMode) -> Slot {
        (stage.to_string(), key.to_string(), mode)
    }

    fn poisoned() -> CheckpointError {
        CheckpointError::Io {
            path: PathBuf::from("<memory>"),
            source: std::io::Error::new(std::io::ErrorKind::Other, "checkpoint store lock poisoned"),
        }
    }
}

impl CheckpointStore for MemoryCheckpointStore {
    fn save(
        &self,
        stage: &str,
        key: &str,
        value: &CheckpointValue,
        mode: SerializationMode,
    ) -> Result<PathBuf, CheckpointError> {
        let path = relative_path(stage, key, mode)?;

        if self.fail_saves.load(Ordering::Relaxed) {
            return Err(CheckpointError::Io {
                path,
                source: std::io::Error::new(std::io::ErrorKind::Other, "simulated write failure"),
            });
        }

        if mode == SerializationMode::Structured && value.as_table().is_none() {
            return Err(CheckpointError::NotTabular {
                key: key.to_string(),
            });
        }

        let mut slots = self.slots.lock().map_err(|_| Self::poisoned())?;
        slots.insert(Self::slot(stage, key, mode), value.clone());
        Ok(path)
    }

    fn load(
        &self,
        stage: &str,
        key: &str,
        mode: SerializationMode,
    ) -> Result<Option<CheckpointValue>, CheckpointError> {
        let path = relative_path(stage, key, mode)?;
        let slots = self.slots.lock().map_err(|_| Self::poisoned())?;

        match slots.get(&Self::slot(stage, key, mode)) {
            None => Ok(None),
            Some(_) if self.corrupt_loads.load(Ordering::Relaxed) => Err(CheckpointError::Corrupt {
                path,
                reason: "simulated corruption".to_string(),
            }),
            Some(value) => Ok(Some(value.clone())),
        }
    }

    fn remove(
        &self,
        stage: &str,
        key: &str,
        mode: SerializationMode,
    ) -> Result<bool, CheckpointError> {
        relative_path(stage, key, mode)?;
        let mut slots = self.slots.lock().map_err(|_| Self::poisoned())?;
        Ok(slots.remove(&Self::slot(stage, key, mode)).is_some())
    }

    fn exists(&self, stage: &str, key: &str, mode: SerializationMode) -> bool {
        self.slots
            .lock()
            .map(|slots| slots.contains_key(&Self::slot(stage, key, mode)))
            .unwrap_or(false)
    }
}
