//! Completion hooks that persist checkpoints
//!
//! Saving is opt-in per stage: attach a hook built here with
//! [`StageBuilder::on_complete`](super::stage::StageBuilder::on_complete).
//! A failed save is logged and the run carries on.

use super::context::PipelineContext;
use super::stage::Stage;
use crate::checkpoint::{CheckpointStore, SerializationMode};
use crate::logger::{LogLevel, Logger};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

const SOURCE: &str = "pipeline::checkpoint";

/// What happened when a stage tried to save its checkpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved(PathBuf),
    /// The context had nothing under the key
    KeyAbsent,
    /// Checkpointing is switched off in configuration
    Disabled,
    Failed(String),
}

/// Saves one context key under the completing stage's name
#[derive(Clone)]
pub struct CheckpointSaver {
    store: Option<Arc<dyn CheckpointStore>>,
    key: String,
    mode: SerializationMode,
}

impl CheckpointSaver {
    pub fn new(store: Arc<dyn CheckpointStore>, key: impl Into<String>, mode: SerializationMode) -> Self {
        Self {
            store: Some(store),
            key: key.into(),
            mode,
        }
    }

    /// A saver that never writes, for runs with checkpointing switched off
    pub fn disabled(key: impl Into<String>, mode: SerializationMode) -> Self {
        Self {
            store: None,
            key: key.into(),
            mode,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Snapshot the key and hand it to the store, logging the outcome
    pub fn save(&self, stage: &Stage, context: &PipelineContext, log: &Logger) -> SaveOutcome {
        let Some(store) = &self.store else {
            log.debug(
                SOURCE,
                &format!(
                    "Checkpointing disabled, not saving '{}' for stage '{}'",
                    self.key,
                    stage.name()
                ),
            );
            return SaveOutcome::Disabled;
        };

        let value = match context.snapshot(&self.key) {
            Ok(Some(value)) => value,
            Ok(None) => {
                log.warn(
                    SOURCE,
                    &format!(
                        "Failed to save checkpoint for stage '{}': context has no '{}'",
                        stage.name(),
                        self.key
                    ),
                );
                return SaveOutcome::KeyAbsent;
            }
            Err(e) => return self.failed(stage, log, e.to_string()),
        };

        match store.save(stage.name(), &self.key, &value, self.mode) {
            Ok(path) => {
                let mut fields = HashMap::new();
                fields.insert("stage".to_string(), serde_json::json!(stage.name()));
                fields.insert("key".to_string(), serde_json::json!(self.key));
                fields.insert("path".to_string(), serde_json::json!(path.display().to_string()));
                log.log_with_context(
                    LogLevel::Info,
                    &format!(
                        "Checkpoint saved for stage '{}' at {}",
                        stage.name(),
                        path.display()
                    ),
                    SOURCE,
                    fields,
                );
                SaveOutcome::Saved(path)
            }
            Err(e) => self.failed(stage, log, e.to_string()),
        }
    }

    fn failed(&self, stage: &Stage, log: &Logger, reason: String) -> SaveOutcome {
        log.warn(
            SOURCE,
            &format!(
                "Failed to save checkpoint '{}' for stage '{}': {}",
                self.key,
                stage.name(),
                reason
            ),
        );
        SaveOutcome::Failed(reason)
    }

    /// Turn this saver into a completion hook
    pub fn into_hook(self) -> impl Fn(&Stage, &PipelineContext, &Logger) + Send + Sync + 'static {
        move |stage: &Stage, context: &PipelineContext, log: &Logger| {
            self.save(stage, context, log);
        }
    }
}

/// Completion hook saving `key` under the stage name
///
/// # Example
/// ```
/// use stagewise::checkpoint::{MemoryCheckpointStore, SerializationMode};
/// use stagewise::pipeline::{callbacks, Stage};
/// use std::sync::Arc;
///
/// let store = Arc::new(MemoryCheckpointStore::new());
/// let stage = Stage::builder("cleaning")
///     .on_complete(callbacks::save_checkpoint(store, "dataset", SerializationMode::Structured))
///     .build()
///     .unwrap();
/// assert!(stage.has_on_complete());
/// ```
pub fn save_checkpoint(
    store: Arc<dyn CheckpointStore>,
    key: &str,
    mode: SerializationMode,
) -> impl Fn(&Stage, &PipelineContext, &Logger) + Send + Sync + 'static {
    CheckpointSaver::new(store, key, mode).into_hook()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::{CheckpointValue, MemoryCheckpointStore};
    use crate::dataset::{Cell, Dataset};

    fn stage() -> Stage {
        Stage::builder("cleaning").build().unwrap()
    }

    fn context_with_dataset() -> PipelineContext {
        let mut context = PipelineContext::new();
        context.set_dataset(
            Dataset::from_rows(["text"], vec![vec![Cell::text("hello")]]).unwrap(),
        );
        context
    }

    #[test]
    fn test_save_writes_and_logs_info() {
        let store = Arc::new(MemoryCheckpointStore::new());
        let saver = CheckpointSaver::new(store.clone(), "dataset", SerializationMode::Structured);
        let log = Logger::new();
        let context = context_with_dataset();

        let outcome = saver.save(&stage(), &context, &log);

        assert!(matches!(outcome, SaveOutcome::Saved(_)));
        assert_eq!(
            store
                .load("cleaning", "dataset", SerializationMode::Structured)
                .unwrap()
                .and_then(|v| v.as_table().cloned()),
            context.dataset().cloned()
        );
        let info = log.entries_at(LogLevel::Info);
        assert!(info[0].message.starts_with("Checkpoint saved for stage 'cleaning'"));
        assert_eq!(info[0].context.as_ref().unwrap()["key"], "dataset");
    }

    #[test]
    fn test_failed_save_is_logged_not_raised() {
        let store = Arc::new(MemoryCheckpointStore::new());
        store.fail_saves(true);
        let saver = CheckpointSaver::new(store.clone(), "dataset", SerializationMode::Opaque);
        let log = Logger::new();

        let outcome = saver.save(&stage(), &context_with_dataset(), &log);

        assert!(matches!(outcome, SaveOutcome::Failed(_)));
        assert!(store.is_empty());
        assert_eq!(log.entries_at(LogLevel::Warn).len(), 1);
    }

    #[test]
    fn test_absent_key() {
        let store = Arc::new(MemoryCheckpointStore::new());
        let saver = CheckpointSaver::new(store, "model", SerializationMode::Opaque);
        let log = Logger::new();

        let outcome = saver.save(&stage(), &PipelineContext::new(), &log);
        assert_eq!(outcome, SaveOutcome::KeyAbsent);
        assert_eq!(log.entries_at(LogLevel::Warn).len(), 1);
    }

    #[test]
    fn test_model_set_by_name_is_saved() {
        let store = Arc::new(MemoryCheckpointStore::new());
        let saver = CheckpointSaver::new(store.clone(), "model", SerializationMode::Opaque);
        let mut context = PipelineContext::new();
        context.set("model", serde_json::json!({"label": 1})).unwrap();

        let outcome = saver.save(&stage(), &context, &Logger::new());

        assert!(matches!(outcome, SaveOutcome::Saved(_)));
        assert_eq!(
            store.load("cleaning", "model", SerializationMode::Opaque).unwrap(),
            Some(CheckpointValue::Json(serde_json::json!({"label": 1})))
        );
    }

    #[test]
    fn test_disabled_is_distinct_from_failure() {
        let saver = CheckpointSaver::disabled("dataset", SerializationMode::Opaque);
        let log = Logger::new();

        let outcome = saver.save(&stage(), &context_with_dataset(), &log);
        assert_eq!(outcome, SaveOutcome::Disabled);
        assert!(log.entries_at(LogLevel::Warn).is_empty());
        assert_eq!(log.entries_at(LogLevel::Debug).len(), 1);
    }

    #[test]
    fn test_structured_json_value_fails_softly() {
        let store = Arc::new(MemoryCheckpointStore::new());
        let saver = CheckpointSaver::new(store, "model", SerializationMode::Structured);
        let mut context = PipelineContext::new();
        context.set_model(serde_json::json!({"label": "majority"}));

        let outcome = saver.save(&stage(), &context, &Logger::new());
        assert!(matches!(outcome, SaveOutcome::Failed(ref m) if m.contains("not tabular")));
    }

    #[test]
    fn test_hook_runs_through_stage() {
        let store = Arc::new(MemoryCheckpointStore::new());
        let stage = Stage::builder("processing")
            .on_complete(save_checkpoint(store.clone(), "dataset", SerializationMode::Opaque))
            .build()
            .unwrap();

        let mut context = context_with_dataset();
        stage.run(&mut context, &Logger::new()).unwrap();

        assert!(matches!(
            store.load("processing", "dataset", SerializationMode::Opaque).unwrap(),
            Some(CheckpointValue::Table(_))
        ));
    }
}
