use crate::checkpoint::{CheckpointStore, SerializationMode};
use crate::error::PipelineResult;
use crate::logger::Logger;
use crate::pipeline::{PipelineContext, Step, StepOutcome};
use std::sync::Arc;

/// Step that resumes a stage from a saved checkpoint
///
/// Looks up `(stage, key)` in the store. On a hit the value replaces `key`
/// in the context and the step returns `SkipRemaining`, since the checkpoint
/// already holds the combined effect of the steps after it. On a miss, or when
/// the checkpoint cannot be read, the context is left untouched and the stage
/// runs normally.
///
/// The stage scope does not have to be the stage the step sits in; a loader
/// at the head of `loading` can pick up what `processing` saved last time.
///
/// # Context Outputs
/// - `key` on a hit
pub struct LoadCheckpointStep {
    store: Arc<dyn CheckpointStore>,
    stage: String,
    key: String,
    mode: SerializationMode,
}

impl LoadCheckpointStep {
    pub fn new(
        store: Arc<dyn CheckpointStore>,
        stage: impl Into<String>,
        key: impl Into<String>,
        mode: SerializationMode,
    ) -> Self {
        Self {
            store,
            stage: stage.into(),
            key: key.into(),
            mode,
        }
    }
}

impl Step for LoadCheckpointStep {
    fn run(&self, context: &mut PipelineContext, log: &Logger) -> PipelineResult<StepOutcome> {
        let value = match self.store.load(&self.stage, &self.key, self.mode) {
            Ok(Some(value)) => value,
            Ok(None) => {
                log.info(
                    "steps::load_checkpoint",
                    &format!(
                        "No checkpoint for '{}' in stage '{}', running stage from scratch",
                        self.key, self.stage
                    ),
                );
                return Ok(StepOutcome::Continue);
            }
            Err(e) => {
                log.warn(
                    "steps::load_checkpoint",
                    &format!(
                        "Ignoring unreadable checkpoint for '{}' in stage '{}': {}",
                        self.key, self.stage, e
                    ),
                );
                return Ok(StepOutcome::Continue);
            }
        };

        if let Err(e) = context.restore(&self.key, value) {
            log.warn(
                "steps::load_checkpoint",
                &format!(
                    "Checkpoint for '{}' in stage '{}' does not fit the context: {}",
                    self.key, self.stage, e
                ),
            );
            return Ok(StepOutcome::Continue);
        }

        log.info(
            "steps::load_checkpoint",
            &format!(
                "Loaded checkpoint for '{}' from stage '{}'",
                self.key, self.stage
            ),
        );
        Ok(StepOutcome::SkipRemaining)
    }

    fn name(&self) -> &str {
        "load_checkpoint"
    }

    fn description(&self) -> Option<&str> {
        Some("Restores a previously saved context key and skips the rest of the stage")
    }

    // Restoring is not a transformation, so it leaves no time entry
    fn record_stats(&self, _context: &mut PipelineContext) -> PipelineResult<()> {
        Ok(())
    }
}
