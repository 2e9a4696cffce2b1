use super::context::PipelineContext;
use super::core::{StageReport, Step, StepOutcome};
use crate::error::{PipelineError, PipelineResult};
use crate::logger::Logger;
use std::time::Instant;

/// Hook fired once after a stage completes (fully or through a skip signal)
///
/// This is the only place checkpoints get written; see
/// [`callbacks::save_checkpoint`](super::callbacks::save_checkpoint).
pub type CompletionHook = Box<dyn Fn(&Stage, &PipelineContext, &Logger) + Send + Sync>;

/// An ordered group of steps sharing a completion hook and checkpoint scope
///
/// # Example
/// ```
/// use stagewise::pipeline::Stage;
/// use stagewise::steps::{LowercasingStep, WhitespaceTrimmingStep};
///
/// let stage = Stage::builder("cleaning")
///     .add_step(WhitespaceTrimmingStep::new(["text"]))
///     .add_step(LowercasingStep::new(["text"]))
///     .build()
///     .unwrap();
///
/// assert_eq!(stage.step_names(), vec!["whitespace_trimming", "lowercasing"]);
/// ```
pub struct Stage {
    name: String,
    steps: Vec<Box<dyn Step>>,
    on_complete: Option<CompletionHook>,
}

impl Stage {
    /// Create a new stage builder
    pub fn builder(name: impl Into<String>) -> StageBuilder {
        StageBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    pub fn has_on_complete(&self) -> bool {
        self.on_complete.is_some()
    }

    /// Run the steps in order
    ///
    /// A `SkipRemaining` outcome ends the stage early and still counts as a
    /// normal completion. A step error is wrapped with the stage and step
    /// names and returned without firing `on_complete`.
    pub fn run(&self, context: &mut PipelineContext, log: &Logger) -> PipelineResult<StageReport> {
        log.info(
            "pipeline::stage",
            &format!(
                "Starting stage '{}' with {} step(s) (run: {})",
                self.name,
                self.steps.len(),
                context.run_id()
            ),
        );

        context.set_metadata("current_stage", &self.name);
        let stage_start = Instant::now();
        let mut report = StageReport::new(&self.name);

        for (index, step) in self.steps.iter().enumerate() {
            let step_name = step.name();

            log.debug(
                "pipeline::stage",
                &format!(
                    "Executing step {}/{}: {} (stage: {})",
                    index + 1,
                    self.steps.len(),
                    step_name,
                    self.name
                ),
            );

            let outcome = match step.run(context, log) {
                Ok(outcome) => outcome,
                Err(e) => {
                    log.error(
                        "pipeline::stage",
                        &format!(
                            "Step '{}' failed in stage '{}': {} (run: {})",
                            step_name,
                            self.name,
                            e,
                            context.run_id()
                        ),
                    );
                    return Err(PipelineError::StageFailed {
                        stage: self.name.clone(),
                        step: step_name.to_string(),
                        source: Box::new(e),
                    });
                }
            };

            report.steps_run.push(step_name.to_string());

            if let Err(e) = step.record_stats(context) {
                log.warn(
                    "pipeline::stage",
                    &format!("Failed to record stats for step '{}': {}", step_name, e),
                );
            }

            if outcome == StepOutcome::SkipRemaining {
                let remaining = self.steps.len() - index - 1;
                log.info(
                    "pipeline::stage",
                    &format!(
                        "Step '{}' satisfied stage '{}' from a checkpoint, skipping {} remaining step(s)",
                        step_name, self.name, remaining
                    ),
                );
                report.skipped_remaining = true;
                break;
            }
        }

        report.duration = stage_start.elapsed();
        log.info(
            "pipeline::stage",
            &format!(
                "Stage '{}' completed in {:.2}s (run: {})",
                self.name,
                report.duration.as_secs_f64(),
                context.run_id()
            ),
        );

        if let Some(hook) = &self.on_complete {
            hook(self, context, log);
        }

        Ok(report)
    }
}

impl std::fmt::Debug for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stage")
            .field("name", &self.name)
            .field("steps", &self.step_names())
            .field("on_complete", &self.on_complete.is_some())
            .finish()
    }
}

/// Builder for constructing stages
pub struct StageBuilder {
    name: String,
    steps: Vec<Box<dyn Step>>,
    on_complete: Option<CompletionHook>,
}

impl StageBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
            on_complete: None,
        }
    }

    /// Add a step to the stage
    pub fn add_step<S: Step + 'static>(mut self, step: S) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    /// Add a boxed step to the stage
    pub fn add_boxed_step(mut self, step: Box<dyn Step>) -> Self {
        self.steps.push(step);
        self
    }

    /// Set the completion hook
    pub fn on_complete<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Stage, &PipelineContext, &Logger) + Send + Sync + 'static,
    {
        self.on_complete = Some(Box::new(hook));
        self
    }

    /// Build the stage
    ///
    /// # Errors
    /// Returns `PipelineError::Builder` if the name is empty or padded with whitespace
    pub fn build(self) -> PipelineResult<Stage> {
        if self.name.trim().is_empty() {
            return Err(PipelineError::Builder(
                "stage name must not be empty".to_string(),
            ));
        }
        if self.name.trim() != self.name {
            return Err(PipelineError::Builder(format!(
                "stage name '{}' has leading or trailing whitespace",
                self.name
            )));
        }

        Ok(Stage {
            name: self.name,
            steps: self.steps,
            on_complete: self.on_complete,
        })
    }
}
