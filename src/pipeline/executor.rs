use super::context::PipelineContext;
use super::core::PipelineReport;
use super::stage::Stage;
use crate::error::{PipelineError, PipelineResult};
use crate::logger::Logger;
use std::collections::HashSet;
use std::time::Instant;

/// Pipeline executor that runs stages sequentially
///
/// # Example
/// ```
/// use stagewise::pipeline::{Pipeline, PipelineContext, Stage};
/// use stagewise::steps::WhitespaceTrimmingStep;
///
/// let pipeline = Pipeline::builder("reviews")
///     .add_stage(
///         Stage::builder("cleaning")
///             .add_step(WhitespaceTrimmingStep::new(["text"]))
///             .build()
///             .unwrap(),
///     )
///     .build()
///     .unwrap();
///
/// let mut context = PipelineContext::new();
/// // Fails: nothing has loaded a dataset yet
/// assert!(pipeline.run(&mut context).is_err());
/// ```
pub struct Pipeline {
    name: String,
    stages: Vec<Stage>,
    logger: Logger,
}

impl Pipeline {
    /// Create a new pipeline builder
    pub fn builder(name: impl Into<String>) -> PipelineBuilder {
        PipelineBuilder::new(name)
    }

    /// Get the pipeline name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the number of stages
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// The logging handle passed to every stage and step
    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    /// Execute the pipeline
    ///
    /// Stages run strictly in declared order. The first failure stops the run
    /// and is returned as is; whatever earlier steps wrote to the context stays
    /// there, and checkpoints already saved stay on disk.
    pub fn run(&self, context: &mut PipelineContext) -> PipelineResult<PipelineReport> {
        self.logger.info(
            "pipeline",
            &format!(
                "Starting pipeline '{}' with {} stages (run: {})",
                self.name,
                self.stages.len(),
                context.run_id()
            ),
        );

        let pipeline_start = Instant::now();
        let mut stage_reports = Vec::with_capacity(self.stages.len());

        context.set_metadata("pipeline_name", &self.name);

        for (index, stage) in self.stages.iter().enumerate() {
            self.logger.info(
                "pipeline",
                &format!(
                    "Executing stage {}/{}: {} (run: {})",
                    index + 1,
                    self.stages.len(),
                    stage.name(),
                    context.run_id()
                ),
            );

            match stage.run(context, &self.logger) {
                Ok(report) => stage_reports.push(report),
                Err(e) => {
                    self.logger.error(
                        "pipeline",
                        &format!(
                            "Pipeline '{}' aborted after {:.2}s: {} (run: {})",
                            self.name,
                            pipeline_start.elapsed().as_secs_f64(),
                            e,
                            context.run_id()
                        ),
                    );
                    return Err(e);
                }
            }
        }

        let total_duration = pipeline_start.elapsed();
        self.logger.info(
            "pipeline",
            &format!(
                "Pipeline '{}' completed successfully in {:.2}s (run: {})",
                self.name,
                total_duration.as_secs_f64(),
                context.run_id()
            ),
        );

        Ok(PipelineReport {
            pipeline_name: self.name.clone(),
            stage_reports,
            total_duration,
        })
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("name", &self.name)
            .field("stages", &self.stages)
            .finish()
    }
}

/// Builder for constructing pipelines
pub struct PipelineBuilder {
    name: String,
    stages: Vec<Stage>,
    logger: Option<Logger>,
}

impl PipelineBuilder {
    /// Create a new pipeline builder
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stages: Vec::new(),
            logger: None,
        }
    }

    /// Add a stage to the pipeline
    pub fn add_stage(mut self, stage: Stage) -> Self {
        self.stages.push(stage);
        self
    }

    /// Use `logger` instead of a fresh one
    pub fn logger(mut self, logger: Logger) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Build the pipeline
    ///
    /// # Errors
    /// Returns `PipelineError::Builder` if the name is empty or two stages share a name
    pub fn build(self) -> PipelineResult<Pipeline> {
        if self.name.trim().is_empty() {
            return Err(PipelineError::Builder(
                "pipeline name must not be empty".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for stage in &self.stages {
            if !seen.insert(stage.name()) {
                return Err(PipelineError::Builder(format!(
                    "duplicate stage name '{}' in pipeline '{}'",
                    stage.name(),
                    self.name
                )));
            }
        }

        Ok(Pipeline {
            name: self.name,
            stages: self.stages,
            logger: self.logger.unwrap_or_default(),
        })
    }
}
