use crate::error::PipelineResult;
use crate::logger::Logger;
use std::time::Duration;

use super::context::PipelineContext;

/// What a step tells its stage after a successful run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Go on with the next step
    Continue,
    /// Cached results already cover the rest of this stage; stop here
    SkipRemaining,
}

/// A single step in a stage
///
/// Each step performs one transformation of the pipeline context. Steps are
/// configured at construction and must not change that configuration while
/// running; a step checks its own inputs and fails with
/// [`PipelineError::MissingInput`](crate::error::PipelineError::MissingInput)
/// when a required key is absent.
///
/// # Example
/// ```
/// use stagewise::error::PipelineResult;
/// use stagewise::logger::Logger;
/// use stagewise::pipeline::{PipelineContext, Step, StepOutcome};
///
/// struct Shout;
///
/// impl Step for Shout {
///     fn run(&self, context: &mut PipelineContext, _log: &Logger) -> PipelineResult<StepOutcome> {
///         let input = context.require(self.name(), "input")?.to_string();
///         context.set_string("output", input.to_uppercase())?;
///         Ok(StepOutcome::Continue)
///     }
///
///     fn name(&self) -> &str {
///         "shout"
///     }
/// }
/// ```
pub trait Step: Send + Sync {
    /// Execute this step against the context
    fn run(&self, context: &mut PipelineContext, log: &Logger) -> PipelineResult<StepOutcome>;

    /// Stable name used in stats, logs and error messages
    fn name(&self) -> &str;

    /// Short human description
    fn description(&self) -> Option<&str> {
        None
    }

    /// Called right after a successful `run`
    ///
    /// Errors returned here are logged by the stage and otherwise ignored.
    fn record_stats(&self, context: &mut PipelineContext) -> PipelineResult<()> {
        context.stats_mut().record_time(self.name());
        Ok(())
    }
}

/// Result of one stage execution
#[derive(Debug, Clone)]
pub struct StageReport {
    /// Stage name
    pub stage_name: String,

    /// Names of the steps that ran, in order
    pub steps_run: Vec<String>,

    /// Whether a step cut the stage short with `SkipRemaining`
    pub skipped_remaining: bool,

    /// Duration of execution
    pub duration: Duration,
}

impl StageReport {
    pub fn new(stage_name: impl Into<String>) -> Self {
        Self {
            stage_name: stage_name.into(),
            steps_run: Vec::new(),
            skipped_remaining: false,
            duration: Duration::from_secs(0),
        }
    }

    /// Whether the stage was served from a checkpoint
    pub fn resumed(&self) -> bool {
        self.skipped_remaining
    }
}

/// Result of a complete pipeline execution
#[derive(Debug, Clone)]
pub struct PipelineReport {
    /// Pipeline name
    pub pipeline_name: String,

    /// Reports from each stage, in order
    pub stage_reports: Vec<StageReport>,

    /// Total duration
    pub total_duration: Duration,
}

impl PipelineReport {
    /// Total number of steps that ran across all stages
    pub fn steps_run(&self) -> usize {
        self.stage_reports.iter().map(|r| r.steps_run.len()).sum()
    }

    /// Names of the stages that were cut short by a skip signal
    pub fn resumed_stages(&self) -> Vec<&str> {
        self.stage_reports
            .iter()
            .filter(|r| r.skipped_remaining)
            .map(|r| r.stage_name.as_str())
            .collect()
    }

    pub fn stage(&self, name: &str) -> Option<&StageReport> {
        self.stage_reports.iter().find(|r| r.stage_name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop;

    impl Step for Noop {
        fn run(&self, _context: &mut PipelineContext, _log: &Logger) -> PipelineResult<StepOutcome> {
            Ok(StepOutcome::Continue)
        }

        fn name(&self) -> &str {
            "noop"
        }
    }

    #[test]
    fn test_default_record_stats_appends_time() {
        let mut context = PipelineContext::new();
        Noop.record_stats(&mut context).unwrap();
        Noop.record_stats(&mut context).unwrap();

        assert_eq!(context.stats().step_names(), vec!["noop", "noop"]);
        assert!(Noop.description().is_none());
    }

    #[test]
    fn test_stage_report_defaults() {
        let report = StageReport::new("loading");
        assert_eq!(report.stage_name, "loading");
        assert!(report.steps_run.is_empty());
        assert!(!report.resumed());
        assert_eq!(report.duration, Duration::from_secs(0));
    }

    #[test]
    fn test_pipeline_report_queries() {
        let mut loading = StageReport::new("loading");
        loading.steps_run.push("load_checkpoint".to_string());
        loading.skipped_remaining = true;

        let mut cleaning = StageReport::new("cleaning");
        cleaning.steps_run = vec!["trim".to_string(), "lowercase".to_string()];

        let report = PipelineReport {
            pipeline_name: "reviews".to_string(),
            stage_reports: vec![loading, cleaning],
            total_duration: Duration::from_millis(5),
        };

        assert_eq!(report.steps_run(), 3);
        assert_eq!(report.resumed_stages(), vec!["loading"]);
        assert!(report.stage("cleaning").is_some());
        assert!(report.stage("training").is_none());
    }
}
