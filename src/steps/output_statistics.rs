use crate::error::PipelineResult;
use crate::logger::Logger;
use crate::pipeline::{PipelineContext, Step, StepOutcome};
use std::fs;
use std::path::PathBuf;

/// Step that emits the run's `stats` as pretty JSON
///
/// With a path the JSON is written to that file, creating parent directories;
/// without one it goes to the log at info level.
#[derive(Default)]
pub struct OutputStatisticsStep {
    path: Option<PathBuf>,
}

impl OutputStatisticsStep {
    pub fn new() -> Self {
        Self { path: None }
    }

    pub fn to_file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }
}

impl Step for OutputStatisticsStep {
    fn run(&self, context: &mut PipelineContext, log: &Logger) -> PipelineResult<StepOutcome> {
        let json = serde_json::to_string_pretty(context.stats())?;

        match &self.path {
            Some(path) => {
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::write(path, json)?;
                log.info(
                    "steps::output_statistics",
                    &format!(
                        "Wrote statistics for {} steps to {}",
                        context.stats().time.len(),
                        path.display()
                    ),
                );
            }
            None => log.info("steps::output_statistics", &json),
        }

        Ok(StepOutcome::Continue)
    }

    fn name(&self) -> &str {
        "output_statistics"
    }

    // Stats are already out; an entry added now would not be in them
    fn record_stats(&self, _context: &mut PipelineContext) -> PipelineResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Stats;
    use tempfile::TempDir;

    #[test]
    fn test_writes_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("reports").join("stats.json");

        let mut context = PipelineContext::new();
        context.stats_mut().record_time("tokenization");
        context.stats_mut().model = Some("MajorityClass".to_string());

        OutputStatisticsStep::to_file(&path)
            .run(&mut context, &Logger::new())
            .unwrap();

        let written: Stats = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(&written, context.stats());
    }

    #[test]
    fn test_logs_without_path() {
        let log = Logger::new();
        let mut context = PipelineContext::new();
        OutputStatisticsStep::new().run(&mut context, &log).unwrap();

        assert!(log.entries().iter().any(|e| e.message.contains("\"time\"")));
    }
}
