use crate::dataset::Dataset;
use crate::error::{PipelineError, PipelineResult};
use crate::logger::Logger;
use crate::pipeline::{PipelineContext, Step, StepOutcome};
use std::path::PathBuf;

/// Step that reads a CSV file into the context
///
/// # Context Outputs
/// - `dataset` (Dataset) - replaces any existing dataset
pub struct LoadDatasetStep {
    path: PathBuf,
    required_columns: Vec<String>,
}

impl LoadDatasetStep {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            required_columns: Vec::new(),
        }
    }

    /// Fail unless the file has every one of these columns
    pub fn require_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_columns = columns.into_iter().map(Into::into).collect();
        self
    }
}

impl Step for LoadDatasetStep {
    fn run(&self, context: &mut PipelineContext, log: &Logger) -> PipelineResult<StepOutcome> {
        if !self.path.is_file() {
            return Err(PipelineError::step(
                self.name(),
                format!("dataset file does not exist: {}", self.path.display()),
            ));
        }

        let dataset = Dataset::from_csv_path(&self.path)
            .map_err(|e| PipelineError::step(self.name(), e.to_string()))?;

        for column in &self.required_columns {
            dataset.require_column(self.name(), column)?;
        }

        log.info(
            "steps::load_dataset",
            &format!(
                "Loaded {} rows with columns [{}] from {}",
                dataset.len(),
                dataset.columns().join(", "),
                self.path.display()
            ),
        );

        context.set_dataset(dataset);
        Ok(StepOutcome::Continue)
    }

    fn name(&self) -> &str {
        "load_dataset"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Cell;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_loads_csv() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("reviews.csv");
        fs::write(&path, "title,text,label\nGood,Works well,5\n").unwrap();

        let step = LoadDatasetStep::new(&path).require_columns(["text", "label"]);
        let mut context = PipelineContext::new();
        step.run(&mut context, &Logger::new()).unwrap();

        let dataset = context.dataset().unwrap();
        assert_eq!(dataset.len(), 1);
        assert_eq!(dataset.rows()[0][2], Cell::Int(5));
    }

    #[test]
    fn test_missing_file() {
        let step = LoadDatasetStep::new("/nonexistent/reviews.csv");
        let result = step.run(&mut PipelineContext::new(), &Logger::new());
        assert!(matches!(result, Err(PipelineError::StepExecution { .. })));
    }

    #[test]
    fn test_missing_required_column() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("reviews.csv");
        fs::write(&path, "title,body\nGood,Works well\n").unwrap();

        let step = LoadDatasetStep::new(&path).require_columns(["text"]);
        let mut context = PipelineContext::new();
        let err = step.run(&mut context, &Logger::new()).unwrap_err();

        assert!(matches!(err, PipelineError::MissingInput { ref key, .. } if key == "dataset.text"));
        assert!(context.dataset().is_none());
    }
}
