use crate::error::{PipelineError, PipelineResult};
use crate::logger::Logger;
use crate::pipeline::{PipelineContext, Step, StepOutcome};

/// Step that keeps rows whose text has between `min_length` and `max_length`
/// words, both inclusive
///
/// Rows where the column is not text count as zero words.
pub struct ApplyWordThresholdStep {
    column: String,
    min_length: usize,
    max_length: usize,
}

impl ApplyWordThresholdStep {
    pub fn new(column: impl Into<String>, min_length: usize, max_length: usize) -> Self {
        Self {
            column: column.into(),
            min_length,
            max_length,
        }
    }
}

impl Step for ApplyWordThresholdStep {
    fn run(&self, context: &mut PipelineContext, log: &Logger) -> PipelineResult<StepOutcome> {
        if self.min_length > self.max_length {
            return Err(PipelineError::step(
                self.name(),
                format!(
                    "min_length {} is greater than max_length {}",
                    self.min_length, self.max_length
                ),
            ));
        }

        let dataset = context.require_dataset_mut("apply_word_threshold")?;
        let index = dataset.require_column("apply_word_threshold", &self.column)?;
        let before = dataset.len();

        dataset.retain_rows(|row| {
            let words = row[index]
                .as_text()
                .map(|text| text.split_whitespace().count())
                .unwrap_or(0);
            (self.min_length..=self.max_length).contains(&words)
        });

        log.info(
            "steps::word_threshold",
            &format!(
                "Kept {} of {} rows with {}..={} words in '{}'",
                dataset.len(),
                before,
                self.min_length,
                self.max_length,
                self.column
            ),
        );
        Ok(StepOutcome::Continue)
    }

    fn name(&self) -> &str {
        "apply_word_threshold"
    }
}
