use super::{column_list, map_text_columns};
use crate::error::PipelineResult;
use crate::logger::Logger;
use crate::pipeline::{PipelineContext, Step, StepOutcome};

/// Step that collapses runs of whitespace to one space and trims the ends
///
/// # Context Requirements
/// - Input: `dataset` with every configured column
pub struct WhitespaceTrimmingStep {
    columns: Vec<String>,
}

impl WhitespaceTrimmingStep {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: column_list(columns),
        }
    }
}

pub(crate) fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

impl Step for WhitespaceTrimmingStep {
    fn run(&self, context: &mut PipelineContext, log: &Logger) -> PipelineResult<StepOutcome> {
        let rows = map_text_columns(context, self.name(), &self.columns, collapse_whitespace)?;
        log.debug(
            "steps::whitespace_trimming",
            &format!("Trimmed whitespace in {} rows", rows),
        );
        Ok(StepOutcome::Continue)
    }

    fn name(&self) -> &str {
        "whitespace_trimming"
    }
}
