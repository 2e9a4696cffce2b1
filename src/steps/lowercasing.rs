use super::{column_list, map_text_columns};
use crate::error::PipelineResult;
use crate::logger::Logger;
use crate::pipeline::{PipelineContext, Step, StepOutcome};

/// Step that lowercases the configured text columns
pub struct LowercasingStep {
    columns: Vec<String>,
}

impl LowercasingStep {
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

impl Step for LowercasingStep {
    fn run(&self, context: &mut PipelineContext, log: &Logger) -> PipelineResult<StepOutcome> {
        let rows = map_text_columns(context, self.name(), &self.columns, str::to_lowercase)?;
        log.debug("steps::lowercasing", &format!("Lowercased {} rows", rows));
        Ok(StepOutcome::Continue)
    }

    fn name(&self) -> &str {
        "lowercasing"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steps::test_support::{text_context, texts};

    #[test]
    fn test_lowercases() {
        let mut context = text_context(&["Hello WORLD", "ÉTÉ"]);
        let step = LowercasingStep::new(["text"]);
        step.run(&mut context, &Logger::new()).unwrap();
        step.record_stats(&mut context).unwrap();

        assert_eq!(texts(&context, "text"), vec!["hello world", "été"]);
        assert_eq!(context.stats().step_names(), vec!["lowercasing"]);
    }
}
