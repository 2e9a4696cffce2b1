use crate::dataset::Cell;
use crate::error::PipelineResult;
use crate::logger::Logger;
use crate::pipeline::{PipelineContext, Step, StepOutcome};
use once_cell::sync::Lazy;
use regex::Regex;

static WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\w+").expect("word pattern is valid"));

/// Step that splits a text column into lowercase word tokens
///
/// Tokens are written space separated into `output`, which is created if it
/// does not exist and may be the input column itself.
///
/// # Context Requirements
/// - Input: `dataset` with `column`
///
/// # Context Outputs
/// - `dataset.output` (Text)
pub struct TokenizationStep {
    column: String,
    output: String,
}

impl TokenizationStep {
    pub fn new(column: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            output: output.into(),
        }
    }
}

pub(crate) fn tokenize(text: &str) -> Vec<String> {
    WORD.find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .collect()
}

impl Step for TokenizationStep {
    fn run(&self, context: &mut PipelineContext, log: &Logger) -> PipelineResult<StepOutcome> {
        let dataset = context.require_dataset_mut("tokenization")?;
        let index = dataset.require_column("tokenization", &self.column)?;

        let mut total = 0;
        let tokens: Vec<Cell> = dataset
            .rows()
            .iter()
            .map(|row| {
                let tokens = row[index].as_text().map(tokenize).unwrap_or_default();
                total += tokens.len();
                Cell::Text(tokens.join(" "))
            })
            .collect();

        dataset.set_column(&self.output, tokens)?;

        log.debug(
            "steps::tokenization",
            &format!(
                "Tokenized '{}' into '{}' ({} tokens)",
                self.column, self.output, total
            ),
        );
        Ok(StepOutcome::Continue)
    }

    fn name(&self) -> &str {
        "tokenization"
    }
}
