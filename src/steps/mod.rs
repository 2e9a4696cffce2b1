//! Concrete steps for a text-classification run
//!
//! Each step declares the context keys it reads and writes, fails fast when an
//! input is missing, and records a time entry after it runs:
//! 1. LoadCheckpointStep - Resume a stage from a saved checkpoint
//! 2. LoadDatasetStep - Read a CSV file into `dataset`
//! 3. CleanDatasetStep - Drop rows with empty text and duplicate rows
//! 4. RemoveHtmlTagsStep - Strip markup from text columns
//! 5. WhitespaceTrimmingStep - Collapse and trim whitespace
//! 6. LowercasingStep - Lowercase text columns
//! 7. ApplyWordThresholdStep - Keep rows within a word-count range
//! 8. TokenizationStep - Split text into word tokens
//! 9. BagOfWordsVectorizationStep - Term-count vectors
//! 10. TrainTestSplitStep - Seeded shuffle into `splits`
//! 11. MajorityClassStep - Baseline model
//! 12. OutputStatisticsStep - Emit `stats`

pub mod bag_of_words;
pub mod clean_dataset;
pub mod load_checkpoint;
pub mod load_dataset;
pub mod lowercasing;
pub mod majority_class;
pub mod output_statistics;
pub mod remove_html_tags;
pub mod tokenization;
pub mod train_test_split;
pub mod whitespace_trimming;
pub mod word_threshold;

pub use bag_of_words::BagOfWordsVectorizationStep;
pub use clean_dataset::CleanDatasetStep;
pub use load_checkpoint::LoadCheckpointStep;
pub use load_dataset::LoadDatasetStep;
pub use lowercasing::LowercasingStep;
pub use majority_class::MajorityClassStep;
pub use output_statistics::OutputStatisticsStep;
pub use remove_html_tags::RemoveHtmlTagsStep;
pub use tokenization::TokenizationStep;
pub use train_test_split::TrainTestSplitStep;
pub use whitespace_trimming::WhitespaceTrimmingStep;
pub use word_threshold::ApplyWordThresholdStep;

use crate::dataset::Cell;
use crate::error::PipelineResult;
use crate::pipeline::PipelineContext;

pub(crate) fn column_list<I, S>(columns: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    columns.into_iter().map(Into::into).collect()
}

/// Rewrite every text cell of `columns` in the context dataset
///
/// All columns are resolved before anything is touched, so a missing column
/// leaves the dataset unchanged. Non-text cells pass through as they are.
pub(crate) fn map_text_columns<F>(
    context: &mut PipelineContext,
    step: &str,
    columns: &[String],
    f: F,
) -> PipelineResult<usize>
where
    F: Fn(&str) -> String,
{
    let dataset = context.require_dataset_mut(step)?;
    let indices = columns
        .iter()
        .map(|column| dataset.require_column(step, column))
        .collect::<PipelineResult<Vec<_>>>()?;

    for &index in &indices {
        dataset.map_column(index, |cell| match cell.as_text() {
            Some(text) => Cell::Text(f(text)),
            None => cell.clone(),
        });
    }

    Ok(dataset.len())
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::dataset::{Cell, Dataset};
    use crate::pipeline::PipelineContext;

    /// Context holding a single-column `text` dataset
    pub fn text_context(texts: &[&str]) -> PipelineContext {
        let rows = texts.iter().map(|t| vec![Cell::text(*t)]).collect();
        let mut context = PipelineContext::with_run_id("test");
        context.set_dataset(Dataset::from_rows(["text"], rows).unwrap());
        context
    }

    pub fn texts(context: &PipelineContext, column: &str) -> Vec<String> {
        context
            .dataset()
            .unwrap()
            .column(column)
            .unwrap()
            .into_iter()
            .map(|cell| cell.to_string())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::error::PipelineError;

    #[test]
    fn test_map_text_columns_skips_non_text() {
        let mut context = text_context(&["A"]);
        context
            .require_dataset_mut("t")
            .unwrap()
            .push_row(vec![Cell::Int(3)])
            .unwrap();

        let rows = map_text_columns(&mut context, "t", &column_list(["text"]), |s| {
            s.to_lowercase()
        })
        .unwrap();

        assert_eq!(rows, 2);
        assert_eq!(
            context.dataset().unwrap().column("text").unwrap(),
            vec![&Cell::text("a"), &Cell::Int(3)]
        );
    }

    #[test]
    fn test_map_text_columns_missing_column_is_atomic() {
        let mut context = text_context(&["A"]);
        let err = map_text_columns(
            &mut context,
            "lowercasing",
            &column_list(["text", "title"]),
            |s| s.to_lowercase(),
        )
        .unwrap_err();

        assert!(matches!(err, PipelineError::MissingInput { ref key, .. } if key == "dataset.title"));
        assert_eq!(texts(&context, "text"), vec!["A"]);
    }
}
