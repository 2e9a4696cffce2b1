use crate::dataset::Cell;
use crate::error::PipelineResult;
use crate::logger::Logger;
use crate::pipeline::{PipelineContext, Step, StepOutcome};
use std::collections::HashMap;

/// Context key holding the fitted vocabulary as a JSON array of terms
pub const VOCABULARY_KEY: &str = "vocabulary";

/// Step that turns whitespace-separated tokens into term-count vectors
///
/// The vocabulary is ordered by descending corpus frequency, ties broken
/// alphabetically, and cut to `max_features` when set. Every row gets a
/// `Vector` with one count per vocabulary term.
///
/// # Context Requirements
/// - Input: `dataset` with `column` (usually the tokenization output)
///
/// # Context Outputs
/// - `dataset.output` (Vector)
/// - `vocabulary` (JSON array of strings)
pub struct BagOfWordsVectorizationStep {
    column: String,
    output: String,
    max_features: Option<usize>,
}

impl BagOfWordsVectorizationStep {
    pub fn new(column: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            output: output.into(),
            max_features: None,
        }
    }

    /// Keep only the `max_features` most frequent terms
    pub fn max_features(mut self, max_features: usize) -> Self {
        self.max_features = Some(max_features);
        self
    }
}

pub(crate) fn build_vocabulary<'a, I>(documents: I, max_features: Option<usize>) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for document in documents {
        for term in document.split_whitespace() {
            *counts.entry(term).or_insert(0) += 1;
        }
    }

    let mut terms: Vec<(&str, usize)> = counts.into_iter().collect();
    terms.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    if let Some(max) = max_features {
        terms.truncate(max);
    }
    terms.into_iter().map(|(term, _)| term.to_string()).collect()
}

impl Step for BagOfWordsVectorizationStep {
    fn run(&self, context: &mut PipelineContext, log: &Logger) -> PipelineResult<StepOutcome> {
        let dataset = context.require_dataset_mut("bag_of_words_vectorization")?;
        let index = dataset.require_column("bag_of_words_vectorization", &self.column)?;

        let documents: Vec<&str> = dataset
            .rows()
            .iter()
            .map(|row| row[index].as_text().unwrap_or(""))
            .collect();
        let vocabulary = build_vocabulary(documents.iter().copied(), self.max_features);
        let positions: HashMap<&str, usize> = vocabulary
            .iter()
            .enumerate()
            .map(|(i, term)| (term.as_str(), i))
            .collect();

        let vectors: Vec<Cell> = documents
            .iter()
            .map(|document| {
                let mut counts = vec![0.0; vocabulary.len()];
                for term in document.split_whitespace() {
                    if let Some(&i) = positions.get(term) {
                        counts[i] += 1.0;
                    }
                }
                Cell::Vector(counts)
            })
            .collect();

        dataset.set_column(&self.output, vectors)?;

        log.info(
            "steps::bag_of_words",
            &format!(
                "Vectorized '{}' into '{}' with {} features",
                self.column,
                self.output,
                vocabulary.len()
            ),
        );

        context.set(VOCABULARY_KEY, serde_json::json!(vocabulary))?;
        Ok(StepOutcome::Continue)
    }

    fn name(&self) -> &str {
        "bag_of_words_vectorization"
    }
}
