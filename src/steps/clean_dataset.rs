use super::column_list;
use crate::dataset::Cell;
use crate::error::PipelineResult;
use crate::logger::Logger;
use crate::pipeline::{PipelineContext, Step, StepOutcome};
use std::collections::HashSet;

/// Step that drops unusable rows
///
/// A row is dropped when any configured column is null or blank text, or when
/// it is an exact duplicate of an earlier row.
///
/// # Context Requirements
/// - Input: `dataset` with every configured column
pub struct CleanDatasetStep {
    columns: Vec<String>,
}

impl CleanDatasetStep {
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

fn is_blank(cell: &Cell) -> bool {
    match cell {
        Cell::Null => true,
        Cell::Text(s) => s.trim().is_empty(),
        _ => false,
    }
}

// Cells hold floats, so rows are keyed by their JSON rendering
fn row_key(row: &[Cell]) -> String {
    serde_json::Value::Array(row.iter().map(Cell::to_json).collect()).to_string()
}

impl Step for CleanDatasetStep {
    fn run(&self, context: &mut PipelineContext, log: &Logger) -> PipelineResult<StepOutcome> {
        let dataset = context.require_dataset_mut(self.name())?;
        let indices = self
            .columns
            .iter()
            .map(|column| dataset.require_column("clean_dataset", column))
            .collect::<PipelineResult<Vec<_>>>()?;

        let before = dataset.len();
        let mut seen = HashSet::new();
        dataset.retain_rows(|row| {
            if indices.iter().any(|&i| is_blank(&row[i])) {
                return false;
            }
            seen.insert(row_key(row))
        });

        log.info(
            "steps::clean_dataset",
            &format!(
                "Dropped {} of {} rows (empty or duplicate)",
                before - dataset.len(),
                before
            ),
        );
        Ok(StepOutcome::Continue)
    }

    fn name(&self) -> &str {
        "clean_dataset"
    }
}
