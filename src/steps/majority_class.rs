use crate::dataset::Cell;
use crate::error::{PipelineError, PipelineResult};
use crate::logger::Logger;
use crate::pipeline::{PipelineContext, Step, StepOutcome};
use serde_json::json;
use std::collections::BTreeMap;

/// Context key holding `{"train": .., "test": ..}` accuracies
pub const ACCURACY_KEY: &str = "accuracy";

const MODEL_LABEL: &str = "MajorityClass";

/// Baseline model that always predicts the most frequent training label
///
/// Ties go to the label whose JSON form sorts first, so training is
/// deterministic.
///
/// # Context Requirements
/// - Input: `splits`
///
/// # Context Outputs
/// - `model` - `{"type": "majority_class", "label": <label>}`
/// - `hyperparameters` - `"default"`
/// - `accuracy`
/// - `stats.model`, `stats.hyperparameters_used`
#[derive(Default)]
pub struct MajorityClassStep;

impl MajorityClassStep {
    pub fn new() -> Self {
        Self
    }
}

fn accuracy(predicted: &Cell, labels: &[Cell]) -> Option<f64> {
    if labels.is_empty() {
        return None;
    }
    let hits = labels.iter().filter(|label| *label == predicted).count();
    Some(hits as f64 / labels.len() as f64)
}

impl Step for MajorityClassStep {
    fn run(&self, context: &mut PipelineContext, log: &Logger) -> PipelineResult<StepOutcome> {
        let splits = context.require_splits(self.name())?;

        let mut counts: BTreeMap<String, (usize, &Cell)> = BTreeMap::new();
        for label in &splits.y_train {
            counts
                .entry(label.to_json().to_string())
                .or_insert((0, label))
                .0 += 1;
        }

        let mut best: Option<(usize, &Cell)> = None;
        for &(count, label) in counts.values() {
            if best.map_or(true, |(best_count, _)| count > best_count) {
                best = Some((count, label));
            }
        }
        let label = best
            .map(|(_, label)| label.clone())
            .ok_or_else(|| PipelineError::step(self.name(), "training split has no labels"))?;

        let train_accuracy = accuracy(&label, &splits.y_train);
        let test_accuracy = accuracy(&label, &splits.y_test);

        log.info(
            "steps::majority_class",
            &format!(
                "Majority class is {} (train accuracy {:.3})",
                label,
                train_accuracy.unwrap_or_default()
            ),
        );

        context.set_model(json!({
            "type": "majority_class",
            "label": label.to_json(),
        }));
        context.set_hyperparameters(json!("default"));
        context.set(
            ACCURACY_KEY,
            json!({ "train": train_accuracy, "test": test_accuracy }),
        )?;
        Ok(StepOutcome::Continue)
    }

    fn name(&self) -> &str {
        "majority_class"
    }

    fn record_stats(&self, context: &mut PipelineContext) -> PipelineResult<()> {
        let stats = context.stats_mut();
        stats.record_time(self.name());
        stats.model = Some(MODEL_LABEL.to_string());
        stats.hyperparameters_used = Some(json!("default"));
        Ok(())
    }
}
