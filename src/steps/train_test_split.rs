use crate::dataset::Cell;
use crate::error::{PipelineError, PipelineResult};
use crate::logger::Logger;
use crate::pipeline::{PipelineContext, Splits, Step, StepOutcome};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Step that shuffles the dataset with a fixed seed and splits it into
/// train and test sets
///
/// The test set gets `ceil(rows * test_size)` rows. The same seed over the
/// same dataset always yields the same split.
///
/// # Context Requirements
/// - Input: `dataset` with `feature_column` (Vector) and `label_column`
///
/// # Context Outputs
/// - `splits`
pub struct TrainTestSplitStep {
    feature_column: String,
    label_column: String,
    test_size: f64,
    seed: u64,
}

impl TrainTestSplitStep {
    pub fn new(feature_column: impl Into<String>, label_column: impl Into<String>) -> Self {
        Self {
            feature_column: feature_column.into(),
            label_column: label_column.into(),
            test_size: 0.2,
            seed: 42,
        }
    }

    pub fn test_size(mut self, test_size: f64) -> Self {
        self.test_size = test_size;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

impl Step for TrainTestSplitStep {
    fn run(&self, context: &mut PipelineContext, log: &Logger) -> PipelineResult<StepOutcome> {
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return Err(PipelineError::step(
                self.name(),
                format!("test_size must be in (0, 1), got {}", self.test_size),
            ));
        }

        let dataset = context.require_dataset(self.name())?;
        let features = dataset.require_column(self.name(), &self.feature_column)?;
        let labels = dataset.require_column(self.name(), &self.label_column)?;

        let rows = dataset.len();
        let test_rows = (rows as f64 * self.test_size).ceil() as usize;
        if test_rows == 0 || test_rows >= rows {
            return Err(PipelineError::step(
                self.name(),
                format!(
                    "cannot split {} rows with test_size {}: one side would be empty",
                    rows, self.test_size
                ),
            ));
        }

        let mut order: Vec<usize> = (0..rows).collect();
        let mut rng = StdRng::seed_from_u64(self.seed);
        order.shuffle(&mut rng);

        let mut x: Vec<Vec<f64>> = Vec::with_capacity(rows);
        let mut y: Vec<Cell> = Vec::with_capacity(rows);
        for &i in &order {
            let row = &dataset.rows()[i];
            let vector = row[features].as_vector().ok_or_else(|| PipelineError::InvalidType {
                key: format!("dataset.{}", self.feature_column),
                expected: "a vector",
            })?;
            x.push(vector.to_vec());
            y.push(row[labels].clone());
        }

        let x_train = x.split_off(test_rows);
        let y_train = y.split_off(test_rows);
        let splits = Splits {
            x_train,
            y_train,
            x_test: x,
            y_test: y,
        };

        log.info(
            "steps::train_test_split",
            &format!(
                "Split {} rows into {} train / {} test (seed {})",
                rows,
                splits.x_train.len(),
                splits.x_test.len(),
                self.seed
            ),
        );

        context.set_splits(splits);
        Ok(StepOutcome::Continue)
    }

    fn name(&self) -> &str {
        "train_test_split"
    }
}
