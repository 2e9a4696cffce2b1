use crate::checkpoint::CheckpointValue;
use crate::dataset::{Cell, Dataset};
use crate::error::{PipelineError, PipelineResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use super::stats::Stats;

/// Well-known context keys
///
/// | key               | type              | written by                     |
/// |-------------------|-------------------|--------------------------------|
/// | `dataset`         | [`Dataset`]       | loaders, cleaning, processing  |
/// | `splits`          | [`Splits`]        | train/test splitting           |
/// | `model`           | JSON              | training steps                 |
/// | `hyperparameters` | JSON              | training steps                 |
/// | `stats`           | [`Stats`]         | every step via `record_stats`  |
///
/// Any other key lives in the JSON extension bag.
pub mod keys {
    pub const DATASET: &str = "dataset";
    pub const SPLITS: &str = "splits";
    pub const MODEL: &str = "model";
    pub const HYPERPARAMETERS: &str = "hyperparameters";
    pub const STATS: &str = "stats";

    pub const WELL_KNOWN: [&str; 5] = [DATASET, SPLITS, MODEL, HYPERPARAMETERS, STATS];
}

/// Train/test feature matrices and labels
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Splits {
    pub x_train: Vec<Vec<f64>>,
    pub y_train: Vec<Cell>,
    pub x_test: Vec<Vec<f64>>,
    pub y_test: Vec<Cell>,
}

/// Pipeline context that holds data passed between steps
///
/// One context is threaded through a whole run. The caller creates it, every
/// executed step mutates it, and it stays with the caller afterwards whether
/// the run succeeded or failed.
///
/// # Example
/// ```
/// use stagewise::pipeline::PipelineContext;
///
/// let mut context = PipelineContext::with_run_id("run-1");
/// context.set_string("source", "reviews.csv").unwrap();
///
/// assert!(context.has("source"));
/// assert!(context.dataset().is_none());
/// ```
#[derive(Debug, Clone)]
pub struct PipelineContext {
    run_id: String,
    dataset: Option<Dataset>,
    splits: Option<Splits>,
    model: Option<Value>,
    hyperparameters: Option<Value>,
    stats: Stats,

    /// Extension bag for ad hoc keys
    data: HashMap<String, Value>,

    /// Metadata about the pipeline execution
    metadata: HashMap<String, String>,
}

impl PipelineContext {
    /// Create an empty context with a fresh run id
    pub fn new() -> Self {
        Self::with_run_id(uuid::Uuid::new_v4().to_string())
    }

    pub fn with_run_id(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            dataset: None,
            splits: None,
            model: None,
            hyperparameters: None,
            stats: Stats::new(),
            data: HashMap::new(),
            metadata: HashMap::new(),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    // ------------------------------------------------------------------
    // dataset
    // ------------------------------------------------------------------

    pub fn dataset(&self) -> Option<&Dataset> {
        self.dataset.as_ref()
    }

    pub fn set_dataset(&mut self, dataset: Dataset) {
        self.dataset = Some(dataset);
    }

    pub fn take_dataset(&mut self) -> Option<Dataset> {
        self.dataset.take()
    }

    /// The dataset, or a `MissingInput` error naming `step`
    pub fn require_dataset(&self, step: &str) -> PipelineResult<&Dataset> {
        self.dataset
            .as_ref()
            .ok_or_else(|| PipelineError::missing(step, keys::DATASET))
    }

    pub fn require_dataset_mut(&mut self, step: &str) -> PipelineResult<&mut Dataset> {
        self.dataset
            .as_mut()
            .ok_or_else(|| PipelineError::missing(step, keys::DATASET))
    }

    // ------------------------------------------------------------------
    // splits / model / hyperparameters
    // ------------------------------------------------------------------

    pub fn splits(&self) -> Option<&Splits> {
        self.splits.as_ref()
    }

    pub fn set_splits(&mut self, splits: Splits) {
        self.splits = Some(splits);
    }

    pub fn require_splits(&self, step: &str) -> PipelineResult<&Splits> {
        self.splits
            .as_ref()
            .ok_or_else(|| PipelineError::missing(step, keys::SPLITS))
    }

    pub fn model(&self) -> Option<&Value> {
        self.model.as_ref()
    }

    pub fn set_model(&mut self, model: Value) {
        self.model = Some(model);
    }

    pub fn hyperparameters(&self) -> Option<&Value> {
        self.hyperparameters.as_ref()
    }

    pub fn set_hyperparameters(&mut self, hyperparameters: Value) {
        self.hyperparameters = Some(hyperparameters);
    }

    // ------------------------------------------------------------------
    // stats
    // ------------------------------------------------------------------

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub fn stats_mut(&mut self) -> &mut Stats {
        &mut self.stats
    }

    // ------------------------------------------------------------------
    // generic access
    // ------------------------------------------------------------------

    /// Set a value by key
    ///
    /// Well-known keys land in their typed fields, so `set("model", ..)` is
    /// the same as [`set_model`](Self::set_model). `dataset`, `splits` and
    /// `stats` are converted from their JSON form and fail with `InvalidType`
    /// when the value does not have that shape. Any other key goes to the
    /// extension bag.
    pub fn set(&mut self, key: impl Into<String>, value: Value) -> PipelineResult<()> {
        let key = key.into();
        match key.as_str() {
            keys::DATASET => self.dataset = Some(from_json(&key, value, "a dataset")?),
            keys::SPLITS => self.splits = Some(from_json(&key, value, "train/test splits")?),
            keys::MODEL => self.model = Some(value),
            keys::HYPERPARAMETERS => self.hyperparameters = Some(value),
            keys::STATS => self.stats = from_json(&key, value, "stats")?,
            other => {
                self.data.insert(other.to_string(), value);
            }
        }
        Ok(())
    }

    /// Get a JSON value by key
    ///
    /// Covers `model`, `hyperparameters` and the extension bag. `dataset`,
    /// `splits` and `stats` are typed; read them through their accessors or
    /// [`snapshot`](Self::snapshot).
    pub fn get(&self, key: &str) -> Option<&Value> {
        match key {
            keys::MODEL => self.model.as_ref(),
            keys::HYPERPARAMETERS => self.hyperparameters.as_ref(),
            keys::DATASET | keys::SPLITS | keys::STATS => None,
            other => self.data.get(other),
        }
    }

    /// Get a JSON value or fail with `MissingInput` naming `step`
    pub fn require(&self, step: &str, key: &str) -> PipelineResult<&Value> {
        self.get(key).ok_or_else(|| PipelineError::missing(step, key))
    }

    pub fn set_string(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> PipelineResult<()> {
        self.set(key, Value::String(value.into()))
    }

    /// Get a string value; `Ok(None)` when absent
    pub fn get_string(&self, key: &str) -> PipelineResult<Option<&str>> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(_) => Err(PipelineError::InvalidType {
                key: key.to_string(),
                expected: "a string",
            }),
        }
    }

    pub fn set_bool(&mut self, key: impl Into<String>, value: bool) -> PipelineResult<()> {
        self.set(key, Value::Bool(value))
    }

    pub fn get_bool(&self, key: &str) -> PipelineResult<Option<bool>> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(_) => Err(PipelineError::InvalidType {
                key: key.to_string(),
                expected: "a boolean",
            }),
        }
    }

    /// Check if a key exists, well-known or extension
    pub fn has(&self, key: &str) -> bool {
        match key {
            keys::DATASET => self.dataset.is_some(),
            keys::SPLITS => self.splits.is_some(),
            keys::MODEL => self.model.is_some(),
            keys::HYPERPARAMETERS => self.hyperparameters.is_some(),
            keys::STATS => true,
            other => self.data.contains_key(other),
        }
    }

    /// Remove a value and return it in JSON form
    ///
    /// `stats` is always present; removing it resets it to empty stats.
    pub fn remove(&mut self, key: &str) -> PipelineResult<Option<Value>> {
        let removed = match key {
            keys::DATASET => self.dataset.take().map(serde_json::to_value).transpose()?,
            keys::SPLITS => self.splits.take().map(serde_json::to_value).transpose()?,
            keys::MODEL => self.model.take(),
            keys::HYPERPARAMETERS => self.hyperparameters.take(),
            keys::STATS => Some(serde_json::to_value(std::mem::take(&mut self.stats))?),
            other => self.data.remove(other),
        };
        Ok(removed)
    }

    /// All present keys, sorted
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = keys::WELL_KNOWN
            .iter()
            .filter(|key| self.has(key))
            .map(|key| key.to_string())
            .chain(self.data.keys().cloned())
            .collect();
        keys.sort();
        keys
    }

    // ------------------------------------------------------------------
    // metadata
    // ------------------------------------------------------------------

    pub fn set_metadata(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.metadata.insert(key.into(), value.into());
    }

    pub fn get_metadata(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(|s| s.as_str())
    }

    pub fn metadata(&self) -> &HashMap<String, String> {
        &self.metadata
    }

    // ------------------------------------------------------------------
    // checkpoint snapshot / restore
    // ------------------------------------------------------------------

    /// Copy of the value under `key` in checkpointable form; `None` if absent
    pub fn snapshot(&self, key: &str) -> PipelineResult<Option<CheckpointValue>> {
        let value = match key {
            keys::DATASET => self.dataset.clone().map(CheckpointValue::Table),
            keys::SPLITS => match &self.splits {
                Some(splits) => Some(CheckpointValue::Json(serde_json::to_value(splits)?)),
                None => None,
            },
            keys::MODEL => self.model.clone().map(CheckpointValue::Json),
            keys::HYPERPARAMETERS => self.hyperparameters.clone().map(CheckpointValue::Json),
            keys::STATS => Some(CheckpointValue::Json(serde_json::to_value(&self.stats)?)),
            other => self.data.get(other).cloned().map(CheckpointValue::Json),
        };
        Ok(value)
    }

    /// Write a checkpointed value back under `key`, replacing what was there
    pub fn restore(&mut self, key: &str, value: CheckpointValue) -> PipelineResult<()> {
        match (key, value) {
            (keys::DATASET, CheckpointValue::Table(dataset)) => self.dataset = Some(dataset),
            (keys::DATASET, CheckpointValue::Json(_)) => {
                return Err(PipelineError::InvalidType {
                    key: key.to_string(),
                    expected: "a table",
                })
            }
            (_, CheckpointValue::Table(dataset)) => {
                let json = serde_json::to_value(&dataset)?;
                self.restore(key, CheckpointValue::Json(json))?;
            }
            (keys::SPLITS, CheckpointValue::Json(json)) => {
                self.splits = Some(serde_json::from_value(json)?)
            }
            (keys::MODEL, CheckpointValue::Json(json)) => self.model = Some(json),
            (keys::HYPERPARAMETERS, CheckpointValue::Json(json)) => {
                self.hyperparameters = Some(json)
            }
            (keys::STATS, CheckpointValue::Json(json)) => self.stats = serde_json::from_value(json)?,
            (other, CheckpointValue::Json(json)) => {
                self.data.insert(other.to_string(), json);
            }
        }
        Ok(())
    }

    /// Equality of every key, ignoring the run id and stats timestamps
    pub fn content_eq(&self, other: &PipelineContext) -> bool {
        self.dataset == other.dataset
            && self.splits == other.splits
            && self.model == other.model
            && self.hyperparameters == other.hyperparameters
            && self.stats.without_timestamps() == other.stats.without_timestamps()
            && self.data == other.data
    }
}

impl Default for PipelineContext {
    fn default() -> Self {
        Self::new()
    }
}

fn from_json<T: DeserializeOwned>(key: &str, value: Value, expected: &'static str) -> PipelineResult<T> {
    serde_json::from_value(value).map_err(|_| PipelineError::InvalidType {
        key: key.to_string(),
        expected,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dataset() -> Dataset {
        Dataset::from_rows(["text"], vec![vec![Cell::text("hello world")]]).unwrap()
    }

    #[test]
    fn test_context_creation() {
        let context = PipelineContext::with_run_id("run-123");
        assert_eq!(context.run_id(), "run-123");
        assert_eq!(context.keys(), vec!["stats".to_string()]);
        assert!(context.stats().time.is_empty());
    }

    #[test]
    fn test_fresh_run_ids_differ() {
        assert_ne!(PipelineContext::new().run_id(), PipelineContext::new().run_id());
    }

    #[test]
    fn test_require_dataset_missing() {
        let context = PipelineContext::new();
        let err = context.require_dataset("tokenize").unwrap_err();
        assert!(matches!(
            err,
            PipelineError::MissingInput { ref step, ref key } if step == "tokenize" && key == "dataset"
        ));
    }

    #[test]
    fn test_extension_values() {
        let mut context = PipelineContext::new();
        context.set_string("source", "reviews.csv").unwrap();
        context.set_bool("balanced", true).unwrap();

        assert_eq!(context.get_string("source").unwrap(), Some("reviews.csv"));
        assert_eq!(context.get_bool("balanced").unwrap(), Some(true));
        assert_eq!(context.get_string("missing").unwrap(), None);
        assert!(context.get_bool("source").is_err());
        assert!(context.require("step", "missing").is_err());

        context.remove("source").unwrap();
        assert!(!context.has("source"));
    }

    #[test]
    fn test_keys_include_well_known() {
        let mut context = PipelineContext::new();
        context.set_dataset(dataset());
        context.set("extra", json!(1)).unwrap();

        assert_eq!(context.keys(), vec!["dataset", "extra", "stats"]);
    }

    #[test]
    fn test_set_routes_well_known_keys() {
        let mut context = PipelineContext::new();
        context.set("model", json!({"label": 1})).unwrap();
        context.set("hyperparameters", json!("default")).unwrap();

        assert!(context.has("model"));
        assert_eq!(context.model(), Some(&json!({"label": 1})));
        assert_eq!(context.get("model"), Some(&json!({"label": 1})));
        assert_eq!(context.hyperparameters(), Some(&json!("default")));
        assert_eq!(
            context.snapshot("model").unwrap(),
            Some(CheckpointValue::Json(json!({"label": 1})))
        );
        assert_eq!(context.keys(), vec!["hyperparameters", "model", "stats"]);

        assert_eq!(context.remove("model").unwrap(), Some(json!({"label": 1})));
        assert!(!context.has("model"));
        assert!(context.model().is_none());
        assert_eq!(context.keys(), vec!["hyperparameters", "stats"]);
    }

    #[test]
    fn test_set_converts_typed_keys() {
        let mut context = PipelineContext::new();
        context
            .set("dataset", serde_json::to_value(dataset()).unwrap())
            .unwrap();
        context
            .set(
                "splits",
                json!({"x_train": [[1.0]], "y_train": [{"Int": 1}], "x_test": [], "y_test": []}),
            )
            .unwrap();

        assert_eq!(context.dataset(), Some(&dataset()));
        assert_eq!(context.splits().unwrap().y_train, vec![Cell::Int(1)]);
        assert!(context.get("dataset").is_none());
        assert_eq!(context.keys(), vec!["dataset", "splits", "stats"]);

        let removed = context.remove("dataset").unwrap().unwrap();
        assert_eq!(serde_json::from_value::<Dataset>(removed).unwrap(), dataset());
        assert!(!context.has("dataset"));
    }

    #[test]
    fn test_set_rejects_badly_shaped_typed_keys() {
        let mut context = PipelineContext::new();

        for (key, value) in [
            ("dataset", json!([1, 2])),
            ("dataset", json!({"columns": ["a"], "rows": [[]]})),
            ("splits", json!("not splits")),
            ("stats", json!(42)),
        ] {
            let result = context.set(key, value);
            assert!(
                matches!(result, Err(PipelineError::InvalidType { key: ref k, .. }) if k == key),
                "{} accepted a bad value",
                key
            );
        }
        assert_eq!(context.keys(), vec!["stats"]);
        assert!(context.stats().time.is_empty());
    }

    #[test]
    fn test_snapshot_restore_dataset() {
        let mut context = PipelineContext::new();
        assert!(context.snapshot("dataset").unwrap().is_none());

        context.set_dataset(dataset());
        let snapshot = context.snapshot("dataset").unwrap().unwrap();

        let mut other = PipelineContext::new();
        other.restore("dataset", snapshot).unwrap();
        assert_eq!(other.dataset(), Some(&dataset()));
    }

    #[test]
    fn test_restore_rejects_json_dataset() {
        let mut context = PipelineContext::new();
        let result = context.restore("dataset", CheckpointValue::Json(json!([1, 2])));
        assert!(matches!(result, Err(PipelineError::InvalidType { .. })));
    }

    #[test]
    fn test_snapshot_restore_splits_and_extension() {
        let mut context = PipelineContext::new();
        context.set_splits(Splits {
            x_train: vec![vec![1.0, 0.0]],
            y_train: vec![Cell::Int(1)],
            x_test: vec![],
            y_test: vec![],
        });
        context.set("vocabulary", json!(["hello", "world"])).unwrap();

        let splits = context.snapshot("splits").unwrap().unwrap();
        let vocabulary = context.snapshot("vocabulary").unwrap().unwrap();

        let mut other = PipelineContext::new();
        other.restore("splits", splits).unwrap();
        other.restore("vocabulary", vocabulary).unwrap();

        assert_eq!(other.splits(), context.splits());
        assert_eq!(other.get("vocabulary"), Some(&json!(["hello", "world"])));
    }

    #[test]
    fn test_metadata() {
        let mut context = PipelineContext::new();
        context.set_metadata("pipeline_name", "reviews");
        assert_eq!(context.get_metadata("pipeline_name"), Some("reviews"));
        assert_eq!(context.metadata().len(), 1);
    }

    #[test]
    fn test_content_eq_ignores_run_id_and_timestamps() {
        let mut first = PipelineContext::with_run_id("a");
        let mut second = PipelineContext::with_run_id("b");
        first.set_dataset(dataset());
        second.set_dataset(dataset());
        first.stats_mut().record_time("load");
        second.stats_mut().record_time("load");

        assert!(first.content_eq(&second));

        second.set_model(json!("majority"));
        assert!(!first.content_eq(&second));
    }
}
