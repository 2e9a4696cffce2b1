use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One `(step name, timestamp)` pair in [`Stats::time`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeEntry {
    pub step: String,
    pub timestamp: DateTime<Utc>,
}

/// Per-run bookkeeping kept inside the context under the `stats` key
///
/// The engine only guarantees the shape; reporting steps interpret it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    /// Completed steps in execution order
    pub time: Vec<TimeEntry>,

    /// Human label of the trained model
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub hyperparameters_used: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub hyperparameters_searched: Option<Value>,
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `(step, now)` to the time log
    pub fn record_time(&mut self, step: impl Into<String>) {
        self.time.push(TimeEntry {
            step: step.into(),
            timestamp: Utc::now(),
        });
    }

    /// Step names in the order they were recorded
    pub fn step_names(&self) -> Vec<&str> {
        self.time.iter().map(|entry| entry.step.as_str()).collect()
    }

    /// Wall-clock time between the first and last recorded step
    pub fn elapsed(&self) -> Option<chrono::Duration> {
        let first = self.time.first()?;
        let last = self.time.last()?;
        Some(last.timestamp - first.timestamp)
    }

    /// Copy of these stats with all timestamps zeroed, for comparing runs
    pub fn without_timestamps(&self) -> Stats {
        let mut stripped = self.clone();
        for entry in &mut stripped.time {
            entry.timestamp = DateTime::<Utc>::UNIX_EPOCH;
        }
        stripped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_time_preserves_order() {
        let mut stats = Stats::new();
        stats.record_time("tokenize");
        stats.record_time("vectorize");

        assert_eq!(stats.step_names(), vec!["tokenize", "vectorize"]);
        assert!(stats.time[0].timestamp <= stats.time[1].timestamp);
        assert!(stats.elapsed().unwrap() >= chrono::Duration::zero());
    }

    #[test]
    fn test_empty_stats_have_no_elapsed() {
        assert!(Stats::new().elapsed().is_none());
    }

    #[test]
    fn test_serialized_shape() {
        let mut stats = Stats::new();
        stats.record_time("train");
        stats.model = Some("Majority Class".to_string());

        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["time"][0]["step"], "train");
        assert_eq!(json["model"], "Majority Class");
        assert!(json.get("hyperparameters_used").is_none());
    }

    #[test]
    fn test_hyperparameters_searched_serializes() {
        let mut stats = Stats::new();
        stats.hyperparameters_used = Some(serde_json::json!({"C": 1.0}));
        stats.hyperparameters_searched = Some(serde_json::json!({"C": [0.1, 1.0, 10.0]}));

        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["hyperparameters_used"]["C"], 1.0);
        assert_eq!(json["hyperparameters_searched"]["C"][2], 10.0);

        let back: Stats = serde_json::from_value(json).unwrap();
        assert_eq!(back, stats);
        assert!(serde_json::to_value(Stats::new())
            .unwrap()
            .get("hyperparameters_searched")
            .is_none());
    }

    #[test]
    fn test_without_timestamps() {
        let mut first = Stats::new();
        first.record_time("a");
        std::thread::sleep(std::time::Duration::from_millis(2));
        let mut second = Stats::new();
        second.record_time("a");

        assert_eq!(first.without_timestamps(), second.without_timestamps());
    }
}
