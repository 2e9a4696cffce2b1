//! Run configuration
//!
//! Loaded from a JSON file or from `STAGEWISE_*` environment variables (with
//! `.env` support), or assembled in code through [`PipelineConfigBuilder`].

use crate::checkpoint::{CheckpointStore, FileCheckpointStore, SerializationMode};
use crate::error::{PipelineError, PipelineResult};
use crate::logger::{LogLevel, Logger, DEFAULT_LOG_CAPACITY};
use crate::pipeline::callbacks::CheckpointSaver;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const ENV_RUN_NAME: &str = "STAGEWISE_RUN_NAME";
pub const ENV_CHECKPOINT_DIR: &str = "STAGEWISE_CHECKPOINT_DIR";
pub const ENV_CHECKPOINTS: &str = "STAGEWISE_CHECKPOINTS";
pub const ENV_LOG_LEVEL: &str = "STAGEWISE_LOG_LEVEL";

static DOTENV_LOADED: Lazy<()> = Lazy::new(|| {
    let _ = dotenvy::dotenv();
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckpointSettings {
    pub enabled: bool,
    pub base_dir: PathBuf,
}

impl Default for CheckpointSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            base_dir: PathBuf::from("checkpoints"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    pub min_level: LogLevel,
    pub buffer_capacity: usize,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            min_level: LogLevel::Info,
            buffer_capacity: DEFAULT_LOG_CAPACITY,
        }
    }
}

/// Settings for one pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub run_name: String,
    pub checkpoint: CheckpointSettings,
    pub log: LogSettings,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            run_name: "stagewise".to_string(),
            checkpoint: CheckpointSettings::default(),
            log: LogSettings::default(),
        }
    }
}

impl PipelineConfig {
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::new()
    }

    /// Read a JSON config file; missing fields take their defaults
    pub fn from_file(path: impl AsRef<Path>) -> PipelineResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_str(&raw).map_err(|e| {
            PipelineError::Config(format!("invalid config {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overridden by `STAGEWISE_*` variables, after loading `.env`
    pub fn from_env() -> PipelineResult<Self> {
        Lazy::force(&DOTENV_LOADED);
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Like [`PipelineConfig::from_env`] but reading variables through `lookup`
    pub fn from_lookup<F>(lookup: F) -> PipelineResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = Self::builder();

        if let Some(name) = lookup(ENV_RUN_NAME) {
            builder = builder.run_name(name);
        }
        if let Some(dir) = lookup(ENV_CHECKPOINT_DIR) {
            builder = builder.checkpoint_dir(dir);
        }
        if let Some(flag) = lookup(ENV_CHECKPOINTS) {
            builder = builder.checkpoints_enabled(parse_flag(ENV_CHECKPOINTS, &flag)?);
        }
        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            let level = LogLevel::parse(&level).ok_or_else(|| {
                PipelineError::Config(format!("{}: unknown log level '{}'", ENV_LOG_LEVEL, level))
            })?;
            builder = builder.log_level(level);
        }

        builder.build()
    }

    fn validate(&self) -> PipelineResult<()> {
        if self.run_name.trim().is_empty() {
            return Err(PipelineError::Config("run_name must not be empty".to_string()));
        }
        if self.checkpoint.enabled && self.checkpoint.base_dir.as_os_str().is_empty() {
            return Err(PipelineError::Config(
                "checkpoint.base_dir must be set when checkpoints are enabled".to_string(),
            ));
        }
        if self.log.buffer_capacity == 0 {
            return Err(PipelineError::Config(
                "log.buffer_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Logger honouring the configured level and buffer size
    pub fn logger(&self) -> Logger {
        let logger = Logger::with_capacity(self.log.buffer_capacity);
        logger.set_min_level(self.log.min_level);
        logger
    }

    /// File store rooted at `checkpoint.base_dir`, or `None` when disabled
    pub fn checkpoint_store(&self) -> Option<Arc<dyn CheckpointStore>> {
        if !self.checkpoint.enabled {
            return None;
        }
        Some(Arc::new(FileCheckpointStore::new(&self.checkpoint.base_dir)))
    }

    /// Saver for `key`, inert when checkpoints are disabled
    pub fn checkpoint_saver(&self, key: &str, mode: SerializationMode) -> CheckpointSaver {
        match self.checkpoint_store() {
            Some(store) => CheckpointSaver::new(store, key, mode),
            None => CheckpointSaver::disabled(key, mode),
        }
    }
}

fn parse_flag(name: &str, value: &str) -> PipelineResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(PipelineError::Config(format!(
            "{}: expected a boolean, got '{}'",
            name, other
        ))),
    }
}

/// Fluent builder for [`PipelineConfig`]
#[derive(Debug, Default)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn run_name(mut self, name: impl Into<String>) -> Self {
        self.config.run_name = name.into();
        self
    }

    pub fn checkpoint_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.checkpoint.base_dir = dir.into();
        self
    }

    pub fn checkpoints_enabled(mut self, enabled: bool) -> Self {
        self.config.checkpoint.enabled = enabled;
        self
    }

    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.config.log.min_level = level;
        self
    }

    pub fn log_buffer_capacity(mut self, capacity: usize) -> Self {
        self.config.log.buffer_capacity = capacity;
        self
    }

    /// # Errors
    /// Returns `PipelineError::Config` if a setting is out of range
    pub fn build(self) -> PipelineResult<PipelineConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::PipelineContext;
    use crate::pipeline::callbacks::SaveOutcome;
    use crate::pipeline::Stage;
    use std::collections::HashMap;
    use std::fs;
    use tempfile::TempDir;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::builder().build().unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert!(config.checkpoint.enabled);
        assert_eq!(config.log.min_level, LogLevel::Info);
    }

    #[test]
    fn test_from_lookup() {
        let config = PipelineConfig::from_lookup(lookup(&[
            (ENV_RUN_NAME, "reviews"),
            (ENV_CHECKPOINT_DIR, "/tmp/ckpt"),
            (ENV_CHECKPOINTS, "off"),
            (ENV_LOG_LEVEL, "debug"),
        ]))
        .unwrap();

        assert_eq!(config.run_name, "reviews");
        assert_eq!(config.checkpoint.base_dir, PathBuf::from("/tmp/ckpt"));
        assert!(!config.checkpoint.enabled);
        assert_eq!(config.log.min_level, LogLevel::Debug);
    }

    #[test]
    fn test_from_lookup_rejects_bad_values() {
        assert!(PipelineConfig::from_lookup(lookup(&[(ENV_CHECKPOINTS, "maybe")])).is_err());
        assert!(PipelineConfig::from_lookup(lookup(&[(ENV_LOG_LEVEL, "loud")])).is_err());
        assert!(PipelineConfig::from_lookup(lookup(&[(ENV_RUN_NAME, "  ")])).is_err());
    }

    #[test]
    fn test_from_file_partial() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"run_name": "nightly", "log": {"min_level": "warn"}}"#,
        )
        .unwrap();

        let config = PipelineConfig::from_file(&path).unwrap();
        assert_eq!(config.run_name, "nightly");
        assert_eq!(config.log.min_level, LogLevel::Warn);
        assert_eq!(config.log.buffer_capacity, DEFAULT_LOG_CAPACITY);
        assert_eq!(config.checkpoint, CheckpointSettings::default());
    }

    #[test]
    fn test_from_file_errors() {
        let temp_dir = TempDir::new().unwrap();
        assert!(matches!(
            PipelineConfig::from_file(temp_dir.path().join("absent.json")),
            Err(PipelineError::Config(_))
        ));

        let path = temp_dir.path().join("bad.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            PipelineConfig::from_file(&path),
            Err(PipelineError::Config(_))
        ));
    }

    #[test]
    fn test_logger_uses_level() {
        let config = PipelineConfig::builder()
            .log_level(LogLevel::Warn)
            .build()
            .unwrap();
        let logger = config.logger();
        logger.info("test", "dropped");
        logger.warn("test", "kept");
        assert_eq!(logger.entries().len(), 1);
    }

    #[test]
    fn test_disabled_saver() {
        let config = PipelineConfig::builder()
            .checkpoints_enabled(false)
            .build()
            .unwrap();
        assert!(config.checkpoint_store().is_none());

        let saver = config.checkpoint_saver("dataset", SerializationMode::Opaque);
        let stage = Stage::builder("loading").build().unwrap();
        let outcome = saver.save(&stage, &PipelineContext::new(), &Logger::new());
        assert_eq!(outcome, SaveOutcome::Disabled);
    }
}
