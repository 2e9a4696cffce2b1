use std::path::PathBuf;
use thiserror::Error;

/// Central error type for pipeline execution
#[derive(Error, Debug)]
pub enum PipelineError {
    // ============================================================================
    // Step Errors
    // ============================================================================
    #[error("Step '{step}' requires context key '{key}', which is not present")]
    MissingInput { step: String, key: String },

    #[error("Step '{step}' failed: {message}")]
    StepExecution { step: String, message: String },

    #[error("Context key '{key}' does not hold {expected}")]
    InvalidType { key: String, expected: &'static str },

    #[error("Dataset shape error: {0}")]
    Shape(String),

    // ============================================================================
    // Stage Errors
    // ============================================================================
    /// Wraps a step failure with the identity of the stage and step it came from
    #[error("Stage '{stage}' failed at step '{step}': {source}")]
    StageFailed {
        stage: String,
        step: String,
        #[source]
        source: Box<PipelineError>,
    },

    // ============================================================================
    // Checkpoint Errors
    // ============================================================================
    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    // ============================================================================
    // Generic/System Errors
    // ============================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    /// Builder pattern validation error
    #[error("Builder error: {0}")]
    Builder(String),
}

impl PipelineError {
    /// Shorthand for a missing context key
    pub fn missing(step: impl Into<String>, key: impl Into<String>) -> Self {
        PipelineError::MissingInput {
            step: step.into(),
            key: key.into(),
        }
    }

    /// Shorthand for a failure inside a step's own logic
    pub fn step(step: impl Into<String>, message: impl Into<String>) -> Self {
        PipelineError::StepExecution {
            step: step.into(),
            message: message.into(),
        }
    }

    /// Peel off stage wrappers and return the error raised by the step itself
    pub fn root_cause(&self) -> &PipelineError {
        match self {
            PipelineError::StageFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Stage and step identity, if this error crossed a stage boundary
    pub fn location(&self) -> Option<(&str, &str)> {
        match self {
            PipelineError::StageFailed { stage, step, .. } => Some((stage.as_str(), step.as_str())),
            _ => None,
        }
    }
}

/// Failures reading or writing checkpoints
///
/// These are never fatal to a run: loaders treat them as "not found" and
/// completion hooks log them and move on.
#[derive(Error, Debug)]
pub enum CheckpointError {
    #[error("Checkpoint IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt checkpoint at {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("Value for key '{key}' is not tabular and cannot be stored in structured form")]
    NotTabular { key: String },

    #[error("Invalid checkpoint name: {0}")]
    InvalidName(String),

    #[error("Failed to encode checkpoint: {0}")]
    Encode(String),
}

// Helper type alias for Results
pub type PipelineResult<T> = Result<T, PipelineError>;
