//! Staged data-transformation pipeline with checkpoint and resume
//!
//! A [`pipeline::Pipeline`] runs named [`pipeline::Stage`]s in order over one
//! shared [`pipeline::PipelineContext`]. Stages can persist a context key when
//! they complete and skip their work on the next run when a
//! [`steps::LoadCheckpointStep`] finds it again.

pub mod checkpoint;
pub mod config;
pub mod dataset;
pub mod error;
pub mod logger;
pub mod pipeline;
pub mod steps;

pub use config::PipelineConfig;
pub use error::{CheckpointError, PipelineError, PipelineResult};
pub use logger::{LogLevel, Logger};
