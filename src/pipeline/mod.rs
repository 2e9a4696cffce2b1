//! Staged pipeline engine
//!
//! A [`Pipeline`] is an ordered list of [`Stage`]s, each an ordered list of
//! [`Step`]s. One [`PipelineContext`] is threaded through every step in turn.
//! A step may end its stage early with [`StepOutcome::SkipRemaining`], which
//! is how a checkpoint loader resumes a stage without recomputing it. After a
//! stage completes its `on_complete` hook fires once; hooks from
//! [`callbacks`] use it to persist checkpoints.
//!
//! # Example
//! ```
//! use stagewise::checkpoint::{MemoryCheckpointStore, SerializationMode};
//! use stagewise::dataset::{Cell, Dataset};
//! use stagewise::pipeline::{callbacks, Pipeline, PipelineContext, Stage};
//! use stagewise::steps::{BagOfWordsVectorizationStep, LoadCheckpointStep, TokenizationStep};
//! use std::sync::Arc;
//!
//! let store = Arc::new(MemoryCheckpointStore::new());
//!
//! let processing = Stage::builder("processing")
//!     .add_step(LoadCheckpointStep::new(store.clone(), "processing", "dataset", SerializationMode::Opaque))
//!     .add_step(TokenizationStep::new("text", "tokens"))
//!     .add_step(BagOfWordsVectorizationStep::new("tokens", "vector"))
//!     .on_complete(callbacks::save_checkpoint(store.clone(), "dataset", SerializationMode::Opaque))
//!     .build()
//!     .unwrap();
//!
//! let pipeline = Pipeline::builder("reviews").add_stage(processing).build().unwrap();
//!
//! let mut context = PipelineContext::new();
//! context.set_dataset(Dataset::from_rows(["text"], vec![vec![Cell::text("hello world")]]).unwrap());
//! pipeline.run(&mut context).unwrap();
//!
//! // Second run resumes from the checkpoint without running the steps
//! let mut resumed = PipelineContext::new();
//! let report = pipeline.run(&mut resumed).unwrap();
//! assert_eq!(report.resumed_stages(), vec!["processing"]);
//! assert_eq!(resumed.dataset(), context.dataset());
//! assert!(resumed.stats().time.is_empty());
//! ```

pub mod callbacks;
pub mod context;
pub mod core;
pub mod executor;
pub mod stage;
pub mod stats;

// Re-export main types
pub use context::{keys, PipelineContext, Splits};
pub use self::core::{PipelineReport, StageReport, Step, StepOutcome};
pub use executor::{Pipeline, PipelineBuilder};
pub use stage::{CompletionHook, Stage, StageBuilder};
pub use stats::{Stats, TimeEntry};
