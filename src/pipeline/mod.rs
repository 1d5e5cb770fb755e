//! # Pipeline Module
//!
//! The orchestrator drives a whole run: per-record artifact generation
//! with bounded concurrency, then layout and composition. Progress is
//! reported as a stream of [`PipelineEvent`]s.

pub mod events;
pub mod orchestrator;

pub use events::{PipelineEvent, ProgressReporter};
pub use orchestrator::{Orchestrator, RunReport};
