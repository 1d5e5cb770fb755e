//! # News-Compositor
//!
//! Turn a list of news items into a single narrated slideshow video.
//!
//! Each item becomes a segment: a spoken narration, a still image and a
//! caption. Segments are laid out on one time axis with transitions between
//! them and rendered into one audio+video file whose audio and video tracks
//! agree to within one frame.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use news_compositor::{
//!     config::Config,
//!     news::load_records,
//!     pipeline::Orchestrator,
//!     providers::ProviderRegistry,
//! };
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let config = Config::default();
//! let providers = ProviderRegistry::new().providers(&config.providers)?;
//! let records = load_records("news.json")?;
//!
//! let report = Orchestrator::new(config, providers).run(records, None).await?;
//! println!("{:?}: {}ms", report.result.output_path, report.result.duration_ms);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`providers`] - Script, speech and image collaborators behind traits
//! - [`timeline`] - Segment building and layout
//! - [`composition`] - Frame rendering, audio track, captions, manifest
//! - [`pipeline`] - Concurrent per-record fan-out and the run itself
//! - [`audio`] / [`video`] - Decoding, frames, encoder backend
//! - [`config`] - Configuration management
//!
//! ## Custom Providers
//!
//! Backends are plugged in by implementing one of the provider traits and
//! registering a factory:
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use news_compositor::error::ProviderError;
//! use news_compositor::news::NewsRecord;
//! use news_compositor::providers::{ProviderRegistry, ScriptGenerator};
//!
//! struct TitleOnly;
//!
//! #[async_trait]
//! impl ScriptGenerator for TitleOnly {
//!     fn name(&self) -> &str {
//!         "title-only"
//!     }
//!
//!     async fn generate(&self, record: &NewsRecord) -> Result<String, ProviderError> {
//!         Ok(record.title.clone())
//!     }
//! }
//!
//! let mut registry = ProviderRegistry::new();
//! registry.register_script("title-only", || Arc::new(TitleOnly));
//! ```

pub mod audio;
pub mod composition;
pub mod config;
pub mod error;
pub mod news;
pub mod pipeline;
pub mod providers;
pub mod timeline;
pub mod video;

// Re-export commonly used types for convenience
pub use crate::{
    composition::{CompositionResult, Compositor},
    config::Config,
    error::{CompositorError, Result},
    news::NewsRecord,
    pipeline::{Orchestrator, PipelineEvent, RunReport},
    providers::{ProviderRegistry, Providers},
    timeline::{schedule, Segment, SegmentBuilder, Timeline},
};
