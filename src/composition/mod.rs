//! # Composition Module
//!
//! Renders a [`Timeline`](crate::timeline::Timeline) into one audio+video
//! file, plus the caption track and the timing manifest.

pub mod captions;
pub mod compositor;
pub mod manifest;
pub mod output;

pub use captions::{CaptionCue, CaptionTrack};
pub use compositor::{CompositionResult, Compositor, FrameSource};
pub use manifest::{Manifest, ManifestEntry};
