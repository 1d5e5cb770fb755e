//! # Video Module
//!
//! Frames, image fitting, and the encoder seam the compositor renders into.

pub mod encoder;
pub mod fit;
pub mod types;

pub use encoder::{CaptionBurnIn, EncodeJob, EncodedVideo, EncoderBackend, FfmpegEncoder, FrameSink};
pub use fit::{decode_image, fit_image};
pub use types::Frame;
