//! # Audio Module
//!
//! Decoding of narration clips and music beds, format conversion, and WAV
//! output for the composed narration track.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use news_compositor::audio::{AudioLoader, writer::write_wav};
//!
//! # fn main() -> anyhow::Result<()> {
//! let bytes = std::fs::read("narration.mp3")?;
//! let clip = AudioLoader::decode(&bytes, Some("mp3"))?;
//! println!("{} ms at {} Hz", clip.duration_ms, clip.sample_rate);
//!
//! let mono = clip.converted(44100, 1);
//! write_wav("narration.wav", &mono)?;
//! # Ok(())
//! # }
//! ```

pub mod loader;
pub mod types;
pub mod writer;

pub use loader::AudioLoader;
pub use types::{AudioClip, AudioFormat};
