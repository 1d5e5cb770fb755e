//! # Providers
//!
//! Capability interfaces for the three external collaborators that produce a
//! record's artifacts. Concrete backends (LLM script writers, TTS engines,
//! HTML renderers, ...) implement these traits and are selected by name
//! through the [`ProviderRegistry`].

use async_trait::async_trait;

use crate::config::VoiceConfig;
use crate::error::ProviderError;
use crate::news::NewsRecord;

pub mod builtin;
pub mod registry;

pub use builtin::{CardImageRenderer, HeadlineScriptGenerator, SilentSpeechSynthesizer};
pub use registry::{ProviderRegistry, Providers};

pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// Turns a news record into the text that is spoken and shown as caption
#[async_trait]
pub trait ScriptGenerator: Send + Sync {
    /// Returns the registry name of this generator
    fn name(&self) -> &str;

    async fn generate(&self, record: &NewsRecord) -> ProviderResult<String>;

    /// Script for the overview segment covering every record of the run
    async fn summarize(&self, records: &[NewsRecord]) -> ProviderResult<String> {
        let titles: Vec<&str> = records
            .iter()
            .map(|r| r.title.trim())
            .filter(|t| !t.is_empty())
            .collect();

        if titles.is_empty() {
            return Err(ProviderError::EmptyResponse {
                provider: self.name().to_string(),
            });
        }

        Ok(format!("Today's headlines: {}.", titles.join("; ")))
    }
}

/// Encoded audio as returned by a speech synthesizer
#[derive(Debug, Clone)]
pub struct SynthesizedAudio {
    pub bytes: Vec<u8>,

    /// Duration the synthesizer reports, if any; the decoded length wins
    pub duration_ms: Option<u64>,

    /// Container hint such as "wav" or "mp3"
    pub format: Option<String>,
}

/// Turns script text into narration audio
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    fn name(&self) -> &str;

    async fn synthesize(&self, text: &str, voice: &VoiceConfig) -> ProviderResult<SynthesizedAudio>;
}

/// Renders the still image shown while a record is narrated
#[async_trait]
pub trait ImageRenderer: Send + Sync {
    fn name(&self) -> &str;

    /// Encoded image bytes (PNG or JPEG), ideally at `size`
    async fn render(&self, record: &NewsRecord, caption: &str, size: (u32, u32)) -> ProviderResult<Vec<u8>>;
}
