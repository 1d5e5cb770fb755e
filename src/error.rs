use std::fmt;

use thiserror::Error;

/// Main error type for the News-Compositor library
#[derive(Error, Debug)]
pub enum CompositorError {
    #[error("Artifact error: {0}")]
    Artifact(#[from] ArtifactError),

    #[error("Record skipped: {0}")]
    SkippedRecord(#[from] SkippedRecordError),

    #[error("Timeline error: {0}")]
    Timeline(#[from] TimelineError),

    #[error("Composition error: {0}")]
    Composition(#[from] CompositionError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("No valid segments: {attempted} record(s) attempted, {skipped} skipped")]
    NoValidSegments { attempted: usize, skipped: usize },

    #[error("Run cancelled: {reason}")]
    Cancelled { reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Generic error: {0}")]
    Generic(String),
}

/// Pipeline stage a per-record failure happened in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Script,
    Speech,
    Image,
    Segment,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Script => "script",
            Stage::Speech => "speech",
            Stage::Image => "image",
            Stage::Segment => "segment",
        };
        f.write_str(name)
    }
}

/// One record's generated material is missing or invalid
#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("Script is empty")]
    EmptyScript,

    #[error("Audio stream is empty")]
    EmptyAudio,

    #[error("Audio has zero duration")]
    ZeroDuration,

    #[error("Audio decoding failed: {reason}")]
    AudioDecodeFailed { reason: String },

    #[error("Unsupported audio format: {format}")]
    UnsupportedAudioFormat { format: String },

    #[error("Image stream is empty")]
    EmptyImage,

    #[error("Image decoding failed: {reason}")]
    ImageDecodeFailed { reason: String },

    #[error("Invalid image dimensions: {width}x{height}")]
    InvalidImageDimensions { width: u32, height: u32 },

    #[error("{stage} generation failed: {source}")]
    GenerationFailed {
        stage: Stage,
        #[source]
        source: ProviderError,
    },
}

/// A record dropped after an [`ArtifactError`]; never fatal on its own
#[derive(Error, Debug)]
#[error("record #{index} ({record_id}) skipped at {stage} stage: {source}")]
pub struct SkippedRecordError {
    pub index: usize,
    pub record_id: String,
    pub stage: Stage,
    #[source]
    pub source: ArtifactError,
}

/// Layout invariant violations
#[derive(Error, Debug)]
pub enum TimelineError {
    #[error("Timeline needs at least one valid segment")]
    Empty,

    #[error("Segment #{index} ({record_id}) has non-positive display duration")]
    ZeroLengthSegment { index: usize, record_id: String },

    #[error("Invalid timeline parameters: {details}")]
    InvalidParameters { details: String },
}

/// Fatal render / mux failures
#[derive(Error, Debug)]
pub enum CompositionError {
    #[error("Frame rendering failed at frame {frame}: {reason}")]
    FrameFailed { frame: u64, reason: String },

    #[error("Audio rendering failed: {reason}")]
    AudioFailed { reason: String },

    #[error("Encoder not available: {reason}")]
    EncoderUnavailable { reason: String },

    #[error("Video encoding failed: {reason}")]
    EncodingFailed { reason: String },

    #[error("Audio/video sync check failed: audio {audio_ms:.1}ms vs video {video_ms:.1}ms (tolerance {tolerance_ms:.1}ms)")]
    SyncFailed {
        audio_ms: f64,
        video_ms: f64,
        tolerance_ms: f64,
    },

    #[error("Output generation failed: {reason}")]
    OutputFailed { reason: String },
}

/// Failures reported by external collaborators (script, speech, image)
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("{provider}: {reason}")]
    Failed { provider: String, reason: String },

    #[error("{provider} returned no content")]
    EmptyResponse { provider: String },

    #[error("Provider not registered: {name}")]
    NotFound { name: String },
}

impl ProviderError {
    pub fn failed<P: Into<String>, R: Into<String>>(provider: P, reason: R) -> Self {
        Self::Failed {
            provider: provider.into(),
            reason: reason.into(),
        }
    }
}

/// Configuration-specific errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse configuration file: {path}: {reason}")]
    ParseFailed { path: String, reason: String },

    #[error("Invalid configuration value: {key} = {value}")]
    InvalidValue { key: String, value: String },

    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },
}

/// Convenience type alias for Results using CompositorError
pub type Result<T> = std::result::Result<T, CompositorError>;

impl CompositorError {
    /// Create a generic error with a custom message
    pub fn generic<S: Into<String>>(message: S) -> Self {
        Self::Generic(message.into())
    }

    /// Whether this error ends the whole run.
    ///
    /// Per-record failures are converted into skips by the orchestrator and
    /// never reach the scheduler or compositor.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Artifact(_) | Self::SkippedRecord(_))
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Self::NoValidSegments { attempted, .. } => {
                format!("None of the {} news record(s) produced a usable segment; no video was written.", attempted)
            }
            Self::Composition(CompositionError::EncoderUnavailable { .. }) => {
                "FFmpeg not found. Please install FFmpeg and make sure it is on your PATH.".to_string()
            }
            Self::Config(ConfigError::FileNotFound { path }) => {
                format!("Configuration file '{}' not found.", path)
            }
            Self::Provider(ProviderError::NotFound { name }) => {
                format!("Provider '{}' is not registered. Use --help to list the built-in providers.", name)
            }
            _ => self.to_string(),
        }
    }
}
