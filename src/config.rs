use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Main configuration for the News-Compositor
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Output video settings
    pub video: VideoConfig,

    /// Segment layout settings
    pub timeline: TimelineConfig,

    /// Narration track settings
    pub audio: AudioConfig,

    /// Caption overlay settings
    pub captions: CaptionConfig,

    /// Voice parameters forwarded to the speech synthesizer
    pub voice: VoiceConfig,

    /// Which registered providers to inject
    pub providers: ProviderConfig,

    /// Orchestration settings
    pub pipeline: PipelineConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound { path: path.display().to_string() })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::ParseFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    /// Render the configuration as pretty TOML
    pub fn to_toml(&self) -> Result<String> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::InvalidValue {
            key: "config".to_string(),
            value: e.to_string(),
        })?;
        Ok(content)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.video.validate()?;
        self.timeline.validate()?;
        self.audio.validate()?;
        self.pipeline.validate()?;
        Ok(())
    }

    /// Where the manifest is written, if at all
    pub fn manifest_path(&self) -> Option<PathBuf> {
        if !self.pipeline.write_manifest {
            return None;
        }
        Some(self.pipeline.manifest_path.clone().unwrap_or_else(|| {
            let mut name = self.pipeline.output_path.as_os_str().to_owned();
            name.push(".manifest.json");
            PathBuf::from(name)
        }))
    }
}

fn invalid<K: Into<String>, V: ToString>(key: K, value: V) -> crate::error::CompositorError {
    ConfigError::InvalidValue {
        key: key.into(),
        value: value.to_string(),
    }
    .into()
}

/// How a rendered image that does not match the output resolution is fitted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitPolicy {
    /// Scale to fit inside the frame, pad with the background colour
    #[default]
    Letterbox,
    /// Scale to cover the frame, center-crop the overflow
    Crop,
}

/// Output video configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    pub width: u32,
    pub height: u32,

    /// Output frame rate
    pub fps: f64,

    /// Video codec handed to the encoder
    pub codec: String,

    /// Quality setting (0-100, higher is better)
    pub quality: u8,

    pub fit: FitPolicy,

    /// Letterbox bar colour
    pub background: [u8; 3],

    /// Fade from black at the start of the video
    pub fade_in_ms: u64,

    /// Fade to black at the end of the video
    pub fade_out_ms: u64,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            fps: 30.0,
            codec: "libx264".to_string(),
            quality: 85,
            fit: FitPolicy::Letterbox,
            background: [0, 0, 0],
            fade_in_ms: 0,
            fade_out_ms: 0,
        }
    }
}

impl VideoConfig {
    fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(invalid("video.resolution", format!("{}x{}", self.width, self.height)));
        }

        // yuv420p needs even dimensions
        if self.width % 2 != 0 || self.height % 2 != 0 {
            return Err(invalid("video.resolution", format!("{}x{}", self.width, self.height)));
        }

        if !self.fps.is_finite() || self.fps <= 0.0 {
            return Err(invalid("video.fps", self.fps));
        }

        if self.quality > 100 {
            return Err(invalid("video.quality", self.quality));
        }

        if self.codec.trim().is_empty() {
            return Err(invalid("video.codec", "<empty>"));
        }

        Ok(())
    }
}

/// How adjacent segments are joined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    Cut,
    #[default]
    Crossfade,
}

impl std::fmt::Display for TransitionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransitionKind::Cut => f.write_str("cut"),
            TransitionKind::Crossfade => f.write_str("crossfade"),
        }
    }
}

/// Segment layout configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineConfig {
    /// Floor for how long each image stays on screen
    pub min_image_duration_ms: u64,

    /// Requested overlap between adjacent segments (capped per pair)
    pub transition_duration_ms: u64,

    pub transition_kind: TransitionKind,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            min_image_duration_ms: 5000,
            transition_duration_ms: 500,
            transition_kind: TransitionKind::Crossfade,
        }
    }
}

impl TimelineConfig {
    fn validate(&self) -> Result<()> {
        if self.min_image_duration_ms > 10 * 60 * 1000 {
            return Err(invalid("timeline.min_image_duration_ms", self.min_image_duration_ms));
        }
        Ok(())
    }
}

/// How narration behaves inside a visual transition window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioTransition {
    /// Every narration plays untouched from its segment start. A narration
    /// that fills its segment is still speaking through the outgoing
    /// transition, summed with the next one.
    #[default]
    Concatenate,
    /// Linear gain ramps across the transition window
    Crossfade,
}

/// Narration track configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Output sample rate (Hz)
    pub sample_rate: u32,

    /// Output channel count (1 = mono, 2 = stereo)
    pub channels: u16,

    pub transition: AudioTransition,

    /// Optional music bed looped under the narration
    pub background_music: Option<PathBuf>,

    /// Gain applied to the music bed (0.0-1.0)
    pub background_volume: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            channels: 1,
            transition: AudioTransition::Concatenate,
            background_music: None,
            background_volume: 0.3,
        }
    }
}

impl AudioConfig {
    fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(invalid("audio.sample_rate", self.sample_rate));
        }

        if !(1..=2).contains(&self.channels) {
            return Err(invalid("audio.channels", self.channels));
        }

        if !(0.0..=1.0).contains(&self.background_volume) {
            return Err(invalid("audio.background_volume", self.background_volume));
        }

        Ok(())
    }
}

/// Caption overlay configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptionConfig {
    pub enabled: bool,
    pub font_name: String,
    pub font_size: u32,
    /// Distance from the bottom edge in pixels
    pub margin_v: u32,
}

impl Default for CaptionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            font_name: "Sans".to_string(),
            font_size: 28,
            margin_v: 40,
        }
    }
}

/// Voice parameters for the speech synthesizer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    pub voice: String,
    /// Relative speaking rate, e.g. "+10%" or "-5%"
    pub rate: String,
    /// Relative volume, e.g. "+0%"
    pub volume: String,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            voice: "zh-CN-XiaoxiaoNeural".to_string(),
            rate: "+0%".to_string(),
            volume: "+0%".to_string(),
        }
    }
}

impl VoiceConfig {
    /// Parse the relative rate into a speed multiplier (1.0 = normal)
    pub fn rate_multiplier(&self) -> f64 {
        parse_percent(&self.rate)
            .map(|p| (1.0 + p / 100.0).max(0.1))
            .unwrap_or(1.0)
    }
}

fn parse_percent(value: &str) -> Option<f64> {
    value.trim().strip_suffix('%')?.trim().parse::<f64>().ok()
}

/// Registry names of the providers to use
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub script: String,
    pub speech: String,
    pub image: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            script: "headline".to_string(),
            speech: "silent".to_string(),
            image: "card".to_string(),
        }
    }
}

/// Orchestration configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Maximum number of records whose artifacts are generated at once
    pub max_concurrency: usize,

    pub output_path: PathBuf,

    /// Defaults to `<output_path>.manifest.json`
    pub manifest_path: Option<PathBuf>,

    pub write_manifest: bool,

    /// Base directory for the per-run workspace (system temp dir if unset)
    pub temp_dir: Option<PathBuf>,

    /// Cancel the run after this many seconds
    pub timeout_secs: Option<u64>,

    /// Prepend a summary segment covering all records
    pub include_overview: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrency: num_cpus::get().clamp(1, 4),
            output_path: PathBuf::from("output/news_video.mp4"),
            manifest_path: None,
            write_manifest: true,
            temp_dir: None,
            timeout_secs: None,
            include_overview: false,
        }
    }
}

impl PipelineConfig {
    fn validate(&self) -> Result<()> {
        if self.max_concurrency == 0 {
            return Err(invalid("pipeline.max_concurrency", self.max_concurrency));
        }

        if self.output_path.as_os_str().is_empty() {
            return Err(invalid("pipeline.output_path", "<empty>"));
        }

        if self.timeout_secs == Some(0) {
            return Err(invalid("pipeline.timeout_secs", 0));
        }

        Ok(())
    }
}
