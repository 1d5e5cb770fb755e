use tracing::{debug, warn};

use crate::audio::{AudioClip, AudioLoader};
use crate::config::Config;
use crate::error::ArtifactError;
use crate::news::NewsRecord;
use crate::providers::SynthesizedAudio;
use crate::video::{decode_image, fit_image, Frame};

/// Reported and decoded narration lengths may disagree by this much before we warn
const DURATION_MISMATCH_WARN_MS: u64 = 50;

/// One news item's narration, still image and caption, ready for layout
///
/// Immutable once built; the timeline takes ownership of it.
#[derive(Debug, Clone)]
pub struct Segment {
    record_id: String,
    title: String,
    caption: String,
    audio: AudioClip,
    image: Frame,
    display_duration_ms: u64,
}

impl Segment {
    /// Assemble a segment; the image stays on screen at least `min_image_duration_ms`
    pub fn new(
        record_id: String,
        title: String,
        caption: String,
        audio: AudioClip,
        image: Frame,
        min_image_duration_ms: u64,
    ) -> Self {
        let display_duration_ms = audio.duration_ms.max(min_image_duration_ms);
        Self {
            record_id,
            title,
            caption,
            audio,
            image,
            display_duration_ms,
        }
    }

    pub fn record_id(&self) -> &str {
        &self.record_id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn caption(&self) -> &str {
        &self.caption
    }

    pub fn audio(&self) -> &AudioClip {
        &self.audio
    }

    pub fn audio_duration_ms(&self) -> u64 {
        self.audio.duration_ms
    }

    pub fn image(&self) -> &Frame {
        &self.image
    }

    pub fn display_duration_ms(&self) -> u64 {
        self.display_duration_ms
    }
}

/// Validates one record's artifacts and turns them into a [`Segment`]
#[derive(Debug, Clone)]
pub struct SegmentBuilder {
    config: Config,
}

impl SegmentBuilder {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Build a segment from a record and its generated script, audio and image.
    ///
    /// The narration is decoded and converted to the output sample layout, the
    /// image is fitted to the output resolution. Any empty or malformed
    /// artifact fails this record only.
    pub fn build(
        &self,
        record: &NewsRecord,
        script: &str,
        audio: &SynthesizedAudio,
        image: &[u8],
    ) -> Result<Segment, ArtifactError> {
        let caption = script.trim();
        if caption.is_empty() {
            return Err(ArtifactError::EmptyScript);
        }

        let audio = self.prepare_audio(record, audio)?;
        let image = self.prepare_image(image)?;

        let segment = Segment::new(
            record.id.clone(),
            record.title.clone(),
            caption.to_string(),
            audio,
            image,
            self.config.timeline.min_image_duration_ms,
        );

        debug!(
            "Built segment {}: audio {}ms, display {}ms",
            segment.record_id(),
            segment.audio_duration_ms(),
            segment.display_duration_ms()
        );
        Ok(segment)
    }

    fn prepare_audio(&self, record: &NewsRecord, audio: &SynthesizedAudio) -> Result<AudioClip, ArtifactError> {
        if audio.duration_ms == Some(0) {
            return Err(ArtifactError::ZeroDuration);
        }

        let decoded = AudioLoader::decode(&audio.bytes, audio.format.as_deref())?;
        if decoded.is_empty() || decoded.duration_ms == 0 {
            return Err(ArtifactError::ZeroDuration);
        }

        if let Some(reported) = audio.duration_ms {
            if reported.abs_diff(decoded.duration_ms) > DURATION_MISMATCH_WARN_MS {
                warn!(
                    "Record {}: synthesizer reported {}ms but audio decodes to {}ms; using decoded length",
                    record.id, reported, decoded.duration_ms
                );
            }
        }

        let converted = decoded.converted(self.config.audio.sample_rate, self.config.audio.channels);
        if converted.is_empty() {
            return Err(ArtifactError::ZeroDuration);
        }
        Ok(converted)
    }

    fn prepare_image(&self, bytes: &[u8]) -> Result<Frame, ArtifactError> {
        let video = &self.config.video;
        let image = decode_image(bytes)?;
        Ok(fit_image(image, video.width, video.height, video.fit, video.background))
    }
}
