//! Offline providers that need no network access.
//!
//! They produce real, decodable artifacts so a whole run can be exercised
//! end to end without an LLM, a TTS engine, or a browser.

use std::io::Cursor;

use async_trait::async_trait;
use image::{ImageBuffer, Rgb, RgbImage};

use crate::audio::writer::encode_wav;
use crate::audio::AudioClip;
use crate::config::VoiceConfig;
use crate::error::ProviderError;
use crate::news::NewsRecord;
use crate::providers::{ImageRenderer, ProviderResult, ScriptGenerator, SpeechSynthesizer, SynthesizedAudio};

/// Script = headline followed by the lead sentences of the article
#[derive(Debug, Clone)]
pub struct HeadlineScriptGenerator {
    lead_sentences: usize,
}

impl Default for HeadlineScriptGenerator {
    fn default() -> Self {
        Self { lead_sentences: 2 }
    }
}

impl HeadlineScriptGenerator {
    pub fn with_sentences(lead_sentences: usize) -> Self {
        Self { lead_sentences }
    }
}

fn is_sentence_end(c: char) -> bool {
    matches!(c, '.' | '!' | '?' | '。' | '！' | '？')
}

/// Split text after sentence-ending punctuation (Latin and CJK)
fn sentences(text: &str) -> Vec<&str> {
    let mut result = Vec::new();
    let mut start = 0;

    for (i, c) in text.char_indices() {
        if is_sentence_end(c) {
            let end = i + c.len_utf8();
            let sentence = text[start..end].trim();
            if !sentence.is_empty() {
                result.push(sentence);
            }
            start = end;
        }
    }

    let rest = text[start..].trim();
    if !rest.is_empty() {
        result.push(rest);
    }
    result
}

#[async_trait]
impl ScriptGenerator for HeadlineScriptGenerator {
    fn name(&self) -> &str {
        "headline"
    }

    async fn generate(&self, record: &NewsRecord) -> ProviderResult<String> {
        let lead = sentences(&record.content);
        let lead: Vec<&str> = lead.into_iter().take(self.lead_sentences).collect();

        let mut parts: Vec<String> = Vec::new();
        let title = record.title.trim();
        if !title.is_empty() {
            // Terminate the headline so it reads as its own sentence
            if !lead.is_empty() && !title.ends_with(is_sentence_end) {
                parts.push(format!("{}.", title));
            } else {
                parts.push(title.to_string());
            }
        }
        parts.extend(lead.into_iter().map(str::to_string));

        if parts.is_empty() {
            return Err(ProviderError::EmptyResponse {
                provider: self.name().to_string(),
            });
        }

        Ok(parts.join(" "))
    }
}

/// Silent narration whose length follows the text and the voice rate
#[derive(Debug, Clone)]
pub struct SilentSpeechSynthesizer {
    sample_rate: u32,
    /// Speaking time per character at normal rate
    ms_per_char: u64,
    min_duration_ms: u64,
}

impl Default for SilentSpeechSynthesizer {
    fn default() -> Self {
        Self {
            sample_rate: 24000,
            ms_per_char: 80,
            min_duration_ms: 500,
        }
    }
}

impl SilentSpeechSynthesizer {
    /// Estimated speaking time for `text` at the given voice rate
    pub fn estimate_duration_ms(&self, text: &str, voice: &VoiceConfig) -> u64 {
        let chars = text.chars().filter(|c| !c.is_whitespace()).count() as u64;
        let base = chars * self.ms_per_char;
        ((base as f64 / voice.rate_multiplier()).round() as u64).max(self.min_duration_ms)
    }
}

#[async_trait]
impl SpeechSynthesizer for SilentSpeechSynthesizer {
    fn name(&self) -> &str {
        "silent"
    }

    async fn synthesize(&self, text: &str, voice: &VoiceConfig) -> ProviderResult<SynthesizedAudio> {
        if text.trim().is_empty() {
            return Err(ProviderError::EmptyResponse {
                provider: self.name().to_string(),
            });
        }

        let duration_ms = self.estimate_duration_ms(text, voice);
        let clip = AudioClip::silence(duration_ms, self.sample_rate, 1);
        let bytes = encode_wav(&clip).map_err(|e| ProviderError::failed(self.name(), e.to_string()))?;

        Ok(SynthesizedAudio {
            bytes,
            duration_ms: Some(clip.duration_ms),
            format: Some("wav".to_string()),
        })
    }
}

/// Plain colour card per record with a darker caption band
#[derive(Debug, Clone, Default)]
pub struct CardImageRenderer;

impl CardImageRenderer {
    /// Stable colour for a record (FNV-1a over id and title)
    fn color_for(record: &NewsRecord) -> [u8; 3] {
        let mut hash: u32 = 0x811c_9dc5;
        for byte in record.id.bytes().chain(record.title.bytes()) {
            hash ^= byte as u32;
            hash = hash.wrapping_mul(0x0100_0193);
        }

        // Keep channels in a mid range so captions stay readable
        let channel = |shift: u32| 64 + ((hash >> shift) & 0x7f) as u8;
        [channel(0), channel(8), channel(16)]
    }

    fn draw(record: &NewsRecord, width: u32, height: u32) -> RgbImage {
        let [r, g, b] = Self::color_for(record);
        let band = [r / 3, g / 3, b / 3];
        let band_top = height - height / 4;

        ImageBuffer::from_fn(width, height, |_, y| {
            if y >= band_top {
                Rgb(band)
            } else {
                Rgb([r, g, b])
            }
        })
    }
}

#[async_trait]
impl ImageRenderer for CardImageRenderer {
    fn name(&self) -> &str {
        "card"
    }

    async fn render(&self, record: &NewsRecord, _caption: &str, size: (u32, u32)) -> ProviderResult<Vec<u8>> {
        let (width, height) = size;
        if width == 0 || height == 0 {
            return Err(ProviderError::failed(
                self.name(),
                format!("invalid size {}x{}", width, height),
            ));
        }

        let image = Self::draw(record, width, height);
        let mut cursor = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(image)
            .write_to(&mut cursor, image::ImageOutputFormat::Png)
            .map_err(|e| ProviderError::failed(self.name(), e.to_string()))?;

        Ok(cursor.into_inner())
    }
}
