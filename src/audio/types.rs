use serde::{Deserialize, Serialize};

/// Decoded PCM audio
#[derive(Debug, Clone)]
pub struct AudioClip {
    /// Audio samples (interleaved for stereo, mono for single channel)
    pub samples: Vec<f32>,

    /// Sample rate in Hz
    pub sample_rate: u32,

    /// Number of channels (1 = mono, 2 = stereo)
    pub channels: u16,

    /// Duration in milliseconds, derived from the sample count
    pub duration_ms: u64,

    /// Where the clip came from
    pub format: AudioFormat,
}

impl AudioClip {
    /// Build a clip, computing the duration from the sample count
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16, format: AudioFormat) -> Self {
        let duration_ms = duration_ms_for(samples.len(), sample_rate, channels);
        Self {
            samples,
            sample_rate,
            channels,
            duration_ms,
            format,
        }
    }

    /// A silent clip of the given length
    pub fn silence(duration_ms: u64, sample_rate: u32, channels: u16) -> Self {
        let frames = frames_for_ms(duration_ms, sample_rate);
        Self::new(
            vec![0.0; frames * channels as usize],
            sample_rate,
            channels,
            AudioFormat::pcm(),
        )
    }

    /// Number of sample frames (one sample per channel)
    pub fn frame_count(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.samples.len() / self.channels as usize
    }

    pub fn is_empty(&self) -> bool {
        self.frame_count() == 0
    }

    /// Get mono mix of all channels
    pub fn mono_samples(&self) -> Vec<f32> {
        if self.channels <= 1 {
            return self.samples.clone();
        }

        self.samples
            .chunks(self.channels as usize)
            .map(|chunk| chunk.iter().sum::<f32>() / chunk.len() as f32)
            .collect()
    }

    /// Convert to the given rate and channel layout.
    ///
    /// Rate conversion is linear interpolation; channel conversion averages
    /// down to mono and duplicates up to stereo.
    pub fn converted(&self, sample_rate: u32, channels: u16) -> AudioClip {
        let resampled = if self.sample_rate == sample_rate {
            self.clone()
        } else {
            self.resampled(sample_rate)
        };
        resampled.with_channels(channels)
    }

    fn resampled(&self, target_rate: u32) -> AudioClip {
        let channels = self.channels.max(1) as usize;
        let source_frames = self.frame_count();
        let target_frames =
            ((source_frames as u64 * target_rate as u64 + self.sample_rate as u64 / 2)
                / self.sample_rate.max(1) as u64) as usize;

        let step = self.sample_rate as f64 / target_rate as f64;
        let mut samples = Vec::with_capacity(target_frames * channels);

        for frame in 0..target_frames {
            let position = frame as f64 * step;
            let index = position.floor() as usize;
            let fraction = (position - index as f64) as f32;

            for ch in 0..channels {
                let a = self.sample(index, ch);
                let b = if index + 1 < source_frames { self.sample(index + 1, ch) } else { a };
                samples.push(a + (b - a) * fraction);
            }
        }

        AudioClip {
            duration_ms: duration_ms_for(samples.len(), target_rate, self.channels),
            samples,
            sample_rate: target_rate,
            channels: self.channels,
            format: self.format.clone(),
        }
    }

    fn with_channels(self, channels: u16) -> AudioClip {
        if self.channels == channels {
            return self;
        }

        let mono = self.mono_samples();
        let samples = if channels == 1 {
            mono
        } else {
            mono.iter()
                .flat_map(|&s| std::iter::repeat(s).take(channels as usize))
                .collect()
        };

        AudioClip {
            samples,
            sample_rate: self.sample_rate,
            channels,
            duration_ms: self.duration_ms,
            format: self.format,
        }
    }

    fn sample(&self, frame: usize, channel: usize) -> f32 {
        self.samples
            .get(frame * self.channels as usize + channel)
            .copied()
            .unwrap_or(0.0)
    }
}

/// Milliseconds covered by `samples` interleaved samples, rounded to nearest
pub fn duration_ms_for(samples: usize, sample_rate: u32, channels: u16) -> u64 {
    if sample_rate == 0 || channels == 0 {
        return 0;
    }
    let frames = (samples / channels as usize) as u64;
    (frames * 1000 + sample_rate as u64 / 2) / sample_rate as u64
}

/// Sample frames needed to cover `duration_ms`, rounded to nearest
pub fn frames_for_ms(duration_ms: u64, sample_rate: u32) -> usize {
    ((duration_ms * sample_rate as u64 + 500) / 1000) as usize
}

/// Audio stream format information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioFormat {
    /// Container / extension (wav, mp3, flac, etc.)
    pub extension: String,

    /// Bit depth (16, 24, 32, etc.)
    pub bit_depth: Option<u16>,

    /// Compression type (if any)
    pub compression: Option<String>,
}

impl AudioFormat {
    pub fn pcm() -> Self {
        Self {
            extension: "pcm".to_string(),
            bit_depth: Some(32),
            compression: None,
        }
    }
}
