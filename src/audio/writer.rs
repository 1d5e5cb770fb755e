use std::io::{Cursor, Seek, Write};
use std::path::Path;

use crate::audio::types::AudioClip;

fn wav_spec(clip: &AudioClip) -> hound::WavSpec {
    hound::WavSpec {
        channels: clip.channels,
        sample_rate: clip.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    }
}

fn write_samples<W: Write + Seek>(clip: &AudioClip, writer: W) -> Result<(), hound::Error> {
    let mut wav = hound::WavWriter::new(writer, wav_spec(clip))?;
    for &sample in &clip.samples {
        let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16;
        wav.write_sample(value)?;
    }
    wav.finalize()
}

/// Encode a clip as 16-bit PCM WAV bytes
pub fn encode_wav(clip: &AudioClip) -> Result<Vec<u8>, hound::Error> {
    let mut cursor = Cursor::new(Vec::new());
    write_samples(clip, &mut cursor)?;
    Ok(cursor.into_inner())
}

/// Write a clip to disk as 16-bit PCM WAV
pub fn write_wav<P: AsRef<Path>>(path: P, clip: &AudioClip) -> Result<(), hound::Error> {
    let file = std::io::BufWriter::new(std::fs::File::create(path)?);
    write_samples(clip, file)
}
