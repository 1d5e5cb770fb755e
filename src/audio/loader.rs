use std::io::Cursor;
use std::path::Path;

use symphonia::core::audio::{AudioBufferRef, Signal};
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::audio::types::{AudioClip, AudioFormat};
use crate::error::ArtifactError;

type DecodeResult<T> = std::result::Result<T, ArtifactError>;

/// Decodes synthesizer output and music files into PCM
pub struct AudioLoader;

impl AudioLoader {
    /// Decode an in-memory audio stream.
    ///
    /// RIFF/WAVE data goes through `hound`; anything else is probed by
    /// Symphonia, using `extension_hint` when the caller knows it.
    pub fn decode(bytes: &[u8], extension_hint: Option<&str>) -> DecodeResult<AudioClip> {
        if bytes.is_empty() {
            return Err(ArtifactError::EmptyAudio);
        }

        if Self::is_wav(bytes) {
            Self::decode_wav(bytes)
        } else {
            Self::decode_with_symphonia(bytes, extension_hint)
        }
    }

    /// Load and decode an audio file from disk (background music)
    pub fn load_file<P: AsRef<Path>>(path: P) -> DecodeResult<AudioClip> {
        let path = path.as_ref();
        let extension = music_extension(path)?;
        let bytes = std::fs::read(path).map_err(|e| ArtifactError::AudioDecodeFailed {
            reason: format!("{}: {}", path.display(), e),
        })?;
        Self::decode(&bytes, Some(&extension))
    }

    fn is_wav(bytes: &[u8]) -> bool {
        bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WAVE"
    }

    /// WAV through the hound crate (most reliable for WAV)
    fn decode_wav(bytes: &[u8]) -> DecodeResult<AudioClip> {
        let reader = hound::WavReader::new(Cursor::new(bytes)).map_err(|e| {
            ArtifactError::AudioDecodeFailed {
                reason: format!("invalid WAV data: {}", e),
            }
        })?;

        let spec = reader.spec();
        let decode_failed = |e: hound::Error| ArtifactError::AudioDecodeFailed {
            reason: format!("corrupt WAV samples: {}", e),
        };

        let samples: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .into_samples::<f32>()
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(decode_failed)?,
            hound::SampleFormat::Int => {
                let scale = full_scale(spec.bits_per_sample);
                let mut out = Vec::with_capacity(reader.len() as usize);
                for sample in reader.into_samples::<i32>() {
                    out.push(sample.map_err(decode_failed)? as f32 / scale);
                }
                out
            }
        };

        Ok(AudioClip::new(
            samples,
            spec.sample_rate,
            spec.channels,
            AudioFormat {
                extension: "wav".to_string(),
                bit_depth: Some(spec.bits_per_sample),
                compression: None,
            },
        ))
    }

    /// Everything that is not WAV: MP3, FLAC, OGG, AAC
    fn decode_with_symphonia(bytes: &[u8], extension_hint: Option<&str>) -> DecodeResult<AudioClip> {
        let failed = |reason: String| ArtifactError::AudioDecodeFailed { reason };

        let stream = MediaSourceStream::new(Box::new(Cursor::new(bytes.to_vec())), Default::default());
        let mut hint = Hint::new();
        if let Some(extension) = extension_hint {
            hint.with_extension(extension);
        }

        let mut reader = symphonia::default::get_probe()
            .format(&hint, stream, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| failed(format!("unrecognized audio stream: {}", e)))?
            .format;

        let (track_id, params) = reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .map(|t| (t.id, t.codec_params.clone()))
            .ok_or_else(|| failed("no decodable audio track".to_string()))?;

        let sample_rate = params
            .sample_rate
            .ok_or_else(|| failed("stream has no sample rate".to_string()))?;
        let mut decoder = symphonia::default::get_codecs()
            .make(&params, &DecoderOptions::default())
            .map_err(|e| failed(format!("no decoder for codec: {}", e)))?;

        let mut channels = params.channels.map(|c| c.count() as u16);
        let mut samples = Vec::new();
        loop {
            let packet = match reader.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::ResetRequired) => {
                    decoder.reset();
                    continue;
                }
                // IoError marks end of stream
                Err(_) => break,
            };
            if packet.track_id() != track_id {
                continue;
            }
            match decoder.decode(&packet) {
                Ok(buffer) => {
                    channels.get_or_insert(buffer.spec().channels.count() as u16);
                    append_interleaved(&buffer, &mut samples);
                }
                Err(SymphoniaError::DecodeError(reason)) => {
                    tracing::debug!("Skipping undecodable packet: {}", reason);
                }
                Err(_) => break,
            }
        }

        let channels = channels.ok_or_else(|| failed("stream has no channel layout".to_string()))?;
        Ok(AudioClip::new(
            samples,
            sample_rate,
            channels,
            AudioFormat {
                extension: extension_hint.unwrap_or("unknown").to_string(),
                bit_depth: params.bits_per_sample.map(|b| b as u16),
                compression: Some(format!("{:?}", params.codec)),
            },
        ))
    }
}

const MUSIC_EXTENSIONS: [&str; 6] = ["wav", "mp3", "flac", "ogg", "m4a", "aac"];

/// Lower-cased extension of a music file, rejected unless decodable
fn music_extension(path: &Path) -> DecodeResult<String> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    if MUSIC_EXTENSIONS.contains(&extension.as_str()) {
        Ok(extension)
    } else {
        Err(ArtifactError::UnsupportedAudioFormat { format: extension })
    }
}

/// Divisor mapping signed PCM of `bits` width onto -1.0..1.0
fn full_scale(bits: u16) -> f32 {
    // hound hands out 8-bit samples already shifted to signed
    let bits = bits.clamp(8, 32);
    (1u64 << (bits - 1)) as f32
}

fn append_interleaved(buffer: &AudioBufferRef, out: &mut Vec<f32>) {
    macro_rules! interleave {
        ($buf:expr, $to_f32:expr) => {{
            let planes = $buf.spec().channels.count();
            out.reserve($buf.frames() * planes);
            for i in 0..$buf.frames() {
                for ch in 0..planes {
                    out.push($to_f32($buf.chan(ch)[i]));
                }
            }
        }};
    }

    match buffer {
        AudioBufferRef::F32(buf) => interleave!(buf, |s: f32| s),
        AudioBufferRef::F64(buf) => interleave!(buf, |s: f64| s as f32),
        AudioBufferRef::S32(buf) => interleave!(buf, |s: i32| s as f32 / full_scale(32)),
        AudioBufferRef::S16(buf) => interleave!(buf, |s: i16| s as f32 / full_scale(16)),
        AudioBufferRef::U8(buf) => interleave!(buf, |s: u8| (s as f32 - 128.0) / 128.0),
        _ => tracing::warn!("Unsupported sample layout, packet dropped"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::writer::encode_wav;
    use tempfile::tempdir;

    #[test]
    fn test_music_extension() {
        assert_eq!(music_extension(Path::new("bed.MP3")).unwrap(), "mp3");
        assert!(matches!(
            music_extension(Path::new("bed")),
            Err(ArtifactError::UnsupportedAudioFormat { .. })
        ));
    }

    #[test]
    fn test_full_scale() {
        assert_eq!(full_scale(8), 128.0);
        assert_eq!(full_scale(16), 32768.0);
        assert_eq!(-32768.0 / full_scale(16), -1.0);
        assert_eq!(full_scale(24), 8388608.0);
    }

    #[test]
    fn test_decode_wav_bytes() {
        let clip = AudioClip::new(vec![0.25; 8000], 16000, 1, AudioFormat::pcm());
        let bytes = encode_wav(&clip).unwrap();

        let decoded = AudioLoader::decode(&bytes, None).unwrap();
        assert_eq!(decoded.sample_rate, 16000);
        assert_eq!(decoded.channels, 1);
        assert_eq!(decoded.duration_ms, 500);
        assert_eq!(decoded.format.extension, "wav");
        assert!((decoded.samples[0] - 0.25).abs() < 1e-3);
    }

    #[test]
    fn test_empty_and_garbage_input() {
        assert!(matches!(AudioLoader::decode(&[], None), Err(ArtifactError::EmptyAudio)));
        assert!(matches!(
            AudioLoader::decode(b"definitely not audio", Some("mp3")),
            Err(ArtifactError::AudioDecodeFailed { .. })
        ));
    }

    #[test]
    fn test_load_file_rejects_unknown_extension() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("music.xyz");
        std::fs::write(&path, b"dummy content").unwrap();

        match AudioLoader::load_file(&path) {
            Err(ArtifactError::UnsupportedAudioFormat { format }) => assert_eq!(format, "xyz"),
            other => panic!("expected UnsupportedAudioFormat, got {:?}", other.map(|c| c.duration_ms)),
        }
    }

    #[test]
    fn test_load_wav_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bed.wav");
        let clip = AudioClip::new(vec![0.0; 4410], 44100, 1, AudioFormat::pcm());
        std::fs::write(&path, encode_wav(&clip).unwrap()).unwrap();

        assert_eq!(AudioLoader::load_file(&path).unwrap().duration_ms, 100);
    }
}
