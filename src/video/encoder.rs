use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};

use tracing::{debug, info, warn};

use crate::error::{CompositionError, Result};
use crate::video::types::Frame;

/// Burned-in caption settings for one encode
#[derive(Debug, Clone)]
pub struct CaptionBurnIn {
    /// SRT file with the caption cues
    pub srt_path: PathBuf,
    pub font_name: String,
    pub font_size: u32,
    pub margin_v: u32,
}

/// Everything an encoder needs to produce one output file
#[derive(Debug, Clone)]
pub struct EncodeJob {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub codec: String,
    pub quality: u8,

    /// Number of frames that will be written
    pub total_frames: u64,

    /// Finished narration track (WAV)
    pub audio_path: PathBuf,

    pub captions: Option<CaptionBurnIn>,

    /// Where the encoder writes; this is a temporary path, not the published output
    pub destination: PathBuf,

    /// Scratch directory for encoder logs
    pub work_dir: PathBuf,
}

/// Represents an encoded video output
#[derive(Debug, Clone)]
pub struct EncodedVideo {
    pub path: PathBuf,
    pub frame_count: u64,
    pub file_size: u64,
}

/// Something that can turn a frame stream plus an audio track into a media file
pub trait EncoderBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Start an encode; frames are pushed into the returned sink in order
    fn open(&self, job: &EncodeJob) -> Result<Box<dyn FrameSink>>;
}

/// Receives rendered frames for a running encode
pub trait FrameSink: Send {
    fn write_frame(&mut self, frame: &Frame) -> Result<()>;

    /// Flush, wait for the encoder, and report the written file
    fn finish(self: Box<Self>) -> Result<EncodedVideo>;
}

/// Encoder backend driving an external `ffmpeg` process
///
/// Frames are streamed as raw RGB24 on stdin; the narration WAV and the
/// caption file are given as extra inputs, so a single process does the
/// encode, the caption burn-in, and the mux.
#[derive(Debug, Clone)]
pub struct FfmpegEncoder {
    ffmpeg_path: PathBuf,
}

impl Default for FfmpegEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FfmpegEncoder {
    pub fn new() -> Self {
        Self {
            ffmpeg_path: PathBuf::from("ffmpeg"),
        }
    }

    pub fn check_ffmpeg_available(&self) -> bool {
        Command::new(&self.ffmpeg_path)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    }

    fn quality_to_crf(quality: u8) -> u8 {
        (51 - ((quality as f32 / 100.0) * 51.0) as u8).clamp(0, 51)
    }

    /// Escape a path for use inside an ffmpeg filter argument
    fn escape_filter_path(path: &Path) -> String {
        path.to_string_lossy()
            .replace('\\', "\\\\")
            .replace(':', "\\:")
            .replace('\'', "\\'")
    }

    fn subtitles_filter(captions: &CaptionBurnIn) -> String {
        format!(
            "subtitles='{}':force_style='FontName={},FontSize={},MarginV={},BorderStyle=3,Outline=1,Shadow=0'",
            Self::escape_filter_path(&captions.srt_path),
            captions.font_name,
            captions.font_size,
            captions.margin_v,
        )
    }

    /// Build the ffmpeg argument list for a job
    pub fn build_args(&self, job: &EncodeJob) -> Vec<String> {
        let mut args: Vec<String> = ["-hide_banner", "-loglevel", "error", "-y"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        // Input 0: raw frames on stdin
        args.extend([
            "-f".to_string(),
            "rawvideo".to_string(),
            "-pix_fmt".to_string(),
            "rgb24".to_string(),
            "-s".to_string(),
            format!("{}x{}", job.width, job.height),
            "-r".to_string(),
            job.fps.to_string(),
            "-i".to_string(),
            "pipe:0".to_string(),
        ]);

        // Input 1: narration track
        args.push("-i".to_string());
        args.push(job.audio_path.display().to_string());

        if let Some(captions) = &job.captions {
            args.push("-vf".to_string());
            args.push(Self::subtitles_filter(captions));
        }

        args.extend([
            "-map".to_string(),
            "0:v:0".to_string(),
            "-map".to_string(),
            "1:a:0".to_string(),
            "-c:v".to_string(),
            job.codec.clone(),
            "-pix_fmt".to_string(),
            "yuv420p".to_string(),
            "-crf".to_string(),
            Self::quality_to_crf(job.quality).to_string(),
            "-c:a".to_string(),
            "aac".to_string(),
            "-b:a".to_string(),
            "192k".to_string(),
        ]);

        let is_mp4 = matches!(
            job.destination.extension().and_then(|e| e.to_str()),
            Some("mp4") | Some("mov") | Some("m4v")
        );
        if is_mp4 {
            args.push("-movflags".to_string());
            args.push("+faststart".to_string());
        }

        args.push(job.destination.display().to_string());
        args
    }
}

impl EncoderBackend for FfmpegEncoder {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    fn open(&self, job: &EncodeJob) -> Result<Box<dyn FrameSink>> {
        if !self.check_ffmpeg_available() {
            return Err(CompositionError::EncoderUnavailable {
                reason: format!("{} not found", self.ffmpeg_path.display()),
            }
            .into());
        }

        let args = self.build_args(job);
        debug!("ffmpeg args: {:?}", args);

        let log_path = job.work_dir.join("ffmpeg.log");
        let log_file = File::create(&log_path)?;

        let mut child = Command::new(&self.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::from(log_file))
            .spawn()
            .map_err(|e| CompositionError::EncodingFailed {
                reason: format!("Failed to spawn FFmpeg process: {}", e),
            })?;

        let stdin = child.stdin.take().ok_or_else(|| CompositionError::EncodingFailed {
            reason: "FFmpeg stdin unavailable".to_string(),
        })?;

        info!("FFmpeg encode started: {} frames -> {:?}", job.total_frames, job.destination);

        Ok(Box::new(FfmpegSink {
            child: Some(child),
            stdin: Some(stdin),
            frame_size: (job.width, job.height),
            frames_written: 0,
            destination: job.destination.clone(),
            log_path,
        }))
    }
}

struct FfmpegSink {
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    frame_size: (u32, u32),
    frames_written: u64,
    destination: PathBuf,
    log_path: PathBuf,
}

impl FfmpegSink {
    fn log_tail(&self) -> String {
        let mut log = String::new();
        if let Ok(mut file) = File::open(&self.log_path) {
            let _ = file.read_to_string(&mut log);
        }
        let lines: Vec<&str> = log.lines().collect();
        lines[lines.len().saturating_sub(10)..].join("\n")
    }
}

impl FrameSink for FfmpegSink {
    fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        if frame.dimensions() != self.frame_size {
            return Err(CompositionError::FrameFailed {
                frame: self.frames_written,
                reason: format!(
                    "frame is {}x{}, encoder expects {}x{}",
                    frame.width(),
                    frame.height(),
                    self.frame_size.0,
                    self.frame_size.1
                ),
            }
            .into());
        }

        let stdin = self.stdin.as_mut().ok_or_else(|| CompositionError::EncodingFailed {
            reason: "encoder input already closed".to_string(),
        })?;

        if let Err(e) = stdin.write_all(frame.as_rgb_bytes()) {
            return Err(CompositionError::EncodingFailed {
                reason: format!("FFmpeg rejected frame {}: {}\n{}", self.frames_written, e, self.log_tail()),
            }
            .into());
        }

        self.frames_written += 1;
        Ok(())
    }

    fn finish(mut self: Box<Self>) -> Result<EncodedVideo> {
        // Closing stdin signals end of stream
        drop(self.stdin.take());

        let mut child = self.child.take().ok_or_else(|| CompositionError::EncodingFailed {
            reason: "encoder already finished".to_string(),
        })?;

        let status = child.wait().map_err(|e| CompositionError::EncodingFailed {
            reason: format!("FFmpeg execution failed: {}", e),
        })?;

        if !status.success() {
            return Err(CompositionError::EncodingFailed {
                reason: format!("FFmpeg failed ({}): {}", status, self.log_tail()),
            }
            .into());
        }

        let metadata = std::fs::metadata(&self.destination)?;
        Ok(EncodedVideo {
            path: self.destination.clone(),
            frame_count: self.frames_written,
            file_size: metadata.len(),
        })
    }
}

impl Drop for FfmpegSink {
    fn drop(&mut self) {
        drop(self.stdin.take());
        if let Some(mut child) = self.child.take() {
            warn!("Aborting unfinished FFmpeg encode");
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> EncodeJob {
        EncodeJob {
            width: 640,
            height: 360,
            fps: 25.0,
            codec: "libx264".to_string(),
            quality: 85,
            total_frames: 100,
            audio_path: PathBuf::from("/tmp/work/narration.wav"),
            captions: Some(CaptionBurnIn {
                srt_path: PathBuf::from("/tmp/work/captions.srt"),
                font_name: "Sans".to_string(),
                font_size: 28,
                margin_v: 40,
            }),
            destination: PathBuf::from("/tmp/out/.news.mp4"),
            work_dir: PathBuf::from("/tmp/work"),
        }
    }

    #[test]
    fn test_quality_to_crf() {
        assert_eq!(FfmpegEncoder::quality_to_crf(100), 0);
        assert_eq!(FfmpegEncoder::quality_to_crf(0), 51);
        assert!(FfmpegEncoder::quality_to_crf(85) < 10);
    }

    #[test]
    fn test_args_stream_raw_frames_and_map_audio() {
        let args = FfmpegEncoder::new().build_args(&job());
        let joined = args.join(" ");

        assert!(joined.contains("-f rawvideo -pix_fmt rgb24 -s 640x360 -r 25 -i pipe:0"));
        assert!(joined.contains("-i /tmp/work/narration.wav"));
        assert!(joined.contains("-map 0:v:0 -map 1:a:0"));
        assert!(joined.contains("-movflags +faststart"));
        assert_eq!(args.last().unwrap(), "/tmp/out/.news.mp4");
    }

    #[test]
    fn test_subtitle_filter_escapes_path() {
        let mut job = job();
        if let Some(captions) = job.captions.as_mut() {
            captions.srt_path = PathBuf::from("C:/work/it's.srt");
        }
        let args = FfmpegEncoder::new().build_args(&job);
        let filter = args.iter().find(|a| a.starts_with("subtitles=")).unwrap();
        assert!(filter.contains("C\\:/work/it\\'s.srt"));
        assert!(filter.contains("FontSize=28"));
    }

    #[test]
    fn test_no_caption_filter_when_disabled() {
        let mut job = job();
        job.captions = None;
        let args = FfmpegEncoder::new().build_args(&job);
        assert!(!args.iter().any(|a| a == "-vf"));
    }
}
