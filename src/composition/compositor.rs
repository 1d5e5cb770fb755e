use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::audio::types::frames_for_ms;
use crate::audio::writer::write_wav;
use crate::audio::{AudioClip, AudioFormat, AudioLoader};
use crate::composition::captions::CaptionTrack;
use crate::composition::manifest::Manifest;
use crate::composition::output::{publish, stage_bytes, stage_next_to};
use crate::config::{AudioTransition, Config, TransitionKind};
use crate::error::{CompositionError, CompositorError, Result};
use crate::timeline::{Timeline, TimelineEntry};
use crate::video::{CaptionBurnIn, EncodeJob, EncoderBackend, Frame};

/// Final output of a composition
#[derive(Debug, Clone)]
pub struct CompositionResult {
    pub output_path: PathBuf,
    pub manifest_path: Option<PathBuf>,
    pub duration_ms: u64,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub frame_count: u64,
    /// Length of the rendered narration track
    pub audio_duration_ms: f64,
    pub file_size: u64,
    pub manifest: Manifest,
}

/// What a single output frame shows
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrameSource {
    /// Segment `k`'s image alone
    Still(usize),
    /// Crossfade from segment `from` into `from + 1`
    Blend { from: usize, alpha: f32 },
}

/// Which image(s) are visible at `t_ms`.
///
/// `cursor` is the first candidate segment and only moves forward, so
/// walking frames in order costs O(frames + segments).
pub fn frame_source(entries: &[TimelineEntry], t_ms: f64, cursor: &mut usize) -> FrameSource {
    let last = entries.len().saturating_sub(1);

    while *cursor < last && t_ms >= entries[*cursor].end_ms as f64 {
        *cursor += 1;
    }

    let k = *cursor;
    if let (Some(transition), Some(next)) = (entries[k].transition_out, entries.get(k + 1)) {
        if transition.kind == TransitionKind::Crossfade
            && transition.duration_ms > 0
            && t_ms >= next.start_ms as f64
        {
            let alpha = (t_ms - next.start_ms as f64) / transition.duration_ms as f64;
            return FrameSource::Blend {
                from: k,
                alpha: alpha.clamp(0.0, 1.0) as f32,
            };
        }
    }

    FrameSource::Still(k)
}

/// Renders a timeline into one audio+video file
///
/// Rendering pipeline:
/// 1. Audio track - place every narration at its segment start, mix music
/// 2. Caption track - SRT cues over the caption windows
/// 3. Frames - stills and crossfade blends streamed into the encoder
/// 4. Sync check - audio and video length within one frame interval
/// 5. Publish - output and manifest renamed into place
#[derive(Clone)]
pub struct Compositor {
    config: Config,
    encoder: Arc<dyn EncoderBackend>,
    cancel: Option<Arc<AtomicBool>>,
}

impl Compositor {
    pub fn new(config: Config, encoder: Arc<dyn EncoderBackend>) -> Self {
        Self {
            config,
            encoder,
            cancel: None,
        }
    }

    /// Stop rendering (and never publish) once `flag` is set
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    fn check_cancelled(&self) -> Result<()> {
        match &self.cancel {
            Some(flag) if flag.load(Ordering::SeqCst) => Err(CompositorError::Cancelled {
                reason: "composition interrupted".to_string(),
            }),
            _ => Ok(()),
        }
    }

    /// Render `timeline` to the configured output path.
    ///
    /// `workspace` holds intermediate files. On any error nothing is left at
    /// the output or manifest path.
    pub fn compose(&self, timeline: &Timeline, workspace: &Path) -> Result<CompositionResult> {
        let output_path = self.config.pipeline.output_path.clone();

        info!("🎬 Composing {} segment(s) into {:?}", timeline.len(), output_path);
        info!(
            "   {}x{} @ {} fps, {}ms, encoder: {}",
            timeline.width(),
            timeline.height(),
            timeline.fps(),
            timeline.total_duration_ms(),
            self.encoder.name()
        );

        // Step 1: Audio track
        let audio = self.render_audio(timeline)?;
        let audio_path = workspace.join("narration.wav");
        write_wav(&audio_path, &audio).map_err(|e| CompositionError::AudioFailed {
            reason: format!("could not write narration track: {}", e),
        })?;
        let audio_duration_ms = audio.frame_count() as f64 * 1000.0 / audio.sample_rate as f64;
        debug!("Narration track: {:.1}ms -> {:?}", audio_duration_ms, audio_path);

        // Step 2: Caption track
        let captions = self.write_captions(timeline, workspace)?;

        // Step 3: Frames
        let staged_video = stage_next_to(&output_path)?;
        let job = EncodeJob {
            width: timeline.width(),
            height: timeline.height(),
            fps: timeline.fps(),
            codec: self.config.video.codec.clone(),
            quality: self.config.video.quality,
            total_frames: timeline.frame_count(),
            audio_path,
            captions,
            destination: staged_video.path().to_path_buf(),
            work_dir: workspace.to_path_buf(),
        };
        let encoded = self.render_frames(timeline, &job)?;

        // Step 4: Sync check
        let video_duration_ms = encoded.frame_count as f64 * timeline.frame_interval_ms();
        check_sync(audio_duration_ms, video_duration_ms, timeline.frame_interval_ms())?;

        // Step 5: Publish
        self.check_cancelled()?;
        let manifest = Manifest::from_timeline(timeline);
        let manifest_path = self.config.manifest_path();
        let staged_manifest = match &manifest_path {
            Some(path) => {
                let json = manifest.to_json().map_err(|e| CompositionError::OutputFailed {
                    reason: format!("could not serialize manifest: {}", e),
                })?;
                Some(stage_bytes(path, json.as_bytes())?)
            }
            None => None,
        };

        self.publish_outputs(staged_video, &output_path, staged_manifest, manifest_path.as_deref())?;

        info!(
            "🎉 Composition complete: {} frames, {}ms, {:.1} MB",
            encoded.frame_count,
            timeline.total_duration_ms(),
            encoded.file_size as f64 / 1_048_576.0
        );

        Ok(CompositionResult {
            output_path,
            manifest_path,
            duration_ms: timeline.total_duration_ms(),
            width: timeline.width(),
            height: timeline.height(),
            fps: timeline.fps(),
            frame_count: encoded.frame_count,
            audio_duration_ms,
            file_size: encoded.file_size,
            manifest,
        })
    }

    /// Rename video and manifest into place, undoing the video if the
    /// manifest fails or the run is cancelled in between
    fn publish_outputs(
        &self,
        staged_video: NamedTempFile,
        output_path: &Path,
        staged_manifest: Option<NamedTempFile>,
        manifest_path: Option<&Path>,
    ) -> Result<()> {
        self.check_cancelled()?;
        publish(staged_video, output_path)?;

        let published = match (staged_manifest, manifest_path) {
            (Some(staged), Some(path)) => self.check_cancelled().and_then(|_| publish(staged, path).map(Some)),
            _ => Ok(None),
        };
        let manifest = match published {
            Ok(manifest) => manifest,
            Err(e) => {
                // Never leave a video without its manifest
                let _ = std::fs::remove_file(output_path);
                return Err(e);
            }
        };

        if let Err(e) = self.check_cancelled() {
            let _ = std::fs::remove_file(output_path);
            if let Some(path) = manifest {
                let _ = std::fs::remove_file(path);
            }
            return Err(e);
        }
        Ok(())
    }

    /// Build the full narration track, exactly as long as the timeline
    pub fn render_audio(&self, timeline: &Timeline) -> Result<AudioClip> {
        let audio_config = &self.config.audio;
        let sample_rate = audio_config.sample_rate;
        let channels = audio_config.channels as usize;

        let total_frames = frames_for_ms(timeline.total_duration_ms(), sample_rate);
        let mut mix = vec![0.0f32; total_frames * channels];
        let entries = timeline.entries();
        let mut dropped_frames = 0usize;

        for (k, entry) in entries.iter().enumerate() {
            let clip = entry.segment.audio();
            let clip: Cow<AudioClip> = if clip.sample_rate == sample_rate && clip.channels as usize == channels {
                Cow::Borrowed(clip)
            } else {
                Cow::Owned(clip.converted(sample_rate, channels as u16))
            };

            let offset = frames_for_ms(entry.start_ms, sample_rate);
            if audio_config.transition == AudioTransition::Concatenate {
                let overlap = narration_overlap_ms(entries, k);
                if overlap > 0 {
                    debug!(
                        "Narrations of {} and {} overlap by {}ms",
                        entry.segment.record_id(),
                        entries[k + 1].segment.record_id(),
                        overlap
                    );
                }
            }
            let fade_in_ms = match audio_config.transition {
                AudioTransition::Crossfade if k > 0 => entries[k - 1].transition_out.map(|t| t.duration_ms),
                _ => None,
            };
            let fade_out = match audio_config.transition {
                AudioTransition::Crossfade => entry
                    .transition_out
                    .filter(|t| t.duration_ms > 0)
                    .and_then(|t| entries.get(k + 1).map(|next| (next.start_ms, t.duration_ms))),
                AudioTransition::Concatenate => None,
            };

            for (j, frame) in clip.samples.chunks(channels).enumerate() {
                let position = offset + j;
                if position >= total_frames {
                    dropped_frames += clip.frame_count() - j;
                    break;
                }

                let t_ms = entry.start_ms as f64 + j as f64 * 1000.0 / sample_rate as f64;
                let mut gain = 1.0f64;
                if let Some(duration) = fade_in_ms.filter(|d| *d > 0) {
                    gain *= ((t_ms - entry.start_ms as f64) / duration as f64).clamp(0.0, 1.0);
                }
                if let Some((fade_start, duration)) = fade_out {
                    if t_ms >= fade_start as f64 {
                        gain *= ((entry.end_ms as f64 - t_ms) / duration as f64).clamp(0.0, 1.0);
                    }
                }

                let base = position * channels;
                for (c, sample) in frame.iter().enumerate() {
                    mix[base + c] += sample * gain as f32;
                }
            }
        }

        if dropped_frames > 0 {
            // Only rounding at the very end of the track can get here
            debug!("Dropped {} trailing audio frame(s) past the timeline end", dropped_frames);
        }

        if let Some(music_path) = &audio_config.background_music {
            let music = self.load_music(music_path)?;
            let volume = audio_config.background_volume;
            for (i, sample) in mix.iter_mut().enumerate() {
                *sample += music.samples[i % music.samples.len()] * volume;
            }
            debug!("Mixed background music {:?} at volume {:.2}", music_path, volume);
        }

        self.apply_audio_fades(&mut mix, channels, sample_rate, timeline.total_duration_ms());

        for sample in mix.iter_mut() {
            *sample = sample.clamp(-1.0, 1.0);
        }

        Ok(AudioClip::new(mix, sample_rate, channels as u16, AudioFormat::pcm()))
    }

    fn load_music(&self, path: &Path) -> Result<AudioClip> {
        let music = AudioLoader::load_file(path).map_err(|e| CompositionError::AudioFailed {
            reason: format!("background music {}: {}", path.display(), e),
        })?;
        let music = music.converted(self.config.audio.sample_rate, self.config.audio.channels);
        if music.is_empty() {
            return Err(CompositionError::AudioFailed {
                reason: format!("background music {} is empty", path.display()),
            }
            .into());
        }
        Ok(music)
    }

    fn apply_audio_fades(&self, mix: &mut [f32], channels: usize, sample_rate: u32, total_ms: u64) {
        let video = &self.config.video;
        if video.fade_in_ms == 0 && video.fade_out_ms == 0 {
            return;
        }

        for (i, frame) in mix.chunks_mut(channels).enumerate() {
            let t_ms = i as f64 * 1000.0 / sample_rate as f64;
            let gain = fade_factor(t_ms, total_ms, video.fade_in_ms, video.fade_out_ms);
            if gain < 1.0 {
                for sample in frame {
                    *sample *= gain;
                }
            }
        }
    }

    fn write_captions(&self, timeline: &Timeline, workspace: &Path) -> Result<Option<CaptionBurnIn>> {
        let caption_config = &self.config.captions;
        if !caption_config.enabled {
            return Ok(None);
        }

        let track = CaptionTrack::from_timeline(timeline);
        if track.is_empty() {
            return Ok(None);
        }

        let srt_path = workspace.join("captions.srt");
        track.write_srt(&srt_path)?;
        debug!("Caption track: {} cue(s) -> {:?}", track.cues().len(), srt_path);

        Ok(Some(CaptionBurnIn {
            srt_path,
            font_name: caption_config.font_name.clone(),
            font_size: caption_config.font_size,
            margin_v: caption_config.margin_v,
        }))
    }

    fn render_frames(&self, timeline: &Timeline, job: &EncodeJob) -> Result<crate::video::EncodedVideo> {
        let entries = timeline.entries();
        let total_frames = timeline.frame_count();
        let interval = timeline.frame_interval_ms();
        let total_ms = timeline.total_duration_ms();
        let video = &self.config.video;

        for (k, entry) in entries.iter().enumerate() {
            let dimensions = entry.segment.image().dimensions();
            if dimensions != (timeline.width(), timeline.height()) {
                return Err(CompositionError::FrameFailed {
                    frame: 0,
                    reason: format!(
                        "segment #{} ({}) image is {}x{}, expected {}x{}",
                        k,
                        entry.segment.record_id(),
                        dimensions.0,
                        dimensions.1,
                        timeline.width(),
                        timeline.height()
                    ),
                }
                .into());
            }
        }

        let mut sink = self.encoder.open(job)?;
        let mut cursor = 0usize;
        let progress_step = (total_frames / 10).max(1);

        for i in 0..total_frames {
            self.check_cancelled()?;
            let t_ms = i as f64 * interval;

            let source = frame_source(entries, t_ms, &mut cursor);
            let mut frame: Cow<Frame> = match source {
                FrameSource::Still(k) => Cow::Borrowed(entries[k].segment.image()),
                FrameSource::Blend { from, alpha } => {
                    let a = entries[from].segment.image();
                    let b = entries[from + 1].segment.image();
                    let blended = a.blend(b, alpha).ok_or_else(|| CompositionError::FrameFailed {
                        frame: i,
                        reason: "crossfade between images of different size".to_string(),
                    })?;
                    Cow::Owned(blended)
                }
            };

            let fade = fade_factor(t_ms, total_ms, video.fade_in_ms, video.fade_out_ms);
            if fade < 1.0 {
                frame.to_mut().scale_brightness(fade);
            }

            sink.write_frame(&frame)?;

            if (i + 1) % progress_step == 0 {
                debug!("   Rendered {}/{} frames", i + 1, total_frames);
            }
        }

        let encoded = sink.finish()?;
        if encoded.frame_count != total_frames {
            warn!(
                "Encoder reported {} frames, {} were written",
                encoded.frame_count, total_frames
            );
        }
        Ok(encoded)
    }
}

/// How long narration `k` is still playing once segment `k + 1` has started
fn narration_overlap_ms(entries: &[TimelineEntry], k: usize) -> u64 {
    match entries.get(k + 1) {
        Some(next) => (entries[k].start_ms + entries[k].segment.audio_duration_ms()).saturating_sub(next.start_ms),
        None => 0,
    }
}

/// Brightness / gain for the whole-video fade in and fade out
fn fade_factor(t_ms: f64, total_ms: u64, fade_in_ms: u64, fade_out_ms: u64) -> f32 {
    let mut factor = 1.0f64;
    if fade_in_ms > 0 && t_ms < fade_in_ms as f64 {
        factor = factor.min(t_ms / fade_in_ms as f64);
    }
    if fade_out_ms > 0 {
        let remaining = total_ms as f64 - t_ms;
        if remaining < fade_out_ms as f64 {
            factor = factor.min(remaining / fade_out_ms as f64);
        }
    }
    factor.clamp(0.0, 1.0) as f32
}

/// Audio and video lengths must agree to within one frame interval
fn check_sync(audio_ms: f64, video_ms: f64, tolerance_ms: f64) -> Result<()> {
    if (audio_ms - video_ms).abs() > tolerance_ms {
        return Err(CompositionError::SyncFailed {
            audio_ms,
            video_ms,
            tolerance_ms,
        }
        .into());
    }
    debug!("Sync OK: audio {:.1}ms, video {:.1}ms", audio_ms, video_ms);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::{schedule, Segment};
    use crate::video::encoder::testing::RecordingEncoder;
    use tempfile::tempdir;

    const RED: [u8; 3] = [200, 0, 0];
    const BLUE: [u8; 3] = [0, 0, 200];
    const GREEN: [u8; 3] = [0, 200, 0];

    fn colored_segment(id: &str, audio_ms: u64, color: [u8; 3], sample_value: f32) -> Segment {
        let mut audio = AudioClip::silence(audio_ms, 1000, 1);
        for sample in audio.samples.iter_mut() {
            *sample = sample_value;
        }
        Segment::new(
            id.to_string(),
            format!("Title {}", id),
            format!("Caption {}", id),
            audio,
            Frame::new_filled(4, 4, color),
            1000,
        )
    }

    fn config(output_dir: &Path) -> Config {
        let mut config = Config::default();
        config.video.width = 4;
        config.video.height = 4;
        config.video.fps = 10.0;
        config.audio.sample_rate = 1000;
        config.timeline.min_image_duration_ms = 1000;
        config.timeline.transition_duration_ms = 400;
        config.pipeline.output_path = output_dir.join("news.mp4");
        config
    }

    fn scenario(config: &Config) -> Timeline {
        schedule(
            vec![
                colored_segment("a", 2000, RED, 0.1),
                colored_segment("b", 500, BLUE, 0.2),
                colored_segment("c", 3000, GREEN, 0.3),
            ],
            config,
        )
        .unwrap()
    }

    #[test]
    fn test_frame_sources_follow_transitions() {
        let dir = tempdir().unwrap();
        let timeline = scenario(&config(dir.path()));
        let entries = timeline.entries();
        let mut cursor = 0;

        assert_eq!(frame_source(entries, 0.0, &mut cursor), FrameSource::Still(0));
        assert_eq!(frame_source(entries, 1500.0, &mut cursor), FrameSource::Still(0));
        assert_eq!(
            frame_source(entries, 1600.0, &mut cursor),
            FrameSource::Blend { from: 0, alpha: 0.0 }
        );
        assert_eq!(
            frame_source(entries, 1800.0, &mut cursor),
            FrameSource::Blend { from: 0, alpha: 0.5 }
        );
        assert_eq!(frame_source(entries, 2000.0, &mut cursor), FrameSource::Still(1));
        assert_eq!(
            frame_source(entries, 2300.0, &mut cursor),
            FrameSource::Blend { from: 1, alpha: 0.25 }
        );
        assert_eq!(frame_source(entries, 5100.0, &mut cursor), FrameSource::Still(2));
    }

    #[test]
    fn test_compose_renders_frames_and_publishes() {
        let dir = tempdir().unwrap();
        let workspace = tempdir().unwrap();
        let config = config(dir.path());
        let timeline = scenario(&config);

        let encoder = RecordingEncoder::default();
        let compositor = Compositor::new(config.clone(), Arc::new(encoder.clone()));
        let result = compositor.compose(&timeline, workspace.path()).unwrap();

        assert_eq!(result.duration_ms, 5200);
        assert_eq!(result.frame_count, 52);
        assert!((result.audio_duration_ms - 5200.0).abs() <= 100.0);
        assert!(result.output_path.exists());
        assert!(result.manifest_path.as_ref().unwrap().exists());

        let recording = encoder.recording.lock().unwrap();
        assert!(recording.finished);
        assert_eq!(recording.frames, 52);
        assert_eq!(recording.corner_pixels[0], RED);
        // t = 1800ms is halfway through the first crossfade
        assert_eq!(recording.corner_pixels[18], [100, 0, 100]);
        assert_eq!(recording.corner_pixels[20], BLUE);
        assert_eq!(recording.corner_pixels[51], GREEN);

        let job = &recording.jobs[0];
        assert_eq!(job.total_frames, 52);
        assert!(job.captions.is_some());
        assert_ne!(job.destination, config.pipeline.output_path);
    }

    #[test]
    fn test_audio_track_places_narration_at_segment_start() {
        let dir = tempdir().unwrap();
        let config = config(dir.path());
        let timeline = scenario(&config);
        let compositor = Compositor::new(config, Arc::new(RecordingEncoder::default()));

        let audio = compositor.render_audio(&timeline).unwrap();
        assert_eq!(audio.frame_count(), 5200);
        assert_eq!(audio.samples[0], 0.1);
        // Segment a's narration ends at 2000ms, b starts at 1600ms: overlap sums
        assert!((audio.samples[1700] - 0.3).abs() < 1e-6);
        // b's narration is 500ms long, then silence until c starts at 2200ms
        assert_eq!(audio.samples[2150], 0.0);
        assert!((audio.samples[2200] - 0.3).abs() < 1e-6);
        assert!((audio.samples[5199] - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_narration_overlap() {
        let dir = tempdir().unwrap();
        let timeline = scenario(&config(dir.path()));
        let entries = timeline.entries();

        assert_eq!(narration_overlap_ms(entries, 0), 400);
        assert_eq!(narration_overlap_ms(entries, 1), 0);
        assert_eq!(narration_overlap_ms(entries, 2), 0);
    }

    #[test]
    fn test_background_music_loops_under_narration() {
        let dir = tempdir().unwrap();
        let music_path = dir.path().join("bed.wav");
        // Shorter than the timeline, so it has to loop
        let bed = AudioClip::new(vec![0.5; 300], 1000, 1, AudioFormat::pcm());
        write_wav(&music_path, &bed).unwrap();

        let mut config = config(dir.path());
        config.audio.background_music = Some(music_path);
        config.audio.background_volume = 0.2;
        let timeline = scenario(&config);
        let compositor = Compositor::new(config, Arc::new(RecordingEncoder::default()));

        let audio = compositor.render_audio(&timeline).unwrap();
        assert_eq!(audio.frame_count(), 5200);
        for (index, narration) in [(0, 0.1), (299, 0.1), (300, 0.1), (1700, 0.3), (2150, 0.0), (4321, 0.3), (5199, 0.3)] {
            let expected = narration + 0.5 * 0.2;
            assert!(
                (audio.samples[index] - expected).abs() < 1e-3,
                "sample {} is {}, expected {}",
                index,
                audio.samples[index],
                expected
            );
        }
    }

    #[test]
    fn test_missing_background_music_fails() {
        let dir = tempdir().unwrap();
        let mut config = config(dir.path());
        config.audio.background_music = Some(dir.path().join("missing.wav"));
        let timeline = scenario(&config);

        let result = Compositor::new(config, Arc::new(RecordingEncoder::default())).render_audio(&timeline);
        assert!(matches!(
            result,
            Err(CompositorError::Composition(CompositionError::AudioFailed { .. }))
        ));
    }

    #[test]
    fn test_audio_crossfade_policy_ramps_overlap() {
        let dir = tempdir().unwrap();
        let mut config = config(dir.path());
        config.audio.transition = AudioTransition::Crossfade;
        let timeline = scenario(&config);
        let compositor = Compositor::new(config, Arc::new(RecordingEncoder::default()));

        let audio = compositor.render_audio(&timeline).unwrap();
        assert_eq!(audio.samples[1000], 0.1);
        // Midway through the transition both narrations are at half gain
        assert!((audio.samples[1800] - (0.1 * 0.5 + 0.2 * 0.5)).abs() < 1e-3);
    }

    #[test]
    fn test_cut_timeline_switches_on_the_boundary() {
        let dir = tempdir().unwrap();
        let workspace = tempdir().unwrap();
        let mut config = config(dir.path());
        config.timeline.transition_kind = TransitionKind::Cut;
        let timeline = scenario(&config);

        let encoder = RecordingEncoder::default();
        let result = Compositor::new(config, Arc::new(encoder.clone()))
            .compose(&timeline, workspace.path())
            .unwrap();

        // 2000 + 1000 + 3000ms with no overlap
        assert_eq!(result.duration_ms, 6000);
        assert_eq!(result.frame_count, 60);

        let recording = encoder.recording.lock().unwrap();
        assert_eq!(recording.corner_pixels[19], RED);
        assert_eq!(recording.corner_pixels[20], BLUE);
        assert_eq!(recording.corner_pixels[29], BLUE);
        assert_eq!(recording.corner_pixels[30], GREEN);
        assert_eq!(recording.corner_pixels[59], GREEN);
        assert!(recording
            .corner_pixels
            .iter()
            .all(|pixel| [RED, BLUE, GREEN].contains(pixel)));
    }

    #[test]
    fn test_audio_and_video_agree_within_one_frame() {
        for fps in [24.0, 25.0, 29.97, 30.0, 59.94] {
            for audio_ms in [1001u64, 1333, 2717] {
                let dir = tempdir().unwrap();
                let workspace = tempdir().unwrap();
                let mut config = config(dir.path());
                config.video.fps = fps;
                config.audio.sample_rate = 44100;
                let timeline = schedule(
                    vec![
                        colored_segment("a", audio_ms, RED, 0.1),
                        colored_segment("b", audio_ms + 7, BLUE, 0.2),
                    ],
                    &config,
                )
                .unwrap();

                let result = Compositor::new(config, Arc::new(RecordingEncoder::default()))
                    .compose(&timeline, workspace.path())
                    .unwrap();

                let interval = 1000.0 / fps;
                let expected_frames = (result.duration_ms as f64 * fps / 1000.0).round() as u64;
                let video_ms = result.frame_count as f64 * interval;
                assert_eq!(result.frame_count, expected_frames, "fps {} audio {}ms", fps, audio_ms);
                assert!(
                    (result.audio_duration_ms - video_ms).abs() <= interval,
                    "fps {} audio {}ms: audio {:.2}ms vs video {:.2}ms",
                    fps,
                    audio_ms,
                    result.audio_duration_ms,
                    video_ms
                );
            }
        }
    }

    #[test]
    fn test_fades_darken_first_and_last_frames() {
        let dir = tempdir().unwrap();
        let workspace = tempdir().unwrap();
        let mut config = config(dir.path());
        config.video.fade_in_ms = 1000;
        config.video.fade_out_ms = 1000;
        let timeline = scenario(&config);

        let encoder = RecordingEncoder::default();
        Compositor::new(config, Arc::new(encoder.clone()))
            .compose(&timeline, workspace.path())
            .unwrap();

        let recording = encoder.recording.lock().unwrap();
        assert_eq!(recording.corner_pixels[0], [0, 0, 0]);
        assert_eq!(recording.corner_pixels[5], [100, 0, 0]);
        assert_eq!(recording.corner_pixels[10], RED);
        assert_eq!(recording.corner_pixels[47], [0, 100, 0]);
    }

    #[test]
    fn test_manifest_is_identical_across_runs() {
        let dir = tempdir().unwrap();
        let config = config(dir.path());

        let mut manifests = Vec::new();
        for _ in 0..2 {
            let workspace = tempdir().unwrap();
            let result = Compositor::new(config.clone(), Arc::new(RecordingEncoder::default()))
                .compose(&scenario(&config), workspace.path())
                .unwrap();
            manifests.push(std::fs::read(result.manifest_path.unwrap()).unwrap());
        }
        assert_eq!(manifests[0], manifests[1]);
    }

    #[test]
    fn test_encoder_failure_leaves_no_output() {
        let dir = tempdir().unwrap();
        let workspace = tempdir().unwrap();
        let config = config(dir.path());
        let timeline = scenario(&config);

        let compositor = Compositor::new(config.clone(), Arc::new(RecordingEncoder::failing_at(10)));
        let result = compositor.compose(&timeline, workspace.path());

        assert!(matches!(
            result,
            Err(CompositorError::Composition(CompositionError::EncodingFailed { .. }))
        ));
        assert!(!config.pipeline.output_path.exists());
        assert!(!config.manifest_path().unwrap().exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_cancel_flag_stops_render() {
        let dir = tempdir().unwrap();
        let workspace = tempdir().unwrap();
        let config = config(dir.path());
        let timeline = scenario(&config);

        let flag = Arc::new(AtomicBool::new(true));
        let result = Compositor::new(config.clone(), Arc::new(RecordingEncoder::default()))
            .with_cancel_flag(flag)
            .compose(&timeline, workspace.path());

        assert!(matches!(result, Err(CompositorError::Cancelled { .. })));
        assert!(!config.pipeline.output_path.exists());
    }

    #[test]
    fn test_cancel_after_render_publishes_nothing() {
        let dir = tempdir().unwrap();
        let workspace = tempdir().unwrap();
        let config = config(dir.path());
        let timeline = scenario(&config);

        let flag = Arc::new(AtomicBool::new(false));
        let encoder = RecordingEncoder::cancelling_on_finish(flag.clone());
        let result = Compositor::new(config.clone(), Arc::new(encoder.clone()))
            .with_cancel_flag(flag)
            .compose(&timeline, workspace.path());

        assert!(matches!(result, Err(CompositorError::Cancelled { .. })));
        assert!(encoder.recording.lock().unwrap().finished);
        assert!(!config.pipeline.output_path.exists());
        assert!(!config.manifest_path().unwrap().exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_publish_rechecks_cancel_flag() {
        let dir = tempdir().unwrap();
        let video = dir.path().join("news.mp4");
        let manifest = dir.path().join("news.manifest.json");
        let flag = Arc::new(AtomicBool::new(false));
        let compositor =
            Compositor::new(config(dir.path()), Arc::new(RecordingEncoder::default())).with_cancel_flag(flag.clone());

        flag.store(true, Ordering::SeqCst);
        let result = compositor.publish_outputs(
            stage_bytes(&video, b"video").unwrap(),
            &video,
            Some(stage_bytes(&manifest, b"{}").unwrap()),
            Some(&manifest),
        );
        assert!(matches!(result, Err(CompositorError::Cancelled { .. })));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);

        flag.store(false, Ordering::SeqCst);
        compositor
            .publish_outputs(
                stage_bytes(&video, b"video").unwrap(),
                &video,
                Some(stage_bytes(&manifest, b"{}").unwrap()),
                Some(&manifest),
            )
            .unwrap();
        assert_eq!(std::fs::read(&video).unwrap(), b"video");
        assert_eq!(std::fs::read(&manifest).unwrap(), b"{}");
    }

    #[test]
    fn test_sync_check() {
        assert!(check_sync(5200.0, 5200.0, 40.0).is_ok());
        assert!(check_sync(5200.0, 5239.0, 40.0).is_ok());
        assert!(matches!(
            check_sync(5200.0, 5300.0, 40.0),
            Err(CompositorError::Composition(CompositionError::SyncFailed { .. }))
        ));
    }

    #[test]
    fn test_fade_factor() {
        assert_eq!(fade_factor(0.0, 5000, 0, 0), 1.0);
        assert_eq!(fade_factor(250.0, 5000, 500, 0), 0.5);
        assert_eq!(fade_factor(4750.0, 5000, 0, 500), 0.5);
        assert_eq!(fade_factor(2500.0, 5000, 500, 500), 1.0);
    }
}
