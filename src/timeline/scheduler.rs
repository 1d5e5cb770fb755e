use serde::Serialize;
use tracing::{debug, info};

use crate::config::{Config, TransitionKind};
use crate::error::TimelineError;
use crate::timeline::segment::Segment;

/// Overlap (or hard cut) between two adjacent segments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Transition {
    pub kind: TransitionKind,
    pub duration_ms: u64,
}

impl Transition {
    pub fn cut() -> Self {
        Self {
            kind: TransitionKind::Cut,
            duration_ms: 0,
        }
    }

    /// Effective transition between two segments.
    ///
    /// A transition never takes more than half of either neighbour; a
    /// crossfade that ends up with no room left becomes a cut.
    pub fn between(kind: TransitionKind, requested_ms: u64, prev_display_ms: u64, next_display_ms: u64) -> Self {
        if kind == TransitionKind::Cut {
            return Self::cut();
        }

        let duration_ms = requested_ms.min(prev_display_ms / 2).min(next_display_ms / 2);
        if duration_ms == 0 {
            return Self::cut();
        }

        Self { kind, duration_ms }
    }
}

/// A segment placed on the time axis
#[derive(Debug, Clone)]
pub struct TimelineEntry {
    pub segment: Segment,

    /// First instant the segment's image is visible (including a fade-in)
    pub start_ms: u64,

    /// Instant the segment's image is gone (end of its fade-out)
    pub end_ms: u64,

    /// Window in which this segment's caption is shown
    pub caption_start_ms: u64,
    pub caption_end_ms: u64,

    /// Transition into the next segment; `None` for the last one
    pub transition_out: Option<Transition>,
}

impl TimelineEntry {
    pub fn duration_ms(&self) -> u64 {
        self.end_ms - self.start_ms
    }
}

/// Fully laid-out, ordered composition plan
#[derive(Debug, Clone)]
pub struct Timeline {
    entries: Vec<TimelineEntry>,
    width: u32,
    height: u32,
    fps: f64,
    total_duration_ms: u64,
}

impl Timeline {
    pub fn entries(&self) -> &[TimelineEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }

    pub fn total_duration_ms(&self) -> u64 {
        self.total_duration_ms
    }

    pub fn frame_interval_ms(&self) -> f64 {
        1000.0 / self.fps
    }

    /// Number of video frames covering the whole timeline
    pub fn frame_count(&self) -> u64 {
        (self.total_duration_ms as f64 * self.fps / 1000.0).round() as u64
    }

    pub fn transitions(&self) -> impl Iterator<Item = &Transition> {
        self.entries.iter().filter_map(|e| e.transition_out.as_ref())
    }

    /// Σ display durations
    pub fn display_total_ms(&self) -> u64 {
        self.entries.iter().map(|e| e.segment.display_duration_ms()).sum()
    }

    /// Σ transition durations
    pub fn transition_total_ms(&self) -> u64 {
        self.transitions().map(|t| t.duration_ms).sum()
    }
}

/// Lay out segments on a single time axis, in the given order.
pub fn schedule(segments: Vec<Segment>, config: &Config) -> Result<Timeline, TimelineError> {
    if segments.is_empty() {
        return Err(TimelineError::Empty);
    }

    let fps = config.video.fps;
    if !fps.is_finite() || fps <= 0.0 {
        return Err(TimelineError::InvalidParameters {
            details: format!("fps must be positive, got {}", fps),
        });
    }
    if config.video.width == 0 || config.video.height == 0 {
        return Err(TimelineError::InvalidParameters {
            details: format!("resolution {}x{}", config.video.width, config.video.height),
        });
    }

    for (index, segment) in segments.iter().enumerate() {
        if segment.display_duration_ms() == 0 {
            return Err(TimelineError::ZeroLengthSegment {
                index,
                record_id: segment.record_id().to_string(),
            });
        }
    }

    let kind = config.timeline.transition_kind;
    let requested = config.timeline.transition_duration_ms;

    let transitions: Vec<Transition> = segments
        .windows(2)
        .map(|pair| Transition::between(kind, requested, pair[0].display_duration_ms(), pair[1].display_duration_ms()))
        .collect();

    for (k, transition) in transitions.iter().enumerate() {
        if kind == TransitionKind::Crossfade && transition.duration_ms < requested {
            debug!(
                "Transition {} -> {} capped to {}ms ({:?})",
                k,
                k + 1,
                transition.duration_ms,
                transition.kind
            );
        }
    }

    let count = segments.len();
    let mut entries = Vec::with_capacity(count);
    let mut start_ms = 0u64;
    let mut caption_start_ms = 0u64;

    for (k, segment) in segments.into_iter().enumerate() {
        let end_ms = start_ms + segment.display_duration_ms();
        let transition_out = transitions.get(k).copied();

        let (next_start_ms, caption_end_ms) = match transition_out {
            Some(t) => {
                let next_start = end_ms - t.duration_ms;
                // Hand the caption over halfway through the transition
                (next_start, next_start + t.duration_ms / 2)
            }
            None => (end_ms, end_ms),
        };

        entries.push(TimelineEntry {
            segment,
            start_ms,
            end_ms,
            caption_start_ms,
            caption_end_ms,
            transition_out,
        });

        start_ms = next_start_ms;
        caption_start_ms = caption_end_ms;
    }

    let total_duration_ms = entries.last().map(|e| e.end_ms).unwrap_or(0);

    let timeline = Timeline {
        entries,
        width: config.video.width,
        height: config.video.height,
        fps,
        total_duration_ms,
    };

    info!(
        "Timeline: {} segment(s), {}ms ({}ms display - {}ms transitions), {} frames at {} fps",
        count,
        timeline.total_duration_ms,
        timeline.display_total_ms(),
        timeline.transition_total_ms(),
        timeline.frame_count(),
        fps
    );

    Ok(timeline)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::audio::AudioClip;
    use crate::video::Frame;

    pub(crate) fn segment(id: &str, audio_ms: u64, min_ms: u64) -> Segment {
        Segment::new(
            id.to_string(),
            format!("Title {}", id),
            format!("Caption {}", id),
            AudioClip::silence(audio_ms, 1000, 1),
            Frame::new_black(4, 4),
            min_ms,
        )
    }

    fn config(min_ms: u64, transition_ms: u64, kind: TransitionKind) -> Config {
        let mut config = Config::default();
        config.timeline.min_image_duration_ms = min_ms;
        config.timeline.transition_duration_ms = transition_ms;
        config.timeline.transition_kind = kind;
        config.video.width = 4;
        config.video.height = 4;
        config.video.fps = 25.0;
        config
    }

    #[test]
    fn test_three_record_scenario() {
        let config = config(1000, 400, TransitionKind::Crossfade);
        let segments = vec![segment("a", 2000, 1000), segment("b", 500, 1000), segment("c", 3000, 1000)];

        let timeline = schedule(segments, &config).unwrap();
        let displays: Vec<u64> = timeline.entries().iter().map(|e| e.segment.display_duration_ms()).collect();
        assert_eq!(displays, vec![2000, 1000, 3000]);
        assert_eq!(timeline.total_duration_ms(), 5200);

        let bounds: Vec<(u64, u64)> = timeline.entries().iter().map(|e| (e.start_ms, e.end_ms)).collect();
        assert_eq!(bounds, vec![(0, 2000), (1600, 2600), (2200, 5200)]);
        assert_eq!(timeline.frame_count(), 130);
    }

    #[test]
    fn test_total_is_display_minus_transitions() {
        let config = config(300, 700, TransitionKind::Crossfade);
        let durations = [1200, 90, 5000, 650, 2400, 1];
        let segments = durations
            .iter()
            .enumerate()
            .map(|(i, &ms)| segment(&i.to_string(), ms, 300))
            .collect();

        let timeline = schedule(segments, &config).unwrap();
        assert_eq!(
            timeline.total_duration_ms(),
            timeline.display_total_ms() - timeline.transition_total_ms()
        );
        assert_eq!(timeline.transitions().count(), durations.len() - 1);
        assert!(timeline.entries().last().unwrap().transition_out.is_none());
    }

    #[test]
    fn test_transition_capped_to_half_of_shorter_neighbour() {
        let config = config(600, 500, TransitionKind::Crossfade);
        let segments = vec![segment("a", 4000, 600), segment("b", 100, 600), segment("c", 4000, 600)];

        let timeline = schedule(segments, &config).unwrap();
        let durations: Vec<u64> = timeline.transitions().map(|t| t.duration_ms).collect();
        assert_eq!(durations, vec![300, 300]);

        // The short segment keeps a visible window and is never dropped
        let middle = &timeline.entries()[1];
        assert_eq!(middle.duration_ms(), 600);
        assert_eq!(timeline.len(), 3);

        for entry in timeline.entries() {
            if let Some(t) = entry.transition_out {
                assert!(t.duration_ms * 2 <= entry.segment.display_duration_ms());
            }
        }
    }

    #[test]
    fn test_crossfade_without_room_becomes_cut() {
        let transition = Transition::between(TransitionKind::Crossfade, 400, 1, 5000);
        assert_eq!(transition, Transition::cut());

        let transition = Transition::between(TransitionKind::Crossfade, 0, 5000, 5000);
        assert_eq!(transition.kind, TransitionKind::Cut);
    }

    #[test]
    fn test_cut_transitions_append() {
        let config = config(1000, 400, TransitionKind::Cut);
        let segments = vec![segment("a", 2000, 1000), segment("b", 500, 1000)];

        let timeline = schedule(segments, &config).unwrap();
        assert_eq!(timeline.total_duration_ms(), 3000);
        assert_eq!(timeline.entries()[1].start_ms, 2000);
        assert_eq!(timeline.transition_total_ms(), 0);
    }

    #[test]
    fn test_caption_windows_partition_timeline() {
        let config = config(1000, 400, TransitionKind::Crossfade);
        let segments = vec![segment("a", 2000, 1000), segment("b", 500, 1000), segment("c", 3000, 1000)];
        let timeline = schedule(segments, &config).unwrap();

        let windows: Vec<(u64, u64)> = timeline
            .entries()
            .iter()
            .map(|e| (e.caption_start_ms, e.caption_end_ms))
            .collect();
        assert_eq!(windows, vec![(0, 1800), (1800, 2400), (2400, 5200)]);

        // Every caption stays within its image's visible range
        for entry in timeline.entries() {
            assert!(entry.caption_start_ms >= entry.start_ms);
            assert!(entry.caption_end_ms <= entry.end_ms);
        }
    }

    #[test]
    fn test_single_segment_has_no_transition() {
        let config = config(1000, 400, TransitionKind::Crossfade);
        let timeline = schedule(vec![segment("only", 2500, 1000)], &config).unwrap();

        assert_eq!(timeline.total_duration_ms(), 2500);
        assert_eq!(timeline.transitions().count(), 0);
        let entry = &timeline.entries()[0];
        assert_eq!((entry.caption_start_ms, entry.caption_end_ms), (0, 2500));
    }

    #[test]
    fn test_empty_input_rejected() {
        let config = config(1000, 400, TransitionKind::Crossfade);
        assert!(matches!(schedule(Vec::new(), &config), Err(TimelineError::Empty)));
    }

    #[test]
    fn test_zero_length_segment_rejected() {
        let config = config(0, 400, TransitionKind::Crossfade);
        let segments = vec![segment("a", 1000, 0), segment("empty", 0, 0)];

        match schedule(segments, &config) {
            Err(TimelineError::ZeroLengthSegment { index, record_id }) => {
                assert_eq!(index, 1);
                assert_eq!(record_id, "empty");
            }
            other => panic!("expected ZeroLengthSegment, got {:?}", other.map(|t| t.len())),
        }
    }

    #[test]
    fn test_order_is_preserved() {
        let config = config(100, 50, TransitionKind::Crossfade);
        let ids = ["e", "a", "d", "b", "c"];
        let segments = ids.iter().map(|id| segment(id, 500, 100)).collect();

        let timeline = schedule(segments, &config).unwrap();
        let order: Vec<&str> = timeline.entries().iter().map(|e| e.segment.record_id()).collect();
        assert_eq!(order, ids);
    }
}
