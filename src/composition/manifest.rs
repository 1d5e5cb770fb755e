use serde::{Deserialize, Serialize};

use crate::config::TransitionKind;
use crate::timeline::Timeline;

/// Per-segment timing written next to the output for verification
///
/// Contains only values derived from the timeline, so composing the same
/// timeline twice yields byte-identical manifests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub duration_ms: u64,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub frame_count: u64,
    pub segments: Vec<ManifestEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub index: usize,
    pub record_id: String,
    pub title: String,
    pub start_ms: u64,
    pub end_ms: u64,
    pub audio_duration_ms: u64,
    pub caption_start_ms: u64,
    pub caption_end_ms: u64,
    pub caption: String,
    pub transition_out: Option<ManifestTransition>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestTransition {
    pub kind: TransitionKind,
    pub duration_ms: u64,
}

impl Manifest {
    pub fn from_timeline(timeline: &Timeline) -> Self {
        let segments = timeline
            .entries()
            .iter()
            .enumerate()
            .map(|(index, entry)| ManifestEntry {
                index,
                record_id: entry.segment.record_id().to_string(),
                title: entry.segment.title().to_string(),
                start_ms: entry.start_ms,
                end_ms: entry.end_ms,
                audio_duration_ms: entry.segment.audio_duration_ms(),
                caption_start_ms: entry.caption_start_ms,
                caption_end_ms: entry.caption_end_ms,
                caption: entry.segment.caption().to_string(),
                transition_out: entry.transition_out.map(|t| ManifestTransition {
                    kind: t.kind,
                    duration_ms: t.duration_ms,
                }),
            })
            .collect();

        Self {
            duration_ms: timeline.total_duration_ms(),
            width: timeline.width(),
            height: timeline.height(),
            fps: timeline.fps(),
            frame_count: timeline.frame_count(),
            segments,
        }
    }

    pub fn record_ids(&self) -> Vec<&str> {
        self.segments.iter().map(|s| s.record_id.as_str()).collect()
    }

    /// Pretty JSON with a trailing newline
    pub fn to_json(&self) -> serde_json::Result<String> {
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        Ok(json)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}
