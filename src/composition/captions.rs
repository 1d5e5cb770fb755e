//! Caption track derived from the timeline, written as SRT for burn-in.

use std::fmt::Write as FmtWrite;
use std::path::Path;

use serde::Serialize;

use crate::timeline::Timeline;

/// Longest caption line before wrapping, in characters
const MAX_LINE_CHARS: usize = 42;

/// One caption shown over a time window
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaptionCue {
    pub start_ms: u64,
    pub end_ms: u64,
    pub text: String,
}

/// Ordered, non-overlapping caption cues covering the timeline
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptionTrack {
    cues: Vec<CaptionCue>,
}

impl CaptionTrack {
    /// One cue per segment, over that segment's caption window
    pub fn from_timeline(timeline: &Timeline) -> Self {
        let cues = timeline
            .entries()
            .iter()
            .filter(|entry| entry.caption_end_ms > entry.caption_start_ms)
            .map(|entry| CaptionCue {
                start_ms: entry.caption_start_ms,
                end_ms: entry.caption_end_ms,
                text: entry.segment.caption().to_string(),
            })
            .collect();
        Self { cues }
    }

    pub fn cues(&self) -> &[CaptionCue] {
        &self.cues
    }

    pub fn is_empty(&self) -> bool {
        self.cues.is_empty()
    }

    /// Caption visible at time `t_ms`, if any
    pub fn active_at(&self, t_ms: u64) -> Option<&CaptionCue> {
        self.cues.iter().find(|cue| cue.start_ms <= t_ms && t_ms < cue.end_ms)
    }

    pub fn to_srt(&self) -> String {
        let mut out = String::new();
        for (i, cue) in self.cues.iter().enumerate() {
            let _ = writeln!(out, "{}", i + 1);
            let _ = writeln!(out, "{} --> {}", format_srt_time(cue.start_ms), format_srt_time(cue.end_ms));
            let _ = writeln!(out, "{}", wrap_caption(&cue.text, MAX_LINE_CHARS));
            out.push('\n');
        }
        out
    }

    pub fn write_srt<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        std::fs::write(path, self.to_srt())
    }
}

/// Format time as SRT timestamp (HH:MM:SS,mmm)
fn format_srt_time(ms: u64) -> String {
    let hours = ms / 3_600_000;
    let minutes = (ms % 3_600_000) / 60_000;
    let seconds = (ms % 60_000) / 1000;
    let millis = ms % 1000;
    format!("{hours:02}:{minutes:02}:{seconds:02},{millis:03}")
}

/// Break caption text into lines of at most `max_chars` characters.
///
/// Breaks at spaces where possible; text without spaces (CJK) is split
/// at the character limit.
fn wrap_caption(text: &str, max_chars: usize) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let mut word = word;
        loop {
            let current_len = current.chars().count();
            let word_len = word.chars().count();
            let needed = if current.is_empty() { word_len } else { current_len + 1 + word_len };

            if needed <= max_chars {
                if !current.is_empty() {
                    current.push(' ');
                }
                current.push_str(word);
                break;
            }

            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
                continue;
            }

            // A single word longer than a line
            let split = word
                .char_indices()
                .nth(max_chars)
                .map(|(i, _)| i)
                .unwrap_or(word.len());
            lines.push(word[..split].to_string());
            word = &word[split..];
            if word.is_empty() {
                break;
            }
        }
    }

    if !current.is_empty() {
        lines.push(current);
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, TransitionKind};
    use crate::timeline::scheduler::tests::segment;
    use crate::timeline::schedule;

    fn timeline() -> Timeline {
        let mut config = Config::default();
        config.video.width = 4;
        config.video.height = 4;
        config.timeline.min_image_duration_ms = 1000;
        config.timeline.transition_duration_ms = 400;
        config.timeline.transition_kind = TransitionKind::Crossfade;
        schedule(
            vec![segment("a", 2000, 1000), segment("b", 500, 1000), segment("c", 3000, 1000)],
            &config,
        )
        .unwrap()
    }

    #[test]
    fn test_srt_time_format() {
        assert_eq!(format_srt_time(0), "00:00:00,000");
        assert_eq!(format_srt_time(3_723_045), "01:02:03,045");
    }

    #[test]
    fn test_track_follows_caption_windows() {
        let track = CaptionTrack::from_timeline(&timeline());
        assert_eq!(track.cues().len(), 3);
        assert_eq!(track.active_at(0).unwrap().text, "Caption a");
        assert_eq!(track.active_at(1799).unwrap().text, "Caption a");
        assert_eq!(track.active_at(1800).unwrap().text, "Caption b");
        assert_eq!(track.active_at(5199).unwrap().text, "Caption c");
        assert!(track.active_at(5200).is_none());
    }

    #[test]
    fn test_srt_output() {
        let srt = CaptionTrack::from_timeline(&timeline()).to_srt();
        assert!(srt.starts_with("1\n00:00:00,000 --> 00:00:01,800\nCaption a\n\n2\n"));
        assert!(srt.contains("3\n00:00:02,400 --> 00:00:05,200\nCaption c\n"));
    }

    #[test]
    fn test_wrap_caption() {
        assert_eq!(wrap_caption("one two three", 7), "one two\nthree");
        assert_eq!(wrap_caption("今天天气很好", 4), "今天天气\n很好");
        assert_eq!(wrap_caption("short", 42), "short");
    }
}
