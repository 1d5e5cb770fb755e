use std::path::PathBuf;

use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;

use crate::error::{SkippedRecordError, Stage};

/// Stage-completion events emitted while a run progresses
///
/// Purely an output channel: nothing in the pipeline waits on a consumer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PipelineEvent {
    RunStarted {
        records: usize,
        max_concurrency: usize,
    },

    StageCompleted {
        index: usize,
        record_id: String,
        stage: Stage,
        elapsed_ms: u64,
    },

    RecordSkipped {
        index: usize,
        record_id: String,
        stage: Stage,
        reason: String,
    },

    TimelineScheduled {
        segments: usize,
        total_duration_ms: u64,
    },

    CompositionStarted {
        frames: u64,
    },

    CompositionFinished {
        output_path: PathBuf,
        duration_ms: u64,
    },
}

impl PipelineEvent {
    pub(crate) fn skipped(skip: &SkippedRecordError) -> Self {
        PipelineEvent::RecordSkipped {
            index: skip.index,
            record_id: skip.record_id.clone(),
            stage: skip.stage,
            reason: skip.source.to_string(),
        }
    }
}

/// Sends events to an optional listener, ignoring a listener that went away
#[derive(Debug, Clone, Default)]
pub struct ProgressReporter {
    sender: Option<UnboundedSender<PipelineEvent>>,
}

impl ProgressReporter {
    pub fn new(sender: Option<UnboundedSender<PipelineEvent>>) -> Self {
        Self { sender }
    }

    pub fn emit(&self, event: PipelineEvent) {
        if let Some(sender) = &self.sender {
            let _ = sender.send(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn test_events_serialize_with_tag() {
        let event = PipelineEvent::StageCompleted {
            index: 0,
            record_id: "news-001".to_string(),
            stage: Stage::Speech,
            elapsed_ms: 12,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(
            json,
            r#"{"event":"stage_completed","index":0,"record_id":"news-001","stage":"speech","elapsed_ms":12}"#
        );
    }

    #[test]
    fn test_reporter_survives_dropped_listener() {
        let (tx, rx) = mpsc::unbounded_channel();
        let reporter = ProgressReporter::new(Some(tx));
        drop(rx);
        reporter.emit(PipelineEvent::RunStarted {
            records: 1,
            max_concurrency: 1,
        });

        ProgressReporter::default().emit(PipelineEvent::TimelineScheduled {
            segments: 1,
            total_duration_ms: 1000,
        });
    }
}
