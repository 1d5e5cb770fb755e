use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::composition::output::create_workspace;
use crate::composition::{CompositionResult, Compositor};
use crate::config::Config;
use crate::error::{ArtifactError, CompositorError, ProviderError, Result, SkippedRecordError, Stage};
use crate::news::{normalize_records, NewsRecord};
use crate::pipeline::events::{PipelineEvent, ProgressReporter};
use crate::providers::Providers;
use crate::timeline::{schedule, Segment, SegmentBuilder};
use crate::video::{EncoderBackend, FfmpegEncoder};

/// Outcome of a successful run
#[derive(Debug)]
pub struct RunReport {
    pub result: CompositionResult,
    /// Records dropped along the way, in input order
    pub skipped: Vec<SkippedRecordError>,
}

/// Shared, read-only state for the per-record tasks
struct RecordContext {
    config: Config,
    providers: Providers,
    builder: SegmentBuilder,
    reporter: ProgressReporter,
    /// Every record of the run, for the overview summary
    records: Arc<Vec<NewsRecord>>,
}

/// Sets the flag when dropped, i.e. when the run future finishes or is abandoned
struct CancelOnDrop(Arc<AtomicBool>);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Drives a whole run: artifact fan-out, layout, composition
///
/// Per-record generation runs concurrently (bounded by
/// `pipeline.max_concurrency`); results land in slots indexed by input
/// position, so completion order never affects segment order.
pub struct Orchestrator {
    config: Config,
    providers: Providers,
    encoder: Arc<dyn EncoderBackend>,
}

impl Orchestrator {
    /// Orchestrator encoding with ffmpeg
    pub fn new(config: Config, providers: Providers) -> Self {
        Self {
            config,
            providers,
            encoder: Arc::new(FfmpegEncoder::new()),
        }
    }

    pub fn with_encoder(mut self, encoder: Arc<dyn EncoderBackend>) -> Self {
        self.encoder = encoder;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run the pipeline, honouring `pipeline.timeout_secs`
    pub async fn run(
        &self,
        records: Vec<NewsRecord>,
        events: Option<UnboundedSender<PipelineEvent>>,
    ) -> Result<RunReport> {
        self.run_until(records, events, std::future::pending::<()>()).await
    }

    /// Run the pipeline until it finishes or `cancel` resolves.
    ///
    /// On cancellation in-flight record tasks are aborted, finished segments
    /// are discarded and nothing is published.
    pub async fn run_until<C>(
        &self,
        records: Vec<NewsRecord>,
        events: Option<UnboundedSender<PipelineEvent>>,
        cancel: C,
    ) -> Result<RunReport>
    where
        C: Future<Output = ()>,
    {
        let reporter = ProgressReporter::new(events);
        let work = self.execute(records, reporter);

        let work = async {
            match self.config.pipeline.timeout_secs {
                Some(secs) => match tokio::time::timeout(Duration::from_secs(secs), work).await {
                    Ok(result) => result,
                    Err(_) => Err(CompositorError::Cancelled {
                        reason: format!("timed out after {}s", secs),
                    }),
                },
                None => work.await,
            }
        };

        tokio::select! {
            result = work => result,
            _ = cancel => {
                warn!("Run cancelled; discarding in-flight work");
                Err(CompositorError::Cancelled {
                    reason: "cancelled by caller".to_string(),
                })
            }
        }
    }

    async fn execute(&self, records: Vec<NewsRecord>, reporter: ProgressReporter) -> Result<RunReport> {
        let started = Instant::now();
        self.config.validate()?;
        let records = self.prepare_records(records);

        info!("🚀 Starting run: {} record(s)", records.len());
        info!(
            "   Providers: script={}, speech={}, image={}",
            self.providers.script.name(),
            self.providers.speech.name(),
            self.providers.image.name()
        );

        let workspace = create_workspace(self.config.pipeline.temp_dir.as_deref())?;

        // Step 1: Artifact generation
        let (segments, skipped) = self.generate_segments(records, &reporter).await?;

        // Step 2: Layout
        let timeline = schedule(segments, &self.config)?;
        reporter.emit(PipelineEvent::TimelineScheduled {
            segments: timeline.len(),
            total_duration_ms: timeline.total_duration_ms(),
        });

        // Step 3: Composition
        reporter.emit(PipelineEvent::CompositionStarted {
            frames: timeline.frame_count(),
        });

        let cancelled = Arc::new(AtomicBool::new(false));
        let _guard = CancelOnDrop(cancelled.clone());
        let compositor = Compositor::new(self.config.clone(), self.encoder.clone()).with_cancel_flag(cancelled);

        // The workspace moves along so it outlives the render even if this future is dropped
        let result = tokio::task::spawn_blocking(move || {
            let result = compositor.compose(&timeline, workspace.path());
            drop(workspace);
            result
        })
        .await
        .map_err(|e| CompositorError::generic(format!("composition task failed: {}", e)))??;

        reporter.emit(PipelineEvent::CompositionFinished {
            output_path: result.output_path.clone(),
            duration_ms: result.duration_ms,
        });

        info!(
            "🎉 Run complete in {:.1}s: {} segment(s), {} skipped -> {:?}",
            started.elapsed().as_secs_f64(),
            result.manifest.segments.len(),
            skipped.len(),
            result.output_path
        );

        Ok(RunReport { result, skipped })
    }

    /// Assign ids, drop blank records, prepend the overview if enabled
    fn prepare_records(&self, records: Vec<NewsRecord>) -> Vec<NewsRecord> {
        let mut records = normalize_records(records);

        if self.config.pipeline.include_overview && !records.is_empty() {
            let overview = NewsRecord::overview_of(&records);
            records.insert(0, overview);
        }
        records
    }

    /// Fan out artifact generation and collect segments in input order
    async fn generate_segments(
        &self,
        records: Vec<NewsRecord>,
        reporter: &ProgressReporter,
    ) -> Result<(Vec<Segment>, Vec<SkippedRecordError>)> {
        let attempted = records.len();
        let max_concurrency = self.config.pipeline.max_concurrency.max(1);

        reporter.emit(PipelineEvent::RunStarted {
            records: attempted,
            max_concurrency,
        });
        info!("📰 Step 1: Generating artifacts (concurrency: {})", max_concurrency);

        let records = Arc::new(records);
        let context = Arc::new(RecordContext {
            config: self.config.clone(),
            providers: self.providers.clone(),
            builder: SegmentBuilder::new(self.config.clone()),
            reporter: reporter.clone(),
            records: records.clone(),
        });

        let semaphore = Arc::new(Semaphore::new(max_concurrency));
        let mut tasks = JoinSet::new();
        let mut task_index = HashMap::with_capacity(attempted);

        for index in 0..records.len() {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| CompositorError::generic("worker pool closed"))?;
            let context = context.clone();

            let handle = tasks.spawn(async move {
                let _permit = permit;
                process_record(index, &context).await
            });
            task_index.insert(handle.id(), index);
        }

        let mut slots: Vec<Option<std::result::Result<Segment, SkippedRecordError>>> =
            (0..attempted).map(|_| None).collect();

        while let Some(joined) = tasks.join_next_with_id().await {
            let id = match &joined {
                Ok((id, _)) => *id,
                Err(e) => e.id(),
            };
            let index = task_index
                .get(&id)
                .copied()
                .ok_or_else(|| CompositorError::generic(format!("unknown record task {}", id)))?;

            slots[index] = Some(match joined {
                Ok((_, outcome)) => outcome,
                // A panicking provider only costs its own record
                Err(e) if e.is_panic() => Err(panicked_record(index, &records[index], e)),
                Err(e) => return Err(CompositorError::generic(format!("record task failed: {}", e))),
            });
        }

        let mut segments = Vec::with_capacity(attempted);
        let mut skipped = Vec::new();

        for outcome in slots.into_iter().flatten() {
            match outcome {
                Ok(segment) => segments.push(segment),
                Err(skip) => {
                    warn!("⚠️  {}", skip);
                    reporter.emit(PipelineEvent::skipped(&skip));
                    skipped.push(skip);
                }
            }
        }

        info!("   {} segment(s) ready, {} record(s) skipped", segments.len(), skipped.len());

        if segments.is_empty() {
            return Err(CompositorError::NoValidSegments {
                attempted,
                skipped: skipped.len(),
            });
        }

        Ok((segments, skipped))
    }
}

fn panicked_record(index: usize, record: &NewsRecord, error: tokio::task::JoinError) -> SkippedRecordError {
    let stage = Stage::Script;
    SkippedRecordError {
        index,
        record_id: record.id.clone(),
        stage,
        source: ArtifactError::GenerationFailed {
            stage,
            source: ProviderError::failed("record task", error.to_string()),
        },
    }
}

/// Script, then speech and image side by side, then the segment
async fn process_record(index: usize, context: &RecordContext) -> std::result::Result<Segment, SkippedRecordError> {
    let record = &context.records[index];
    let skip = |stage: Stage, source: ArtifactError| SkippedRecordError {
        index,
        record_id: record.id.clone(),
        stage,
        source,
    };
    let generation_failed = |stage: Stage, source: ProviderError| skip(stage, ArtifactError::GenerationFailed { stage, source });
    let completed = |stage: Stage, since: Instant| {
        context.reporter.emit(PipelineEvent::StageCompleted {
            index,
            record_id: record.id.clone(),
            stage,
            elapsed_ms: since.elapsed().as_millis() as u64,
        });
    };

    // Script
    let started = Instant::now();
    let script = if record.is_overview() {
        let others: Vec<NewsRecord> = context.records.iter().filter(|r| !r.is_overview()).cloned().collect();
        context.providers.script.summarize(&others).await
    } else {
        context.providers.script.generate(record).await
    };
    let script = script.map_err(|e| generation_failed(Stage::Script, e))?;

    if script.trim().is_empty() {
        return Err(skip(Stage::Script, ArtifactError::EmptyScript));
    }
    completed(Stage::Script, started);
    debug!("Record {}: script ready ({} chars)", record.id, script.chars().count());

    // Speech and image do not depend on each other
    let video = &context.config.video;
    let speech_started = Instant::now();
    let (audio, image) = tokio::join!(
        async {
            let audio = context.providers.speech.synthesize(&script, &context.config.voice).await;
            if audio.is_ok() {
                completed(Stage::Speech, speech_started);
            }
            audio
        },
        async {
            let image = context
                .providers
                .image
                .render(record, &script, (video.width, video.height))
                .await;
            if image.is_ok() {
                completed(Stage::Image, speech_started);
            }
            image
        }
    );

    let audio = audio.map_err(|e| generation_failed(Stage::Speech, e))?;
    if audio.bytes.is_empty() {
        return Err(skip(Stage::Speech, ArtifactError::EmptyAudio));
    }
    let image = image.map_err(|e| generation_failed(Stage::Image, e))?;
    if image.is_empty() {
        return Err(skip(Stage::Image, ArtifactError::EmptyImage));
    }

    // Decoding and resizing are CPU-bound
    let started = Instant::now();
    let builder = context.builder.clone();
    let owned_record = record.clone();
    let segment = tokio::task::spawn_blocking(move || builder.build(&owned_record, &script, &audio, &image))
        .await
        .map_err(|e| {
            generation_failed(
                Stage::Segment,
                ProviderError::failed("segment-builder", e.to_string()),
            )
        })?
        .map_err(|e| skip(Stage::Segment, e))?;
    completed(Stage::Segment, started);

    Ok(segment)
}
