use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn, Level};

use news_compositor::{
    config::Config,
    news::load_records,
    pipeline::{Orchestrator, PipelineEvent},
    providers::ProviderRegistry,
};

#[derive(Parser)]
#[command(
    name = "news-compositor",
    version,
    about = "Turn a list of news items into one narrated slideshow video",
    long_about = "News-Compositor generates a script, a narration and an image for every news item, lays the segments out with transitions and renders them into a single video with burned-in captions."
)]
struct Cli {
    /// JSON file with the news records
    #[arg(short, long, required_unless_present = "print_config")]
    news: Option<PathBuf>,

    /// Output video file path
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Configuration file (optional)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Script generator to use
    #[arg(long)]
    script: Option<String>,

    /// Speech synthesizer to use
    #[arg(long)]
    speech: Option<String>,

    /// Image renderer to use
    #[arg(long)]
    image: Option<String>,

    /// Maximum number of records processed at once
    #[arg(long)]
    max_concurrency: Option<usize>,

    /// Manifest output path
    #[arg(long)]
    manifest: Option<PathBuf>,

    /// Prepend an overview segment summarizing all records
    #[arg(long)]
    overview: bool,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    print_config: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    /// Command-line flags override the configuration file
    fn apply_overrides(&self, config: &mut Config) {
        if let Some(output) = &self.output {
            config.pipeline.output_path = output.clone();
        }
        if let Some(script) = &self.script {
            config.providers.script = script.clone();
        }
        if let Some(speech) = &self.speech {
            config.providers.speech = speech.clone();
        }
        if let Some(image) = &self.image {
            config.providers.image = image.clone();
        }
        if let Some(max_concurrency) = self.max_concurrency {
            config.pipeline.max_concurrency = max_concurrency;
        }
        if let Some(manifest) = &self.manifest {
            config.pipeline.manifest_path = Some(manifest.clone());
            config.pipeline.write_manifest = true;
        }
        if self.overview {
            config.pipeline.include_overview = true;
        }
    }
}

fn log_event(event: &PipelineEvent) {
    match event {
        PipelineEvent::StageCompleted {
            index,
            record_id,
            stage,
            elapsed_ms,
        } => debug!("   #{} {}: {} done in {}ms", index, record_id, stage, elapsed_ms),
        PipelineEvent::RecordSkipped {
            index,
            record_id,
            stage,
            reason,
        } => warn!("   #{} {} skipped at {}: {}", index, record_id, stage, reason),
        PipelineEvent::TimelineScheduled {
            segments,
            total_duration_ms,
        } => info!("   Timeline: {} segment(s), {:.1}s", segments, *total_duration_ms as f64 / 1000.0),
        PipelineEvent::CompositionStarted { frames } => info!("   Rendering {} frames...", frames),
        other => debug!("   {:?}", other),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt().with_max_level(log_level).init();

    // Load configuration
    let mut config = match &cli.config {
        Some(config_path) => {
            info!("Loading configuration from {:?}", config_path);
            Config::from_file(config_path)?
        }
        None => Config::default(),
    };
    cli.apply_overrides(&mut config);
    config.validate()?;

    if cli.print_config {
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    info!("Starting News-Compositor v{}", env!("CARGO_PKG_VERSION"));

    let registry = ProviderRegistry::new();
    let providers = registry.providers(&config.providers).map_err(|e| {
        let (scripts, speech, images) = registry.available();
        anyhow::anyhow!(
            "{} (script: {}; speech: {}; image: {})",
            e,
            scripts.join(", "),
            speech.join(", "),
            images.join(", ")
        )
    })?;

    let news_path = cli
        .news
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("--news is required"))?;
    let records = load_records(news_path)?;
    info!("News: {} record(s) from {:?}", records.len(), news_path);
    info!("Output: {:?}", config.pipeline.output_path);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let logger = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            log_event(&event);
        }
    });

    let orchestrator = Orchestrator::new(config, providers);
    let ctrl_c = async {
        if tokio::signal::ctrl_c().await.is_err() {
            // No signal handler available; never cancel
            std::future::pending::<()>().await;
        }
    };

    let outcome = orchestrator.run_until(records, Some(tx), ctrl_c).await;
    let _ = logger.await;

    match outcome {
        Ok(report) => {
            for skip in &report.skipped {
                warn!("Skipped: {}", skip);
            }
            info!(
                "Done: {:?} ({:.1}s, {} segment(s), {} skipped)",
                report.result.output_path,
                report.result.duration_ms as f64 / 1000.0,
                report.result.manifest.segments.len(),
                report.skipped.len()
            );
            if let Some(manifest) = &report.result.manifest_path {
                info!("Manifest: {:?}", manifest);
            }
            Ok(())
        }
        Err(e) => {
            error!("{}", e.user_message());
            Err(e.into())
        }
    }
}
