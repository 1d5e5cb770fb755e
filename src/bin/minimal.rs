// Minimal check that segment building and layout work without ffmpeg

use news_compositor::{
    composition::{compositor::frame_source, FrameSource, Manifest},
    config::Config,
    providers::ProviderRegistry,
    schedule, NewsRecord, SegmentBuilder,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("🎬 Testing News-Compositor Core Functionality");

    let mut config = Config::default();
    config.video.width = 320;
    config.video.height = 180;
    config.timeline.min_image_duration_ms = 1000;
    config.timeline.transition_duration_ms = 400;

    // Test 1: Providers
    println!("\n1. Testing Provider Registry...");
    let registry = ProviderRegistry::new();
    let (scripts, speech, images) = registry.available();
    println!("   script: {:?}, speech: {:?}, image: {:?}", scripts, speech, images);
    let providers = registry.providers(&config.providers)?;

    // Test 2: Segments
    println!("\n2. Building Segments...");
    let records = vec![
        NewsRecord::new("news-001", "Markets rally", "Stocks rose sharply. Bonds fell."),
        NewsRecord::new("news-002", "Rain", ""),
        NewsRecord::new("news-003", "New bridge opens", "The bridge connects both banks. Traffic is expected to ease."),
    ];

    let builder = SegmentBuilder::new(config.clone());
    let mut segments = Vec::new();
    for record in &records {
        let script = providers.script.generate(record).await?;
        let audio = providers.speech.synthesize(&script, &config.voice).await?;
        let image = providers
            .image
            .render(record, &script, (config.video.width, config.video.height))
            .await?;

        let segment = builder.build(record, &script, &audio, &image)?;
        println!(
            "   {}: audio {}ms, display {}ms - {:?}",
            segment.record_id(),
            segment.audio_duration_ms(),
            segment.display_duration_ms(),
            segment.caption()
        );
        segments.push(segment);
    }

    // Test 3: Timeline
    println!("\n3. Scheduling Timeline...");
    let timeline = schedule(segments, &config)?;
    println!(
        "   {}ms = {}ms display - {}ms transitions, {} frames",
        timeline.total_duration_ms(),
        timeline.display_total_ms(),
        timeline.transition_total_ms(),
        timeline.frame_count()
    );
    assert_eq!(
        timeline.total_duration_ms(),
        timeline.display_total_ms() - timeline.transition_total_ms()
    );

    // Test 4: Crossfade frame
    println!("\n4. Rendering first crossfade frame...");
    let entries = timeline.entries();
    let mut cursor = 0;
    let midpoint = entries[1].start_ms as f64 + entries[0].transition_out.map_or(0, |t| t.duration_ms) as f64 / 2.0;
    if let FrameSource::Blend { from, alpha } = frame_source(entries, midpoint, &mut cursor) {
        let blended = entries[from]
            .segment
            .image()
            .blend(entries[from + 1].segment.image(), alpha)
            .ok_or("frame size mismatch")?;
        match blended.save_png("minimal_crossfade.png") {
            Ok(()) => println!("   📁 Crossfade frame saved to: minimal_crossfade.png"),
            Err(e) => println!("   ⚠️  Could not save file: {}", e),
        }
    } else {
        println!("   (no crossfade between the first two segments)");
    }

    // Test 5: Manifest
    println!("\n5. Manifest...");
    println!("{}", Manifest::from_timeline(&timeline).to_json()?);

    println!("🎉 Core pipeline is working.");
    Ok(())
}
