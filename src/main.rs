mod cli;

use framepull::{
    config,
    inspect::{self, MovieReport},
    presenter::PresentationTarget,
    source::SourceLocator,
    worker::{self, WorkerCommand, WorkerReply},
};
use framepull_pipeline::{ChunkFactory, ContainerAdapter, PullReply, SeekOutcome, TrackSelector};

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use std::path::Path;
use std::time::Duration;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "framepull=debug,framepull_pipeline=debug,framepull_media=trace".to_string()
        } else {
            "framepull=info,framepull_pipeline=info,framepull_media=warn".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Inspect { source, json } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(inspect_source(&source, cli.config.as_deref(), json))
        }
        Commands::Dump {
            source,
            track,
            seek,
            limit,
        } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(dump_chunks(&source, cli.config.as_deref(), track, seek, limit))
        }
        Commands::Play {
            source,
            seek,
            duration,
            quiet,
        } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(play(&source, cli.config.as_deref(), seek, duration, quiet))
        }
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("framepull {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn seconds(what: &str, secs: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(secs).map_err(|_| {
        anyhow::anyhow!("{} must be a non-negative number of seconds, got {}", what, secs)
    })
}

async fn inspect_source(source: &str, config_path: Option<&Path>, json: bool) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let locator: SourceLocator = source.parse()?;
    let movie = inspect::read_movie(&locator, config.demux.read_chunk_size).await?;
    let report = MovieReport::from(&movie);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Source: {}", locator);
    let secs = report.duration_secs as u64;
    println!(
        "Duration: {:02}:{:02}:{:02}.{:03}",
        secs / 3600,
        (secs / 60) % 60,
        secs % 60,
        (report.duration_secs.fract() * 1000.0) as u64
    );

    println!("\nTracks: {}", report.tracks.len());
    for entry in &report.tracks {
        let track = &entry.track;
        print!(
            "  [{}] {:?} {} ({} samples, timescale {})",
            track.track_id, track.handler_type, track.codec, track.sample_count, track.timescale
        );
        if let (Some(w), Some(h)) = (track.width, track.height) {
            print!(" {}x{}", w, h);
        }
        if let Some(rate) = track.sample_rate {
            print!(" {} Hz", rate);
        }
        if let Some(channels) = track.channels {
            print!(" {}ch", channels);
        }
        println!();

        match (&entry.decoder_codec, entry.description_len, &entry.config_error) {
            (Some(codec), Some(len), _) => {
                println!("      decoder: {} ({} byte description)", codec, len)
            }
            (_, _, Some(error)) => println!("      decoder: unavailable ({})", error),
            _ => {}
        }
    }

    Ok(())
}

async fn dump_chunks(
    source: &str,
    config_path: Option<&Path>,
    track: Option<TrackSelector>,
    seek: Option<f64>,
    limit: Option<usize>,
) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let locator: SourceLocator = source.parse()?;
    let feeder = locator.open(config.demux.read_chunk_size).await?;
    let adapter = ContainerAdapter::open(feeder, config.demux_options());

    let track = adapter
        .initialize(track.unwrap_or(config.playback.track))
        .await?;
    println!("# track {} {}", track.track_id, track.codec);

    let mut chunks = ChunkFactory::new(config.playback.timestamp_mode);
    if let Some(secs) = seek {
        match adapter.seek(seconds("Seek position", secs)?).await? {
            SeekOutcome::Completed {
                requested,
                position,
            } => {
                chunks.on_seek(requested, &position);
                println!(
                    "# seek {:.3}s -> sample {} at {:.3}s",
                    requested.as_secs_f64(),
                    position.sample_number,
                    position.time.as_secs_f64()
                );
            }
            SeekOutcome::Superseded => anyhow::bail!("Seek was superseded"),
        }
    }

    let mut count = 0;
    while limit.map_or(true, |limit| count < limit) {
        let sample = match adapter.next_sample().await? {
            PullReply::Sample(sample) => sample,
            PullReply::Interrupted => continue,
            PullReply::EndOfStream => break,
        };
        match chunks.chunk(&sample) {
            Ok(chunk) => println!(
                "{} {} {} {}",
                if chunk.is_key() { "key" } else { "delta" },
                chunk.timestamp_us,
                chunk.duration_us,
                chunk.data.len()
            ),
            Err(e) => tracing::warn!("Skipping sample {}: {}", sample.number, e),
        }
        count += 1;
    }

    tracing::debug!("Dumped {} chunks", count);
    Ok(())
}

async fn play(
    source: &str,
    config_path: Option<&Path>,
    seek: Option<f64>,
    duration: Option<f64>,
    quiet: bool,
) -> Result<()> {
    if let Some(secs) = seek {
        seconds("Seek position", secs)?;
    }
    let stop_after = duration
        .map(|secs| seconds("Playback duration", secs))
        .transpose()?;

    let config = config::load_config_or_default(config_path)?;
    let mut worker = worker::spawn(config);

    let target = if quiet {
        PresentationTarget::Discard
    } else {
        PresentationTarget::Log
    };
    worker.send(WorkerCommand::Initialize {
        source: source.to_string(),
        target,
    })?;
    if let WorkerReply::InitializeDone {
        codec,
        width,
        height,
        duration_secs,
        ..
    } = worker
        .expect(|r| matches!(r, WorkerReply::InitializeDone { .. }))
        .await?
    {
        match (width, height) {
            (Some(w), Some(h)) => println!("Playing {} {}x{} ({:.3}s)", codec, w, h, duration_secs),
            _ => println!("Playing {} ({:.3}s)", codec, duration_secs),
        }
    }

    if let Some(secs) = seek {
        worker.send(WorkerCommand::Seek { time_secs: secs })?;
        if let WorkerReply::SeekDone { position_secs, .. } = worker
            .expect(|r| matches!(r, WorkerReply::SeekDone { .. }))
            .await?
        {
            println!("Seeked to {:.3}s (keyframe at {:.3}s)", secs, position_secs);
        }
    }

    worker.send(WorkerCommand::Play {
        media_time_secs: None,
    })?;

    let finished = worker.expect(|r| matches!(r, WorkerReply::EndOfStream));
    match stop_after {
        Some(limit) => match tokio::time::timeout(limit, finished).await {
            Ok(result) => {
                result?;
            }
            Err(_) => tracing::info!("Stopping after {:.3}s", limit.as_secs_f64()),
        },
        None => {
            finished.await?;
        }
    }

    let report = worker.shutdown().await?;
    if let Some(report) = report {
        let stats = report.scheduler;
        println!("Chunks submitted: {}", stats.submitted);
        println!("Frames decoded:   {}", stats.decoded);
        println!("Frames painted:   {}", stats.painted);
        println!("Frames dropped:   {}", stats.dropped);
        if stats.skipped > 0 {
            println!("Samples skipped:  {}", stats.skipped);
        }
        if report.frames_leaked > 0 {
            println!("Frames leaked:    {}", report.frames_leaked);
        }
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            println!(
                "  Demux: buffer {} samples, batch {}, read {} bytes, seek {:?}",
                config.demux.sample_buffer_target,
                config.demux.extraction_batch,
                config.demux.read_chunk_size,
                config.demux.seek_policy
            );
            println!(
                "  Scheduler: window {}, decode queue {}, render every {}ms",
                config.scheduler.frame_window_depth,
                config.scheduler.decode_queue_depth,
                config.scheduler.render_interval_ms
            );
            println!(
                "  Playback: {} track, {:?} timestamps",
                config.playback.track, config.playback.timestamp_mode
            );
        }
        None => {
            println!("No config file specified, using defaults");
            let config = config::Config::default();
            println!(
                "  Demux: buffer {} samples, batch {}",
                config.demux.sample_buffer_target, config.demux.extraction_batch
            );
        }
    }

    Ok(())
}
