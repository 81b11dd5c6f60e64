use clap::{Parser, Subcommand};
use framepull_pipeline::TrackSelector;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "framepull")]
#[command(author, version, about = "Incremental MP4 demuxer and frame scheduler")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List tracks and decoder configurations
    Inspect {
        /// File path or http(s) URL
        #[arg(required = true)]
        source: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the encoded chunks of one track
    Dump {
        /// File path or http(s) URL
        #[arg(required = true)]
        source: String,

        /// Track to extract (overrides config)
        #[arg(long, value_parser = parse_track)]
        track: Option<TrackSelector>,

        /// Seek to this position (seconds) before dumping
        #[arg(long)]
        seek: Option<f64>,

        /// Stop after this many chunks
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },

    /// Play a source through the decode scheduler and report frame statistics
    Play {
        /// File path or http(s) URL
        #[arg(required = true)]
        source: String,

        /// Start position in seconds
        #[arg(long)]
        seek: Option<f64>,

        /// Stop after this many seconds of playback
        #[arg(long)]
        duration: Option<f64>,

        /// Count frames without logging each one
        #[arg(long)]
        quiet: bool,
    },

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}

fn parse_track(s: &str) -> Result<TrackSelector, String> {
    match s {
        "video" => Ok(TrackSelector::Video),
        "audio" => Ok(TrackSelector::Audio),
        other => Err(format!("expected 'video' or 'audio', got '{}'", other)),
    }
}
