use framepull_pipeline::{DemuxOptions, SchedulerOptions, SeekPolicy, TimestampMode, TrackSelector};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub demux: DemuxConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub playback: PlaybackConfig,
}

impl Config {
    pub fn demux_options(&self) -> DemuxOptions {
        DemuxOptions {
            sample_buffer_target: self.demux.sample_buffer_target,
            extraction_batch: self.demux.extraction_batch,
            seek_policy: self.demux.seek_policy,
        }
    }

    pub fn scheduler_options(&self) -> SchedulerOptions {
        SchedulerOptions {
            frame_window_depth: self.scheduler.frame_window_depth,
            decode_queue_depth: self.scheduler.decode_queue_depth,
            timestamp_mode: self.playback.timestamp_mode,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DemuxConfig {
    /// Extraction pauses once this many samples are buffered
    #[serde(default = "default_sample_buffer_target")]
    pub sample_buffer_target: usize,

    /// Samples per parser batch
    #[serde(default = "default_extraction_batch")]
    pub extraction_batch: usize,

    /// Bytes per transport read
    #[serde(default = "default_read_chunk_size")]
    pub read_chunk_size: usize,

    #[serde(default)]
    pub seek_policy: SeekPolicy,
}

impl Default for DemuxConfig {
    fn default() -> Self {
        Self {
            sample_buffer_target: default_sample_buffer_target(),
            extraction_batch: default_extraction_batch(),
            read_chunk_size: default_read_chunk_size(),
            seek_policy: SeekPolicy::default(),
        }
    }
}

fn default_sample_buffer_target() -> usize {
    50
}

fn default_extraction_batch() -> usize {
    16
}

fn default_read_chunk_size() -> usize {
    64 * 1024
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SchedulerConfig {
    /// Decoded frames held for presentation
    #[serde(default = "default_depth")]
    pub frame_window_depth: usize,

    /// Chunks the decoder may hold before submission pauses
    #[serde(default = "default_depth")]
    pub decode_queue_depth: usize,

    #[serde(default = "default_refill_interval_ms")]
    pub refill_interval_ms: u64,

    #[serde(default = "default_render_interval_ms")]
    pub render_interval_ms: u64,
}

impl SchedulerConfig {
    pub fn refill_interval(&self) -> Duration {
        Duration::from_millis(self.refill_interval_ms)
    }

    pub fn render_interval(&self) -> Duration {
        Duration::from_millis(self.render_interval_ms)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            frame_window_depth: default_depth(),
            decode_queue_depth: default_depth(),
            refill_interval_ms: default_refill_interval_ms(),
            render_interval_ms: default_render_interval_ms(),
        }
    }
}

fn default_depth() -> usize {
    3
}

fn default_refill_interval_ms() -> u64 {
    10
}

fn default_render_interval_ms() -> u64 {
    16
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct PlaybackConfig {
    /// Track extracted by each demuxer
    #[serde(default)]
    pub track: TrackSelector,

    #[serde(default)]
    pub timestamp_mode: TimestampMode,

    /// Simulated per-chunk latency of the bundled decoder
    #[serde(default)]
    pub decode_latency_ms: u64,
}

impl PlaybackConfig {
    pub fn decode_latency(&self) -> Duration {
        Duration::from_millis(self.decode_latency_ms)
    }
}
