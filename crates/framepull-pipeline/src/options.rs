//! Tunables shared by the demux and decode stages.

use serde::{Deserialize, Serialize};

/// Which track a demuxer extracts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TrackSelector {
    #[default]
    Video,
    Audio,
}

impl std::fmt::Display for TrackSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Video => write!(f, "video"),
            Self::Audio => write!(f, "audio"),
        }
    }
}

/// Where a seek lands relative to the requested time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SeekPolicy {
    /// Last sync sample at or before the requested time.
    #[default]
    NearestPrecedingSync,
    /// Sample presenting at the requested time, keyframe or not.
    NearestSample,
}

impl SeekPolicy {
    pub fn use_sync(&self) -> bool {
        matches!(self, Self::NearestPrecedingSync)
    }
}

/// How chunk timestamps relate to the container timeline after a seek.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TimestampMode {
    /// Timestamps are the container's, unchanged.
    #[default]
    Absolute,
    /// After a seek, timestamps are shifted so the first sample lands on the
    /// requested time.
    Rebased,
}

/// Demuxer settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DemuxOptions {
    /// Extraction pauses once this many samples are buffered.
    pub sample_buffer_target: usize,
    /// Samples per parser batch.
    pub extraction_batch: usize,
    pub seek_policy: SeekPolicy,
}

impl Default for DemuxOptions {
    fn default() -> Self {
        Self {
            sample_buffer_target: 50,
            extraction_batch: 16,
            seek_policy: SeekPolicy::default(),
        }
    }
}

/// Decode scheduling settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerOptions {
    /// Target number of decoded frames held for presentation.
    pub frame_window_depth: usize,
    /// Submission stops while the decoder holds this many chunks.
    pub decode_queue_depth: usize,
    pub timestamp_mode: TimestampMode,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            frame_window_depth: 3,
            decode_queue_depth: 3,
            timestamp_mode: TimestampMode::default(),
        }
    }
}
