//! Sample to encoded-chunk conversion.

use std::time::Duration;

use bytes::Bytes;
use framepull_media::{Sample, SeekPosition};

use crate::options::TimestampMode;
use crate::{Error, Result};

/// Key or delta frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkType {
    Key,
    Delta,
}

/// A sample with its timing normalized to microseconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedChunk {
    pub track_id: u32,
    pub chunk_type: ChunkType,
    pub timestamp_us: i64,
    pub duration_us: i64,
    pub data: Bytes,
}

impl EncodedChunk {
    pub fn is_key(&self) -> bool {
        self.chunk_type == ChunkType::Key
    }
}

/// Convert `value` ticks at `timescale` ticks per second to microseconds.
///
/// `None` for a zero timescale or a result beyond `i64`.
pub fn ticks_to_micros(value: u64, timescale: u32) -> Option<i64> {
    let micros = (value as u128 * 1_000_000).checked_div(timescale as u128)?;
    i64::try_from(micros).ok()
}

fn duration_micros(duration: Duration) -> i64 {
    i64::try_from(duration.as_micros()).unwrap_or(i64::MAX)
}

/// Builds chunks from samples.
///
/// The only state is the seek addend, which is zero in
/// [`TimestampMode::Absolute`] mode and until the first seek.
#[derive(Debug, Clone, Default)]
pub struct ChunkFactory {
    mode: TimestampMode,
    seek_addend_us: i64,
}

impl ChunkFactory {
    pub fn new(mode: TimestampMode) -> Self {
        Self {
            mode,
            seek_addend_us: 0,
        }
    }

    /// Record a completed seek.
    ///
    /// In rebased mode the addend moves the first delivered sample (the
    /// sync sample at `position`) onto the `requested` time.
    pub fn on_seek(&mut self, requested: Duration, position: &SeekPosition) {
        self.seek_addend_us = match self.mode {
            TimestampMode::Absolute => 0,
            TimestampMode::Rebased => {
                duration_micros(requested).saturating_sub(duration_micros(position.time))
            }
        };
    }

    pub fn seek_addend_us(&self) -> i64 {
        self.seek_addend_us
    }

    /// Convert a sample. Fails when duration or timescale is zero.
    pub fn chunk(&self, sample: &Sample) -> Result<EncodedChunk> {
        if sample.timescale == 0 {
            return Err(Error::MalformedSample {
                track_id: sample.track_id,
                reason: format!("sample {} has a zero timescale", sample.number),
            });
        }
        if sample.duration == 0 {
            return Err(Error::MalformedSample {
                track_id: sample.track_id,
                reason: format!("sample {} has a zero duration", sample.number),
            });
        }

        let out_of_range = || Error::MalformedSample {
            track_id: sample.track_id,
            reason: format!(
                "sample {} timing ({} + {} ticks at {}/s) is out of range",
                sample.number, sample.cts, sample.duration, sample.timescale
            ),
        };
        let timestamp_us = ticks_to_micros(sample.cts, sample.timescale)
            .and_then(|us| us.checked_add(self.seek_addend_us))
            .ok_or_else(out_of_range)?;
        let duration_us =
            ticks_to_micros(sample.duration as u64, sample.timescale).ok_or_else(out_of_range)?;

        Ok(EncodedChunk {
            track_id: sample.track_id,
            chunk_type: if sample.is_sync {
                ChunkType::Key
            } else {
                ChunkType::Delta
            },
            timestamp_us: timestamp_us.max(0),
            duration_us,
            data: sample.data.clone(),
        })
    }
}
