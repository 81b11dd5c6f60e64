//! Error types for framepull-pipeline.

use std::io;
use std::sync::Arc;
use thiserror::Error;

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Pipeline error.
///
/// `Clone` so a single fatal error can be handed to every pending waiter.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// Malformed or truncated container, or no track of the requested kind.
    #[error("Container error: {0}")]
    Container(String),

    /// Decoder configuration missing or unsupported.
    #[error("Decoder configuration error: {0}")]
    Config(String),

    /// A sample whose timing cannot be converted. The sample is skipped.
    #[error("Malformed sample on track {track_id}: {reason}")]
    MalformedSample { track_id: u32, reason: String },

    /// The byte source failed.
    #[error("Transport error: {0}")]
    Transport(Arc<io::Error>),

    /// The decoder reported an error.
    #[error("Decode error: {0}")]
    Decode(String),

    /// Operation issued in the wrong lifecycle state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The demux task is gone.
    #[error("Demuxer closed")]
    Closed,
}

impl Error {
    /// Whether this error ends the playback session.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::MalformedSample { .. } | Self::InvalidState(_))
    }

    pub fn container(msg: impl Into<String>) -> Self {
        Self::Container(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

impl From<framepull_media::Error> for Error {
    fn from(e: framepull_media::Error) -> Self {
        Self::Container(e.to_string())
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Self::Transport(Arc::new(e))
    }
}
