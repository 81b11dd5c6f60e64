use std::mem;
use std::time::Duration;

use framepull_media::SeekPosition;
use tokio::sync::oneshot;
use tracing::{debug, info};

use super::SeekOutcome;
use crate::{Error, Result};

type SeekReply = oneshot::Sender<Result<SeekOutcome>>;

/// `Idle -> Seeking -> Idle`.
///
/// Pulls are held back while a seek is in flight. A new seek replaces the
/// in-flight one, whose caller is told it was superseded.
#[derive(Debug, Default)]
pub(crate) enum SeekState {
    #[default]
    Idle,
    Seeking {
        requested: Duration,
        reply: SeekReply,
    },
}

impl SeekState {
    pub fn is_seeking(&self) -> bool {
        matches!(self, Self::Seeking { .. })
    }

    pub fn begin(&mut self, requested: Duration, reply: SeekReply) {
        let previous = mem::replace(self, Self::Seeking { requested, reply });
        if let Self::Seeking {
            requested: earlier,
            reply,
        } = previous
        {
            info!(
                superseded_ms = earlier.as_millis() as u64,
                requested_ms = requested.as_millis() as u64,
                "Seek superseded"
            );
            let _ = reply.send(Ok(SeekOutcome::Superseded));
        }
        info!(requested_ms = requested.as_millis() as u64, "Seek started");
    }

    /// Finish the in-flight seek. Returns the requested time if there was one.
    pub fn complete(&mut self, position: SeekPosition) -> Option<Duration> {
        match mem::take(self) {
            Self::Seeking { requested, reply } => {
                info!(
                    requested_ms = requested.as_millis() as u64,
                    position_ms = position.time.as_millis() as u64,
                    sample = position.sample_number,
                    "Seek complete"
                );
                let _ = reply.send(Ok(SeekOutcome::Completed {
                    requested,
                    position,
                }));
                Some(requested)
            }
            Self::Idle => {
                debug!("Seek completion without a seek in flight");
                None
            }
        }
    }

    pub fn fail(&mut self, error: &Error) {
        if let Self::Seeking { reply, .. } = mem::take(self) {
            let _ = reply.send(Err(error.clone()));
        }
    }
}
