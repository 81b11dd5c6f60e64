//! Pull interface over the push-driven container parser.
//!
//! A [`ContainerAdapter`] is a cheap handle to a demux task. The task owns
//! the parser, the [`ByteFeeder`] and the sample buffer; every operation on
//! the handle is a request answered by the task, so the parser and buffer
//! have exactly one owner and need no locking.
//!
//! ```text
//! ByteFeeder --bytes--> parser --on_samples--> SampleBuffer --pull--> caller
//!      ^                                            |
//!      +------------- wants_data() <----------------+
//! ```

mod seek;
mod state;
mod task;

use std::time::Duration;

use framepull_media::{Mp4StreamParser, Sample, SeekPosition, Track};
use tokio::sync::{mpsc, oneshot};

use crate::decoder::DecoderConfig;
use crate::feeder::ByteFeeder;
use crate::options::{DemuxOptions, TrackSelector};
use crate::{Error, Result};

pub use state::DemuxState;

use task::DemuxTask;

/// Answer to a sample pull.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PullReply {
    Sample(Sample),
    /// A seek discarded this pull. Pull again once the seek has completed.
    Interrupted,
    /// Every sample of the selected track has been delivered.
    EndOfStream,
}

/// How a seek request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekOutcome {
    /// Extraction restarts at `position`.
    Completed {
        requested: Duration,
        position: SeekPosition,
    },
    /// A later seek replaced this one before it finished.
    Superseded,
}

#[derive(Debug)]
pub(crate) enum DemuxRequest {
    Initialize {
        selector: TrackSelector,
        reply: oneshot::Sender<Result<Track>>,
    },
    DecoderConfig {
        reply: oneshot::Sender<Result<DecoderConfig>>,
    },
    Pull {
        reply: oneshot::Sender<Result<PullReply>>,
    },
    Seek {
        time: Duration,
        reply: oneshot::Sender<Result<SeekOutcome>>,
    },
    Duration {
        reply: oneshot::Sender<Option<Duration>>,
    },
}

/// Handle to a running demuxer.
///
/// Clones share the same demuxer. The demux task stops once every handle
/// has been dropped.
#[derive(Debug, Clone)]
pub struct ContainerAdapter {
    requests: mpsc::UnboundedSender<DemuxRequest>,
}

impl ContainerAdapter {
    /// Demux `feeder` with the bundled MP4 parser.
    pub fn open(feeder: ByteFeeder, options: DemuxOptions) -> Self {
        Self::spawn(Mp4StreamParser::new, feeder, options)
    }

    /// Demux `feeder` with a parser built around the adapter's handler.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<P, F>(make_parser: F, feeder: ByteFeeder, options: DemuxOptions) -> Self
    where
        F: FnOnce(DemuxState) -> P,
        P: framepull_media::ContainerParser<DemuxState> + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let parser = make_parser(DemuxState::new(options.sample_buffer_target));
        let task = DemuxTask::new(parser, feeder, rx, options);
        tokio::spawn(task.run());
        Self { requests: tx }
    }

    async fn call<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> DemuxRequest,
    ) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.requests.send(make(tx)).map_err(|_| Error::Closed)?;
        rx.await.map_err(|_| Error::Closed)
    }

    /// Wait for the track list and select one track for extraction.
    ///
    /// Fails with [`Error::Container`] when no track of the requested kind
    /// exists, and with [`Error::InvalidState`] if a track was already selected.
    pub async fn initialize(&self, selector: TrackSelector) -> Result<Track> {
        self.call(|reply| DemuxRequest::Initialize { selector, reply })
            .await?
    }

    /// Codec, dimensions or sample rate, and description of the selected track.
    pub async fn decoder_config(&self) -> Result<DecoderConfig> {
        self.call(|reply| DemuxRequest::DecoderConfig { reply }).await?
    }

    /// Ask for the next sample and get the reply slot back.
    ///
    /// Only one pull may be outstanding per demuxer. Dropping the receiver
    /// abandons the pull.
    pub fn request_sample(&self) -> Result<oneshot::Receiver<Result<PullReply>>> {
        let (tx, rx) = oneshot::channel();
        self.requests
            .send(DemuxRequest::Pull { reply: tx })
            .map_err(|_| Error::Closed)?;
        Ok(rx)
    }

    /// Next sample of the selected track, waiting until one is available.
    pub async fn next_sample(&self) -> Result<PullReply> {
        self.request_sample()?.await.map_err(|_| Error::Closed)?
    }

    /// Reposition extraction near `time`.
    ///
    /// Buffered samples are discarded and a pending pull is answered with
    /// [`PullReply::Interrupted`]. Pulls issued while the seek is in flight
    /// wait for it to complete.
    pub async fn seek(&self, time: Duration) -> Result<SeekOutcome> {
        self.call(|reply| DemuxRequest::Seek { time, reply }).await?
    }

    /// Movie duration, once the track list is known.
    pub async fn duration(&self) -> Result<Option<Duration>> {
        self.call(|reply| DemuxRequest::Duration { reply }).await
    }
}
