use std::ops::ControlFlow;

use framepull_media::{MovieInfo, ParserHandler, Sample, SeekPosition, Track};
use tokio::sync::oneshot;
use tracing::{debug, error, trace};

use super::seek::SeekState;
use super::PullReply;
use crate::options::TrackSelector;
use crate::sample_buffer::SampleBuffer;
use crate::{Error, Result};

pub(crate) type PullWaiter = oneshot::Sender<Result<PullReply>>;

/// Demuxer state fed by parser callbacks.
///
/// Owned by the parser as its handler; the demux task reaches it through
/// `handler()` / `handler_mut()`.
#[derive(Debug)]
pub struct DemuxState {
    pub(crate) movie: Option<MovieInfo>,
    pub(crate) track: Option<Track>,
    pub(crate) buffer: SampleBuffer,
    pub(crate) waiter: Option<PullWaiter>,
    pub(crate) seek: SeekState,
    /// Whether the parser has been started and not paused since.
    pub(crate) extracting: bool,
    pub(crate) end_of_track: bool,
    pub(crate) error: Option<Error>,
}

impl DemuxState {
    pub(crate) fn new(buffer_target: usize) -> Self {
        Self {
            movie: None,
            track: None,
            buffer: SampleBuffer::new(buffer_target),
            waiter: None,
            seek: SeekState::Idle,
            extracting: false,
            end_of_track: false,
            error: None,
        }
    }

    /// Selected track, if any.
    pub fn track(&self) -> Option<&Track> {
        self.track.as_ref()
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Record a fatal error. The first one wins.
    pub(crate) fn fail(&mut self, error: Error) {
        if self.error.is_none() {
            error!(error = %error, "Demuxer failed");
            self.error = Some(error);
        }
    }

    /// Pick the extraction track. Only valid once the movie is known.
    pub(crate) fn select(&mut self, selector: TrackSelector) -> Result<Track> {
        if self.track.is_some() {
            return Err(Error::InvalidState("a track is already selected".into()));
        }
        let movie = self
            .movie
            .as_ref()
            .ok_or_else(|| Error::InvalidState("track list not available yet".into()))?;

        let track = match selector {
            TrackSelector::Video => movie.video_track(),
            TrackSelector::Audio => movie.audio_track(),
        }
        .cloned()
        .ok_or_else(|| Error::container(format!("no {} track in container", selector)))?;

        self.track = Some(track.clone());
        Ok(track)
    }

    fn is_selected(&self, track_id: u32) -> bool {
        self.track.as_ref().is_some_and(|t| t.track_id == track_id)
    }
}

impl ParserHandler for DemuxState {
    fn on_ready(&mut self, movie: &MovieInfo) {
        debug!(tracks = movie.tracks.len(), "Track list ready");
        self.movie = Some(movie.clone());
    }

    fn on_samples(&mut self, track_id: u32, samples: Vec<Sample>) -> ControlFlow<()> {
        if !self.is_selected(track_id) {
            trace!(track_id, "Ignoring samples for unselected track");
            return ControlFlow::Continue(());
        }

        debug!(
            track_id,
            count = samples.len(),
            buffered = self.buffer.len(),
            "Samples received"
        );
        if self.buffer.push_batch(samples) {
            self.extracting = false;
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    }

    fn on_error(&mut self, error: framepull_media::Error) {
        self.fail(error.into());
    }

    fn on_seek_complete(&mut self, position: SeekPosition) {
        self.seek.complete(position);
    }

    fn on_end_of_track(&mut self, track_id: u32) {
        if self.is_selected(track_id) {
            debug!(track_id, "End of track reached");
            self.end_of_track = true;
            self.extracting = false;
        }
    }
}
