use std::time::Duration;

use framepull_media::{ContainerParser, ExtractionOptions, Track};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, trace};

use super::state::DemuxState;
use super::{DemuxRequest, PullReply, SeekOutcome};
use crate::decoder::DecoderConfig;
use crate::feeder::ByteFeeder;
use crate::options::{DemuxOptions, TrackSelector};
use crate::{Error, Result};

type InitReply = oneshot::Sender<Result<Track>>;

/// Owns the parser and the byte source, and serves [`DemuxRequest`]s.
pub(crate) struct DemuxTask<P> {
    parser: P,
    feeder: ByteFeeder,
    requests: mpsc::UnboundedReceiver<DemuxRequest>,
    options: DemuxOptions,
    pending_init: Option<(TrackSelector, InitReply)>,
}

impl<P> DemuxTask<P>
where
    P: ContainerParser<DemuxState> + Send + 'static,
{
    pub fn new(
        parser: P,
        feeder: ByteFeeder,
        requests: mpsc::UnboundedReceiver<DemuxRequest>,
        options: DemuxOptions,
    ) -> Self {
        Self {
            parser,
            feeder,
            requests,
            options,
            pending_init: None,
        }
    }

    pub async fn run(mut self) {
        loop {
            // Bytes are only read while the parser can use them
            let want_bytes = self.parser.wants_data() && !self.feeder.is_finished();

            tokio::select! {
                biased;

                request = self.requests.recv() => {
                    match request {
                        Some(request) => self.handle(request),
                        None => break,
                    }
                }

                chunk = self.feeder.next_chunk(), if want_bytes => {
                    match chunk {
                        Some(Ok((data, offset))) => {
                            trace!(offset, len = data.len(), "Appending bytes");
                            self.parser.append_bytes(data, offset);
                        }
                        Some(Err(e)) => {
                            self.parser.handler_mut().fail(Error::from(e));
                        }
                        None => {
                            debug!(bytes = self.feeder.offset(), "Byte source exhausted");
                            self.parser.flush();
                        }
                    }
                }
            }

            self.settle();
        }

        debug!("Demuxer closed");
    }

    fn extraction_options(&self) -> ExtractionOptions {
        ExtractionOptions {
            batch_size: self.options.extraction_batch.max(1),
        }
    }

    fn handle(&mut self, request: DemuxRequest) {
        match request {
            DemuxRequest::Initialize { selector, reply } => self.initialize(selector, reply),
            DemuxRequest::DecoderConfig { reply } => {
                let config = match self.parser.handler().track() {
                    Some(track) => DecoderConfig::for_track(track),
                    None => Err(Error::InvalidState("no track selected".into())),
                };
                let _ = reply.send(config);
            }
            DemuxRequest::Pull { reply } => self.pull(reply),
            DemuxRequest::Seek { time, reply } => self.seek(time, reply),
            DemuxRequest::Duration { reply } => {
                let duration = self.parser.handler().movie.as_ref().map(|m| m.duration());
                let _ = reply.send(duration);
            }
        }
    }

    fn initialize(&mut self, selector: TrackSelector, reply: InitReply) {
        let state = self.parser.handler();
        if state.track.is_some() || self.pending_init.is_some() {
            let _ = reply.send(Err(Error::InvalidState(
                "a track is already selected".into(),
            )));
            return;
        }
        if let Some(error) = &state.error {
            let _ = reply.send(Err(error.clone()));
            return;
        }

        if state.movie.is_some() {
            self.select_track(selector, reply);
        } else {
            debug!(%selector, "Waiting for track list");
            self.pending_init = Some((selector, reply));
        }
    }

    fn select_track(&mut self, selector: TrackSelector, reply: InitReply) {
        let options = self.extraction_options();
        let result = self.parser.handler_mut().select(selector).and_then(|track| {
            self.parser
                .set_extraction_options(track.track_id, options)
                .map_err(Error::from)?;
            Ok(track)
        });

        if let Ok(track) = &result {
            info!(
                track_id = track.track_id,
                codec = %track.codec,
                samples = track.sample_count,
                "Track selected"
            );
        }
        let _ = reply.send(result);
    }

    fn pull(&mut self, reply: oneshot::Sender<Result<PullReply>>) {
        let state = self.parser.handler_mut();
        if let Some(waiter) = &state.waiter {
            assert!(
                waiter.is_closed(),
                "concurrent sample pulls on one demuxer"
            );
        }
        if state.track.is_none() {
            let _ = reply.send(Err(Error::InvalidState(
                "sample pulled before a track was selected".into(),
            )));
            return;
        }
        state.waiter = Some(reply);
    }

    fn seek(&mut self, time: Duration, reply: oneshot::Sender<Result<SeekOutcome>>) {
        let state = self.parser.handler_mut();
        if let Some(error) = &state.error {
            let _ = reply.send(Err(error.clone()));
            return;
        }
        let Some(track_id) = state.track.as_ref().map(|t| t.track_id) else {
            let _ = reply.send(Err(Error::InvalidState(
                "seek before a track was selected".into(),
            )));
            return;
        };

        state.seek.begin(time, reply);
        let discarded = state.buffer.clear();
        if discarded > 0 {
            debug!(discarded, "Discarded buffered samples for seek");
        }
        if let Some(waiter) = state.waiter.take() {
            let _ = waiter.send(Ok(PullReply::Interrupted));
        }
        state.end_of_track = false;
        state.extracting = false;

        self.parser.stop();
        self.parser
            .seek(time, self.options.seek_policy.use_sync());

        let options = self.extraction_options();
        if let Err(e) = self.parser.set_extraction_options(track_id, options) {
            self.parser.handler_mut().fail(e.into());
        }
    }

    /// Resolve whatever the last event made resolvable.
    fn settle(&mut self) {
        if let Some((selector, reply)) = self.pending_init.take() {
            let state = self.parser.handler();
            if let Some(error) = &state.error {
                let _ = reply.send(Err(error.clone()));
            } else if state.movie.is_some() {
                self.select_track(selector, reply);
            } else {
                self.pending_init = Some((selector, reply));
            }
        }

        let state = self.parser.handler_mut();
        if let Some(error) = state.error.clone() {
            state.seek.fail(&error);
        }

        self.pump();
    }

    /// Answer the pending pull from the buffer, starting extraction if empty.
    fn pump(&mut self) {
        let mut resumed = false;
        loop {
            let state = self.parser.handler_mut();
            let Some(waiter) = state.waiter.take() else {
                return;
            };
            if waiter.is_closed() {
                trace!("Pull abandoned by caller");
                return;
            }
            if let Some(error) = &state.error {
                let _ = waiter.send(Err(error.clone()));
                return;
            }
            if state.seek.is_seeking() {
                state.waiter = Some(waiter);
                return;
            }

            if let Some(sample) = state.buffer.pop() {
                if let Err(Ok(PullReply::Sample(sample))) =
                    waiter.send(Ok(PullReply::Sample(sample)))
                {
                    state.buffer.push_front(sample);
                }
                self.resume_below_low_water();
                return;
            }

            if state.end_of_track {
                let _ = waiter.send(Ok(PullReply::EndOfStream));
                return;
            }

            state.waiter = Some(waiter);
            if resumed {
                return;
            }
            self.resume();
            resumed = true;
        }
    }

    fn resume(&mut self) {
        let state = self.parser.handler_mut();
        if state.extracting || state.end_of_track {
            return;
        }
        state.extracting = true;
        debug!(buffered = state.buffer.len(), "Resuming extraction");
        self.parser.start();
    }

    /// Restart a paused parser once half of the buffer has been consumed.
    fn resume_below_low_water(&mut self) {
        let state = self.parser.handler();
        if state.buffer.len() <= state.buffer.target() / 2 {
            self.resume();
        }
    }
}
