//! Decode submission and clock-driven frame selection.
//!
//! The scheduler sits between the demuxer and the presenter. Chunks are
//! submitted while both the frame window and the decoder queue have room;
//! decoded frames are collected into the [`FrameWindow`]; on each render
//! tick the frame nearest the playback clock is handed to the [`Presenter`].

use std::time::Duration;

use framepull_media::SeekPosition;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};

use crate::adapter::{ContainerAdapter, PullReply};
use crate::chunk::ChunkFactory;
use crate::decoder::{DecodeSink, DecodedFrame, DecoderConfig, DecoderOutput};
use crate::frame_window::FrameWindow;
use crate::options::SchedulerOptions;
use crate::{Error, Result};

/// Receives frames chosen for display.
///
/// Takes ownership of the frame and must release it once painted.
pub trait Presenter {
    fn paint(&mut self, frame: DecodedFrame);
}

impl<P: Presenter + ?Sized> Presenter for Box<P> {
    fn paint(&mut self, frame: DecodedFrame) {
        (**self).paint(frame);
    }
}

/// Result of handing one pulled sample to the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Submitted,
    /// Malformed sample, logged and dropped.
    Skipped,
    /// The pull was cut short by a seek; pull again after it completes.
    Interrupted,
    EndOfStream,
}

/// Why [`FrameScheduler::submit_for_decode`] stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillOutcome {
    /// Window or decoder queue is full.
    Saturated,
    Interrupted,
    EndOfStream,
}

/// Result of a render tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    /// A new frame with this timestamp was painted.
    Painted(i64),
    /// The frame on screen is still the best match.
    Held,
    NoFrame,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SchedulerStats {
    pub submitted: u64,
    pub skipped: u64,
    pub decoded: u64,
    pub painted: u64,
    pub dropped: u64,
    pub empty_ticks: u64,
}

pub struct FrameScheduler<D> {
    decoder: D,
    outputs: mpsc::UnboundedReceiver<DecoderOutput>,
    window: FrameWindow,
    chunks: ChunkFactory,
    options: SchedulerOptions,
    config: Option<DecoderConfig>,
    /// Timestamp of the frame last handed to the presenter.
    on_screen: Option<i64>,
    end_of_stream: bool,
    failed: Option<Error>,
    stats: SchedulerStats,
}

impl<D: DecodeSink> FrameScheduler<D> {
    /// `outputs` must be the receiving end of the channel `decoder` emits on.
    pub fn new(
        decoder: D,
        outputs: mpsc::UnboundedReceiver<DecoderOutput>,
        options: SchedulerOptions,
    ) -> Self {
        Self {
            decoder,
            outputs,
            window: FrameWindow::new(options.frame_window_depth),
            chunks: ChunkFactory::new(options.timestamp_mode),
            options,
            config: None,
            on_screen: None,
            end_of_stream: false,
            failed: None,
            stats: SchedulerStats::default(),
        }
    }

    pub fn configure(&mut self, config: DecoderConfig) -> Result<()> {
        if !self.decoder.is_config_supported(&config) {
            return Err(self.fail(Error::config(format!(
                "unsupported codec {}",
                config.codec
            ))));
        }
        if let Err(e) = self.decoder.configure(&config) {
            return Err(self.fail(e));
        }
        info!(
            codec = %config.codec,
            width = ?config.coded_width,
            height = ?config.coded_height,
            "Decoder configured"
        );
        self.config = Some(config);
        Ok(())
    }

    fn fail(&mut self, error: Error) -> Error {
        if self.failed.is_none() {
            error!(error = %error, "Decode session failed");
            self.failed = Some(error.clone());
        }
        error
    }

    /// Whether another chunk should be pulled and submitted now.
    pub fn wants_chunk(&self) -> bool {
        self.failed.is_none()
            && self.config.is_some()
            && !self.end_of_stream
            && self.window.has_capacity()
            && self.decoder.decode_queue_size() < self.options.decode_queue_depth
    }

    /// Convert a pulled sample and hand it to the decoder.
    pub fn submit(&mut self, reply: PullReply) -> Result<SubmitOutcome> {
        if let Some(error) = &self.failed {
            return Err(error.clone());
        }

        let sample = match reply {
            PullReply::Sample(sample) => sample,
            PullReply::Interrupted => return Ok(SubmitOutcome::Interrupted),
            PullReply::EndOfStream => {
                if !self.end_of_stream {
                    debug!(submitted = self.stats.submitted, "No more chunks");
                }
                self.end_of_stream = true;
                return Ok(SubmitOutcome::EndOfStream);
            }
        };

        let chunk = match self.chunks.chunk(&sample) {
            Ok(chunk) => chunk,
            Err(e) if !e.is_fatal() => {
                warn!(error = %e, "Skipping malformed sample");
                self.stats.skipped += 1;
                return Ok(SubmitOutcome::Skipped);
            }
            Err(e) => return Err(self.fail(e)),
        };

        trace!(
            timestamp_us = chunk.timestamp_us,
            key = chunk.is_key(),
            queue = self.decoder.decode_queue_size(),
            "Submitting chunk"
        );
        if let Err(e) = self.decoder.decode(chunk) {
            return Err(self.fail(e));
        }
        self.stats.submitted += 1;
        Ok(SubmitOutcome::Submitted)
    }

    /// Pull and submit chunks until either bound is reached.
    ///
    /// Call again after a decoder output or a render tick frees room.
    pub async fn submit_for_decode(&mut self, adapter: &ContainerAdapter) -> Result<FillOutcome> {
        loop {
            self.drain_outputs()?;
            if let Some(error) = &self.failed {
                return Err(error.clone());
            }
            if self.end_of_stream {
                return Ok(FillOutcome::EndOfStream);
            }
            if !self.wants_chunk() {
                return Ok(FillOutcome::Saturated);
            }

            let reply = match adapter.next_sample().await {
                Ok(reply) => reply,
                Err(e) => return Err(self.fail(e)),
            };
            match self.submit(reply)? {
                SubmitOutcome::Submitted | SubmitOutcome::Skipped => continue,
                SubmitOutcome::Interrupted => return Ok(FillOutcome::Interrupted),
                SubmitOutcome::EndOfStream => return Ok(FillOutcome::EndOfStream),
            }
        }
    }

    /// Take one decoder output. A decode error ends the session.
    pub fn accept(&mut self, output: DecoderOutput) -> Result<()> {
        match output {
            DecoderOutput::Frame(frame) => {
                if self.failed.is_some() {
                    frame.release();
                    return Ok(());
                }
                trace!(timestamp_us = frame.timestamp_us(), "Frame decoded");
                self.stats.decoded += 1;
                self.window.insert(frame);
                Ok(())
            }
            DecoderOutput::Error(message) => Err(self.fail(Error::Decode(message))),
        }
    }

    /// Accept every output that is already waiting.
    pub fn drain_outputs(&mut self) -> Result<()> {
        while let Ok(output) = self.outputs.try_recv() {
            self.accept(output)?;
        }
        Ok(())
    }

    /// Wait for the next decoder output.
    pub async fn next_output(&mut self) -> Option<DecoderOutput> {
        self.outputs.recv().await
    }

    /// Present the frame nearest `clock_us`, unless the one on screen is nearer.
    pub fn render<P>(&mut self, clock_us: i64, presenter: &mut P) -> RenderOutcome
    where
        P: Presenter + ?Sized,
    {
        let Some(chosen) = self.window.choose(clock_us) else {
            trace!(clock_us, "No frame available");
            self.stats.empty_ticks += 1;
            return RenderOutcome::NoFrame;
        };

        let timestamp_us = chosen.timestamp_us();
        let newer_is_closer = match self.on_screen {
            None => true,
            Some(current) => (clock_us - timestamp_us).abs() < (clock_us - current).abs(),
        };
        if !newer_is_closer {
            return RenderOutcome::Held;
        }

        match self.window.take_front() {
            Some(frame) => {
                self.on_screen = Some(timestamp_us);
                self.stats.painted += 1;
                presenter.paint(frame);
                RenderOutcome::Painted(timestamp_us)
            }
            None => RenderOutcome::NoFrame,
        }
    }

    /// Drop everything in flight ahead of a seek.
    ///
    /// The decoder is reset and reconfigured, queued outputs and windowed
    /// frames are released.
    pub fn flush_for_seek(&mut self) -> Result<()> {
        self.close();
        self.on_screen = None;
        self.end_of_stream = false;

        if let Some(config) = self.config.clone() {
            if let Err(e) = self.decoder.configure(&config) {
                return Err(self.fail(e));
            }
        }
        Ok(())
    }

    /// Reset the decoder and release every frame held or queued.
    pub fn close(&mut self) {
        self.decoder.reset();

        let mut discarded = 0;
        while let Ok(output) = self.outputs.try_recv() {
            if let DecoderOutput::Frame(frame) = output {
                frame.release();
            }
            discarded += 1;
        }
        discarded += self.window.clear();
        debug!(discarded, "Released in-flight frames");
    }

    /// Apply the position a seek landed on to chunk timestamps.
    pub fn on_seek(&mut self, requested: Duration, position: &SeekPosition) {
        self.chunks.on_seek(requested, position);
    }

    pub fn is_end_of_stream(&self) -> bool {
        self.end_of_stream
    }

    /// End of stream reached and every decoded frame consumed.
    pub fn is_drained(&self) -> bool {
        self.end_of_stream
            && self.window.is_empty()
            && self.outputs.is_empty()
            && self.decoder.decode_queue_size() == 0
    }

    pub fn error(&self) -> Option<&Error> {
        self.failed.as_ref()
    }

    pub fn frames_buffered(&self) -> usize {
        self.window.len()
    }

    pub fn decoder(&self) -> &D {
        &self.decoder
    }

    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            dropped: self.window.dropped(),
            ..self.stats
        }
    }
}
