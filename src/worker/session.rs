use std::time::Duration;

use framepull_pipeline::{
    ContainerAdapter, DecoderOutput, FrameScheduler, PassthroughDecoder, PlaybackClock, PullReply,
    SeekOutcome,
};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval, Instant, MissedTickBehavior};

use super::protocol::{WorkerCommand, WorkerReply};
use crate::config::Config;
use crate::presenter::{FramePresenter, PresentationTarget, PresenterStats, SharedStats};
use crate::source::SourceLocator;

type PipelineResult<T> = framepull_pipeline::Result<T>;
type PendingPull = oneshot::Receiver<PipelineResult<PullReply>>;

/// Counters from a finished session.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PlaybackReport {
    pub scheduler: framepull_pipeline::SchedulerStats,
    pub presenter: PresenterStats,
    /// Frames dropped without an explicit release. Non-zero is a bug.
    pub frames_leaked: usize,
}

/// One opened source: demuxer handle, decode scheduler, clock and presenter.
struct Session {
    adapter: ContainerAdapter,
    scheduler: FrameScheduler<PassthroughDecoder>,
    clock: PlaybackClock,
    presenter: FramePresenter,
    presented: SharedStats,
    pending_pull: Option<PendingPull>,
    end_reported: bool,
}

impl Session {
    async fn open(
        config: &Config,
        source: &str,
        target: PresentationTarget,
    ) -> anyhow::Result<(Self, WorkerReply)> {
        let locator: SourceLocator = source.parse()?;
        let feeder = locator.open(config.demux.read_chunk_size).await?;
        let adapter = ContainerAdapter::open(feeder, config.demux_options());

        let track = adapter.initialize(config.playback.track).await?;
        let decoder_config = adapter.decoder_config().await?;
        let duration = adapter.duration().await?.unwrap_or_default();

        let (outputs_tx, outputs_rx) = mpsc::unbounded_channel();
        let decoder =
            PassthroughDecoder::new(outputs_tx).with_latency(config.playback.decode_latency());
        let mut scheduler = FrameScheduler::new(decoder, outputs_rx, config.scheduler_options());
        scheduler.configure(decoder_config.clone())?;

        let presenter = FramePresenter::new(target);
        let presented = presenter.stats();

        tracing::info!(
            "Session opened: {} track {} ({}), {:.3}s",
            locator,
            track.track_id,
            decoder_config.codec,
            duration.as_secs_f64()
        );

        let reply = WorkerReply::InitializeDone {
            codec: decoder_config.codec,
            width: track.width.or(decoder_config.coded_width),
            height: track.height.or(decoder_config.coded_height),
            sample_rate: decoder_config.sample_rate,
            channels: decoder_config.channel_count,
            duration_secs: duration.as_secs_f64(),
        };

        let session = Self {
            adapter,
            scheduler,
            clock: PlaybackClock::new(),
            presenter,
            presented,
            pending_pull: None,
            end_reported: false,
        };
        Ok((session, reply))
    }

    /// Issue a pull if the scheduler has room and none is outstanding.
    fn request_if_needed(&mut self) -> PipelineResult<()> {
        if self.pending_pull.is_none() && self.scheduler.wants_chunk() {
            self.pending_pull = Some(self.adapter.request_sample()?);
        }
        Ok(())
    }

    fn on_pulled(&mut self, reply: PipelineResult<PullReply>) -> PipelineResult<()> {
        self.pending_pull = None;
        // Interrupted pulls are simply re-issued on the next turn
        self.scheduler.submit(reply?)?;
        Ok(())
    }

    /// Render one tick. Returns true the first time the stream is fully presented.
    fn render(&mut self) -> PipelineResult<bool> {
        self.scheduler.drain_outputs()?;
        let clock_us = self.clock.media_time_us();
        self.scheduler.render(clock_us, &mut self.presenter);

        if !self.end_reported && self.scheduler.is_drained() {
            self.end_reported = true;
            return Ok(true);
        }
        Ok(false)
    }

    async fn seek(&mut self, time: Duration) -> PipelineResult<WorkerReply> {
        // A reply already in flight belongs to the old position
        self.pending_pull = None;
        self.clock.seek(time, Instant::now());

        match self.adapter.seek(time).await? {
            SeekOutcome::Completed {
                requested,
                position,
            } => {
                self.scheduler.flush_for_seek()?;
                self.scheduler.on_seek(requested, &position);
                self.end_reported = false;
                Ok(WorkerReply::SeekDone {
                    requested_secs: requested.as_secs_f64(),
                    position_secs: position.time.as_secs_f64(),
                })
            }
            SeekOutcome::Superseded => Err(framepull_pipeline::Error::InvalidState(
                "seek superseded by a later request".into(),
            )),
        }
    }

    fn close(mut self) -> PlaybackReport {
        self.scheduler.close();
        PlaybackReport {
            scheduler: self.scheduler.stats(),
            presenter: self.presented.lock().clone(),
            frames_leaked: self.scheduler.decoder().ledger().leaked(),
        }
    }
}

async fn next_pull(pending: &mut Option<PendingPull>) -> PipelineResult<PullReply> {
    match pending {
        Some(rx) => rx
            .await
            .unwrap_or(Err(framepull_pipeline::Error::Closed)),
        None => std::future::pending().await,
    }
}

enum Event {
    Command(Option<WorkerCommand>),
    Pulled(PipelineResult<PullReply>),
    Output(Option<DecoderOutput>),
    Render,
    Refill,
    Failed(framepull_pipeline::Error),
}

/// Owns the current session and serves [`WorkerCommand`]s.
pub(crate) struct Worker {
    config: Config,
    replies: mpsc::UnboundedSender<WorkerReply>,
    session: Option<Session>,
    last_report: Option<PlaybackReport>,
}

impl Worker {
    pub fn new(config: Config, replies: mpsc::UnboundedSender<WorkerReply>) -> Self {
        Self {
            config,
            replies,
            session: None,
            last_report: None,
        }
    }

    pub async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<WorkerCommand>,
    ) -> Option<PlaybackReport> {
        let mut render = interval(self.config.scheduler.render_interval());
        render.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut refill = interval(self.config.scheduler.refill_interval());
        refill.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            let event = match self.session.as_mut() {
                None => Event::Command(commands.recv().await),
                Some(session) => match session.request_if_needed() {
                    Err(e) => Event::Failed(e),
                    Ok(()) => tokio::select! {
                        biased;

                        command = commands.recv() => Event::Command(command),
                        reply = next_pull(&mut session.pending_pull) => Event::Pulled(reply),
                        output = session.scheduler.next_output() => Event::Output(output),
                        _ = render.tick() => Event::Render,
                        _ = refill.tick() => Event::Refill,
                    },
                },
            };

            match event {
                Event::Command(None) => break,
                Event::Command(Some(command)) => self.handle(command).await,
                Event::Pulled(reply) => {
                    if let Some(session) = self.session.as_mut() {
                        let result = session.on_pulled(reply);
                        self.check(result);
                    }
                }
                Event::Output(Some(output)) => {
                    if let Some(session) = self.session.as_mut() {
                        let result = session.scheduler.accept(output);
                        self.check(result);
                    }
                }
                Event::Output(None) | Event::Refill => {}
                Event::Render => {
                    if let Some(session) = self.session.as_mut() {
                        match session.render() {
                            Ok(true) => {
                                tracing::info!("Playback reached end of stream");
                                self.reply(WorkerReply::EndOfStream);
                            }
                            Ok(false) => {}
                            Err(e) => self.check(Err(e)),
                        }
                    }
                }
                Event::Failed(e) => self.check(Err(e)),
            }
        }

        self.teardown();
        self.last_report
    }

    async fn handle(&mut self, command: WorkerCommand) {
        tracing::debug!("Worker command: {:?}", command);

        if let WorkerCommand::Initialize { source, target } = command {
            self.teardown();
            match Session::open(&self.config, &source, target).await {
                Ok((session, reply)) => {
                    self.session = Some(session);
                    self.reply(reply);
                }
                Err(e) => {
                    tracing::error!("Failed to initialize {}: {:#}", source, e);
                    self.reply(WorkerReply::Error {
                        message: format!("{:#}", e),
                    });
                }
            }
            return;
        }

        let Some(session) = self.session.as_mut() else {
            self.reply(WorkerReply::Error {
                message: "no source initialized".into(),
            });
            return;
        };

        let now = Instant::now();
        match command {
            WorkerCommand::Initialize { .. } => {}
            WorkerCommand::Play { media_time_secs } => {
                if let Some(secs) = media_time_secs {
                    session.clock.update(secs, now);
                }
                session.clock.play(now);
                tracing::info!("Playing from {:.3}s", session.clock.media_time().as_secs_f64());
            }
            WorkerCommand::Pause => {
                session.clock.pause(now);
                tracing::info!("Paused at {:.3}s", session.clock.media_time().as_secs_f64());
            }
            WorkerCommand::Seek { time_secs } => {
                let Ok(time) = Duration::try_from_secs_f64(time_secs) else {
                    self.reply(WorkerReply::Error {
                        message: format!("invalid seek time {}", time_secs),
                    });
                    return;
                };
                let result = session.seek(time).await;
                match result {
                    Ok(reply) => self.reply(reply),
                    Err(e) => self.check(Err(e)),
                }
            }
            WorkerCommand::UpdateClock {
                media_time_secs,
                captured_at,
            } => {
                session
                    .clock
                    .update(media_time_secs, captured_at.unwrap_or(now));
            }
        }
    }

    /// Report an error; fatal ones end the session.
    fn check(&mut self, result: PipelineResult<()>) {
        let Err(e) = result else { return };

        self.reply(WorkerReply::Error {
            message: e.to_string(),
        });
        if e.is_fatal() {
            tracing::error!("Session failed: {}", e);
            self.teardown();
        } else {
            tracing::warn!("{}", e);
        }
    }

    fn teardown(&mut self) {
        if let Some(session) = self.session.take() {
            let report = session.close();
            tracing::info!(
                submitted = report.scheduler.submitted,
                painted = report.scheduler.painted,
                dropped = report.scheduler.dropped,
                leaked = report.frames_leaked,
                "Session closed"
            );
            self.last_report = Some(report);
        }
    }

    fn reply(&self, reply: WorkerReply) {
        if self.replies.send(reply).is_err() {
            tracing::debug!("Reply dropped, controller has gone away");
        }
    }
}
