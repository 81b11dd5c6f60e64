//! Playback worker.
//!
//! The worker is a single task that owns everything for one playback
//! session. It is driven by [`WorkerCommand`]s and answers with
//! [`WorkerReply`]s; in between it keeps the decoder fed, collects decoded
//! frames and paints the frame matching the clock on every render tick.

mod protocol;
mod session;

pub use protocol::{WorkerCommand, WorkerReply};
pub use session::PlaybackReport;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::Config;
use session::Worker;

/// Controller side of a running worker.
pub struct WorkerHandle {
    commands: mpsc::UnboundedSender<WorkerCommand>,
    replies: mpsc::UnboundedReceiver<WorkerReply>,
    task: JoinHandle<Option<PlaybackReport>>,
}

/// Start a worker on the current runtime.
pub fn spawn(config: Config) -> WorkerHandle {
    let (commands_tx, commands_rx) = mpsc::unbounded_channel();
    let (replies_tx, replies_rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(Worker::new(config, replies_tx).run(commands_rx));

    WorkerHandle {
        commands: commands_tx,
        replies: replies_rx,
        task,
    }
}

impl WorkerHandle {
    pub fn send(&self, command: WorkerCommand) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| anyhow::anyhow!("Worker has stopped"))
    }

    /// Next reply, or `None` once the worker has stopped.
    pub async fn recv(&mut self) -> Option<WorkerReply> {
        self.replies.recv().await
    }

    /// Wait for a reply matching `want`, failing on an error reply.
    ///
    /// Replies that match neither are skipped.
    pub async fn expect<F>(&mut self, want: F) -> Result<WorkerReply>
    where
        F: Fn(&WorkerReply) -> bool,
    {
        loop {
            match self.recv().await {
                Some(WorkerReply::Error { message }) => anyhow::bail!(message),
                Some(reply) if want(&reply) => return Ok(reply),
                Some(reply) => tracing::debug!("Skipping reply {:?}", reply),
                None => anyhow::bail!("Worker stopped before replying"),
            }
        }
    }

    /// Stop the worker and collect the report of its last session.
    pub async fn shutdown(self) -> Result<Option<PlaybackReport>> {
        let Self { commands, task, .. } = self;
        drop(commands);
        task.await.context("Worker task panicked")
    }
}
