//! Presentation targets for decoded frames.

use framepull_pipeline::{DecodedFrame, Presenter};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Where painted frames go.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PresentationTarget {
    /// Log each painted frame.
    #[default]
    Log,
    /// Count frames and release them.
    Discard,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PresenterStats {
    pub painted: u64,
    pub bytes: u64,
    pub first_timestamp_us: Option<i64>,
    pub last_timestamp_us: Option<i64>,
}

impl PresenterStats {
    fn record(&mut self, frame: &DecodedFrame) {
        self.painted += 1;
        self.bytes += frame.data().len() as u64;
        self.first_timestamp_us.get_or_insert(frame.timestamp_us());
        self.last_timestamp_us = Some(frame.timestamp_us());
    }
}

/// Shared view of what a presenter has painted.
pub type SharedStats = Arc<Mutex<PresenterStats>>;

pub struct FramePresenter {
    target: PresentationTarget,
    stats: SharedStats,
}

impl FramePresenter {
    pub fn new(target: PresentationTarget) -> Self {
        Self {
            target,
            stats: Arc::new(Mutex::new(PresenterStats::default())),
        }
    }

    pub fn stats(&self) -> SharedStats {
        self.stats.clone()
    }
}

impl Presenter for FramePresenter {
    fn paint(&mut self, frame: DecodedFrame) {
        if self.target == PresentationTarget::Log {
            tracing::info!(
                timestamp_us = frame.timestamp_us(),
                width = frame.width(),
                height = frame.height(),
                bytes = frame.data().len(),
                "Painted frame"
            );
        }
        self.stats.lock().record(&frame);
        frame.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use framepull_pipeline::FrameLedger;

    #[test]
    fn test_paint_records_and_releases() {
        let ledger = Arc::new(FrameLedger::default());
        let mut presenter = FramePresenter::new(PresentationTarget::Discard);
        let stats = presenter.stats();

        for ts in [0, 40_000] {
            presenter.paint(DecodedFrame::new(
                ts,
                40_000,
                (16, 16),
                Bytes::from_static(b"abcd"),
                ledger.clone(),
            ));
        }

        let stats = stats.lock().clone();
        assert_eq!(stats.painted, 2);
        assert_eq!(stats.bytes, 8);
        assert_eq!(stats.first_timestamp_us, Some(0));
        assert_eq!(stats.last_timestamp_us, Some(40_000));
        assert_eq!(ledger.live(), 0);
        assert_eq!(ledger.leaked(), 0);
    }
}
