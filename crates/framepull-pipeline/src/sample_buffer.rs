//! Bounded queue between parser callbacks and sample pulls.

use std::collections::VecDeque;

use framepull_media::Sample;
use tracing::debug;

/// Ordered samples for the selected track, waiting to be pulled.
///
/// The target is soft: a batch is always accepted whole, and the producer
/// is told to pause once the target is reached. The queue therefore never
/// exceeds the target by more than one batch.
#[derive(Debug)]
pub struct SampleBuffer {
    samples: VecDeque<Sample>,
    target: usize,
    peak: usize,
}

impl SampleBuffer {
    pub fn new(target: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(target),
            target: target.max(1),
            peak: 0,
        }
    }

    /// Enqueue a batch. Returns `true` when the producer should pause.
    pub fn push_batch(&mut self, batch: Vec<Sample>) -> bool {
        self.samples.extend(batch);
        self.peak = self.peak.max(self.samples.len());

        let full = self.is_full();
        if full {
            debug!(
                buffered = self.samples.len(),
                target = self.target,
                "Sample buffer full, pausing extraction"
            );
        }
        full
    }

    pub fn pop(&mut self) -> Option<Sample> {
        self.samples.pop_front()
    }

    /// Return a sample that could not be handed out.
    pub fn push_front(&mut self, sample: Sample) {
        self.samples.push_front(sample);
    }

    /// Drop everything. Returns how many samples were discarded.
    pub fn clear(&mut self) -> usize {
        let n = self.samples.len();
        self.samples.clear();
        n
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.samples.len() >= self.target
    }

    pub fn target(&self) -> usize {
        self.target
    }

    /// Largest depth seen so far.
    pub fn peak(&self) -> usize {
        self.peak
    }
}
