//! Decoded frames waiting to be presented.

use std::collections::VecDeque;

use tracing::{debug, warn};

use crate::decoder::DecodedFrame;

/// Small ordered set of decoded frames, earliest first.
///
/// Frames are owned here until they are either taken for painting or
/// released as stale. Insertion keeps timestamp order even if a decoder
/// emits out of order.
#[derive(Debug)]
pub struct FrameWindow {
    frames: VecDeque<DecodedFrame>,
    depth: usize,
    dropped: u64,
}

impl FrameWindow {
    pub fn new(depth: usize) -> Self {
        let depth = depth.max(1);
        Self {
            frames: VecDeque::with_capacity(depth + 1),
            depth,
            dropped: 0,
        }
    }

    /// Add a frame. A frame whose timestamp is already held is released.
    pub fn insert(&mut self, frame: DecodedFrame) {
        let ts = frame.timestamp_us();
        let pos = self.frames.partition_point(|f| f.timestamp_us() < ts);

        if self
            .frames
            .get(pos)
            .is_some_and(|f| f.timestamp_us() == ts)
        {
            warn!(timestamp_us = ts, "Duplicate decoded frame, releasing");
            frame.release();
            return;
        }
        self.frames.insert(pos, frame);
    }

    /// Pick the frame closest to `clock_us`.
    ///
    /// Frames ahead of the chosen one are stale and released. The scan stops
    /// at the first frame that is not strictly closer than its predecessor,
    /// so on a tie the earlier frame wins.
    pub fn choose(&mut self, clock_us: i64) -> Option<&DecodedFrame> {
        let first = self.frames.front()?;

        let mut best = 0;
        let mut best_delta = (clock_us - first.timestamp_us()).abs();
        for (i, frame) in self.frames.iter().enumerate().skip(1) {
            let delta = (clock_us - frame.timestamp_us()).abs();
            if delta < best_delta {
                best = i;
                best_delta = delta;
            } else {
                break;
            }
        }

        if best > 0 {
            debug!(count = best, clock_us, "Dropping stale frames");
            for frame in self.frames.drain(..best) {
                frame.release();
            }
            self.dropped += best as u64;
        }

        self.frames.front()
    }

    pub fn front(&self) -> Option<&DecodedFrame> {
        self.frames.front()
    }

    /// Remove the earliest frame, handing ownership to the caller.
    pub fn take_front(&mut self) -> Option<DecodedFrame> {
        self.frames.pop_front()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// True while fewer than `depth` frames are held.
    pub fn has_capacity(&self) -> bool {
        self.frames.len() < self.depth
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Frames released as stale by [`FrameWindow::choose`].
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Release everything. Returns how many frames were held.
    pub fn clear(&mut self) -> usize {
        let n = self.frames.len();
        for frame in self.frames.drain(..) {
            frame.release();
        }
        n
    }
}

impl Drop for FrameWindow {
    fn drop(&mut self) {
        self.clear();
    }
}
