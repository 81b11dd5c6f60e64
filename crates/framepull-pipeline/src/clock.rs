//! Media clock that advances with wall time while playing.

use std::time::Duration;

use tokio::time::Instant;

/// Media time anchored at a wall-clock instant.
///
/// While playing, media time is `anchor_media + (now - anchor_instant)`.
/// While paused it stays at `anchor_media`.
#[derive(Debug, Clone)]
pub struct PlaybackClock {
    anchor_media: Duration,
    anchor_instant: Instant,
    playing: bool,
}

impl Default for PlaybackClock {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackClock {
    pub fn new() -> Self {
        Self {
            anchor_media: Duration::ZERO,
            anchor_instant: Instant::now(),
            playing: false,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn play(&mut self, now: Instant) {
        if self.playing {
            return;
        }
        self.anchor_instant = now;
        self.playing = true;
    }

    pub fn pause(&mut self, now: Instant) {
        if !self.playing {
            return;
        }
        self.anchor_media = self.media_time_at(now);
        self.anchor_instant = now;
        self.playing = false;
    }

    /// Jump to `media_time`, keeping the play/pause state.
    pub fn seek(&mut self, media_time: Duration, now: Instant) {
        self.anchor_media = media_time;
        self.anchor_instant = now;
    }

    /// Re-anchor from an external clock reading.
    ///
    /// `captured_at` is when the reading was taken, so any delay before it
    /// reaches us is accounted for. Negative or non-finite readings clamp to zero,
    /// readings too large for a `Duration` clamp to `Duration::MAX`.
    pub fn update(&mut self, media_time_secs: f64, captured_at: Instant) {
        let secs = if media_time_secs.is_finite() {
            media_time_secs.max(0.0)
        } else {
            0.0
        };
        self.anchor_media = Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX);
        self.anchor_instant = captured_at;
    }

    pub fn media_time_at(&self, now: Instant) -> Duration {
        if self.playing {
            self.anchor_media
                .saturating_add(now.saturating_duration_since(self.anchor_instant))
        } else {
            self.anchor_media
        }
    }

    pub fn media_time(&self) -> Duration {
        self.media_time_at(Instant::now())
    }

    pub fn media_time_us(&self) -> i64 {
        i64::try_from(self.media_time().as_micros()).unwrap_or(i64::MAX)
    }
}
