//! MP4 container parsing.
//!
//! Box headers, the moov tree, sample tables, codec strings and decoder
//! descriptions. The incremental front end lives in [`crate::parser`].

mod atoms;
mod codec;
mod description;
mod reader;
mod sample_table;

pub use atoms::{Atom, AtomType, HandlerType, Track};
pub use codec::{codec_string, decoder_codec};
pub use description::{audio_specific_config, parse_esds, strip_box_header, EsdsConfig};
pub use reader::{MoovReader, ParsedMovie, MAX_MOOV_SIZE};
pub use sample_table::{SampleEntry, SampleTable, SampleTableBuilder};

use std::time::Duration;

/// Movie-level metadata, available once the moov box has been parsed.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct MovieInfo {
    /// Duration in movie timescale units.
    pub duration: u64,
    /// Movie timescale (time units per second).
    pub timescale: u32,
    /// All tracks, in moov order.
    pub tracks: Vec<Track>,
}

impl MovieInfo {
    /// Get the duration in seconds.
    pub fn duration_secs(&self) -> f64 {
        if self.timescale == 0 {
            0.0
        } else {
            self.duration as f64 / self.timescale as f64
        }
    }

    /// Movie duration. Falls back to the longest track when mvhd is empty.
    pub fn duration(&self) -> Duration {
        let movie = ticks_to_duration(self.duration, self.timescale);
        if !movie.is_zero() {
            return movie;
        }
        self.tracks
            .iter()
            .map(|t| ticks_to_duration(t.duration, t.timescale))
            .max()
            .unwrap_or_default()
    }

    /// First video track.
    pub fn video_track(&self) -> Option<&Track> {
        self.tracks.iter().find(|t| t.handler_type.is_video())
    }

    /// First audio track.
    pub fn audio_track(&self) -> Option<&Track> {
        self.tracks.iter().find(|t| t.handler_type.is_audio())
    }

    /// Track by ID.
    pub fn track(&self, track_id: u32) -> Option<&Track> {
        self.tracks.iter().find(|t| t.track_id == track_id)
    }
}

fn ticks_to_duration(ticks: u64, timescale: u32) -> Duration {
    if timescale == 0 {
        return Duration::ZERO;
    }
    Duration::from_nanos((ticks as u128 * 1_000_000_000 / timescale as u128) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(id: u32, handler: HandlerType, duration: u64) -> Track {
        Track {
            handler_type: handler,
            duration,
            timescale: 1000,
            ..Track::new(id)
        }
    }

    #[test]
    fn test_movie_duration() {
        let movie = MovieInfo {
            duration: 120000,
            timescale: 1000,
            tracks: vec![],
        };
        assert!((movie.duration_secs() - 120.0).abs() < 0.001);
        assert_eq!(movie.duration(), Duration::from_secs(120));
    }

    #[test]
    fn test_movie_zero_timescale_uses_tracks() {
        let movie = MovieInfo {
            duration: 120000,
            timescale: 0,
            tracks: vec![
                track(1, HandlerType::Video, 4000),
                track(2, HandlerType::Audio, 5000),
            ],
        };
        assert_eq!(movie.duration_secs(), 0.0);
        assert_eq!(movie.duration(), Duration::from_secs(5));
    }

    #[test]
    fn test_track_lookup() {
        let movie = MovieInfo {
            duration: 0,
            timescale: 1000,
            tracks: vec![
                track(2, HandlerType::Audio, 1000),
                track(1, HandlerType::Video, 1000),
            ],
        };
        assert_eq!(movie.video_track().map(|t| t.track_id), Some(1));
        assert_eq!(movie.audio_track().map(|t| t.track_id), Some(2));
        assert_eq!(movie.track(2).map(|t| t.handler_type), Some(HandlerType::Audio));
        assert!(movie.track(9).is_none());
    }
}
