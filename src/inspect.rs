//! Read just enough of a source to list its tracks.

use anyhow::Result;
use framepull_media::{
    ContainerParser, MovieInfo, Mp4StreamParser, ParserHandler, Sample, SeekPosition, Track,
};
use framepull_pipeline::DecoderConfig;
use serde::Serialize;
use std::ops::ControlFlow;

use crate::source::SourceLocator;

#[derive(Default)]
struct TrackListProbe {
    movie: Option<MovieInfo>,
    error: Option<framepull_media::Error>,
}

impl ParserHandler for TrackListProbe {
    fn on_ready(&mut self, movie: &MovieInfo) {
        self.movie = Some(movie.clone());
    }

    fn on_samples(&mut self, _track_id: u32, _samples: Vec<Sample>) -> ControlFlow<()> {
        ControlFlow::Break(())
    }

    fn on_error(&mut self, error: framepull_media::Error) {
        self.error.get_or_insert(error);
    }

    fn on_seek_complete(&mut self, _position: SeekPosition) {}

    fn on_end_of_track(&mut self, _track_id: u32) {}
}

/// Track list of a source. Stops reading once the movie header is parsed.
pub async fn read_movie(locator: &SourceLocator, read_chunk_size: usize) -> Result<MovieInfo> {
    let mut feeder = locator.open(read_chunk_size).await?;
    let mut parser = Mp4StreamParser::new(TrackListProbe::default());

    loop {
        if let Some(error) = parser.handler_mut().error.take() {
            return Err(error.into());
        }
        if let Some(movie) = parser.handler_mut().movie.take() {
            tracing::debug!("Movie header found after {} bytes", feeder.offset());
            return Ok(movie);
        }
        match feeder.next_chunk().await {
            Some(Ok((data, offset))) => parser.append_bytes(data, offset),
            Some(Err(e)) => return Err(e.into()),
            None => parser.flush(),
        }
    }
}

/// A track and, when it can be built, its decoder configuration.
#[derive(Debug, Serialize)]
pub struct TrackReport {
    #[serde(flatten)]
    pub track: Track,
    pub decoder_codec: Option<String>,
    pub description_len: Option<usize>,
    pub config_error: Option<String>,
}

impl TrackReport {
    pub fn new(track: &Track) -> Self {
        let (decoder_codec, description_len, config_error) = match DecoderConfig::for_track(track)
        {
            Ok(config) => (Some(config.codec), Some(config.description.len()), None),
            Err(e) => (None, None, Some(e.to_string())),
        };
        Self {
            track: track.clone(),
            decoder_codec,
            description_len,
            config_error,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MovieReport {
    pub duration_secs: f64,
    pub tracks: Vec<TrackReport>,
}

impl From<&MovieInfo> for MovieReport {
    fn from(movie: &MovieInfo) -> Self {
        Self {
            duration_secs: movie.duration().as_secs_f64(),
            tracks: movie.tracks.iter().map(TrackReport::new).collect(),
        }
    }
}
