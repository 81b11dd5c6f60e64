//! Incremental, push-driven MP4 parser.
//!
//! Bytes are appended as they arrive from the transport. Once the moov box
//! is complete the handler is told about the tracks, and after extraction is
//! configured and started, samples are delivered to the handler in batches
//! as their payloads become available.

use std::collections::{BTreeMap, HashMap};
use std::ops::ControlFlow;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tracing::{debug, trace, warn};

use crate::mp4::{Atom, AtomType, MoovReader, MovieInfo, SampleTable, MAX_MOOV_SIZE};
use crate::{Error, Result};

/// A demuxed elementary-stream sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    /// Track this sample belongs to.
    pub track_id: u32,
    /// Index within the track (0-based, decode order).
    pub number: u32,
    /// Composition timestamp in track timescale units.
    pub cts: u64,
    /// Decode timestamp in track timescale units.
    pub dts: u64,
    /// Duration in track timescale units.
    pub duration: u32,
    /// Ticks per second for `cts`, `dts` and `duration`.
    pub timescale: u32,
    /// Whether this is a sync sample (keyframe).
    pub is_sync: bool,
    /// File offset of the payload.
    pub offset: u64,
    /// Sample payload.
    pub data: Bytes,
}

/// Per-track extraction settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractionOptions {
    /// Maximum number of samples per `on_samples` call.
    pub batch_size: usize,
}

impl Default for ExtractionOptions {
    fn default() -> Self {
        Self { batch_size: 16 }
    }
}

/// Where extraction restarts after a seek.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeekPosition {
    pub track_id: u32,
    /// Index of the first sample that will be delivered.
    pub sample_number: u32,
    /// Presentation time of that sample.
    pub time: Duration,
    /// File offset of that sample's payload.
    pub file_offset: u64,
}

/// Callbacks fired by a [`ContainerParser`].
///
/// Registered once when the parser is constructed.
pub trait ParserHandler {
    /// Track metadata is available. Fired once.
    fn on_ready(&mut self, movie: &MovieInfo);

    /// A batch of samples for the extraction track.
    ///
    /// Returning `ControlFlow::Break` pauses extraction, as if `stop()` had
    /// been called.
    fn on_samples(&mut self, track_id: u32, samples: Vec<Sample>) -> ControlFlow<()>;

    /// Malformed or truncated input. The parser stops after reporting.
    fn on_error(&mut self, error: Error);

    /// A seek requested through [`ContainerParser::seek`] has finished.
    fn on_seek_complete(&mut self, position: SeekPosition);

    /// Every sample of the extraction track has been delivered.
    fn on_end_of_track(&mut self, track_id: u32);
}

/// Operations on a push-driven container parser.
pub trait ContainerParser<H: ParserHandler> {
    /// Append bytes read from the source at `file_offset`.
    fn append_bytes(&mut self, data: Bytes, file_offset: u64);

    /// No more bytes will be appended.
    fn flush(&mut self);

    /// Select the track to extract samples from.
    fn set_extraction_options(&mut self, track_id: u32, options: ExtractionOptions) -> Result<()>;

    /// Start (or resume) delivering samples.
    fn start(&mut self);

    /// Pause sample delivery.
    fn stop(&mut self);

    /// Reposition extraction to `time`, snapping back to a sync sample when
    /// `use_nearest_sync` is set. Completion is reported via the handler.
    fn seek(&mut self, time: Duration, use_nearest_sync: bool);

    /// Whether appending more bytes would let the parser make progress.
    fn wants_data(&self) -> bool;

    fn handler(&self) -> &H;

    fn handler_mut(&mut self) -> &mut H;
}

#[derive(Debug)]
struct Extraction {
    track_id: u32,
    options: ExtractionOptions,
    next: u32,
    end_reported: bool,
}

struct Movie {
    info: MovieInfo,
    tables: HashMap<u32, SampleTable>,
}

/// Progressive MP4 parser fed from a byte stream.
///
/// All appended bytes are retained so that a backwards seek can be served
/// without re-reading the source.
pub struct Mp4StreamParser<H> {
    handler: H,
    segments: BTreeMap<u64, Bytes>,
    received_end: u64,
    scan_offset: u64,
    movie: Option<Movie>,
    extraction: Option<Extraction>,
    pending_seek: Option<(Duration, bool)>,
    started: bool,
    flushed: bool,
    failed: bool,
}

impl<H: ParserHandler> Mp4StreamParser<H> {
    /// Create a parser that reports to `handler`.
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            segments: BTreeMap::new(),
            received_end: 0,
            scan_offset: 0,
            movie: None,
            extraction: None,
            pending_seek: None,
            started: false,
            flushed: false,
            failed: false,
        }
    }

    /// Movie metadata, once the moov box has been parsed.
    pub fn movie(&self) -> Option<&MovieInfo> {
        self.movie.as_ref().map(|m| &m.info)
    }

    /// Total number of bytes retained.
    pub fn buffered_bytes(&self) -> usize {
        self.segments.values().map(Bytes::len).sum()
    }

    /// Read `len` bytes at `offset`, if all of them have been appended.
    ///
    /// Returns a zero-copy slice when the range sits inside one segment.
    fn read_range(&self, offset: u64, len: usize) -> Option<Bytes> {
        let end = offset.checked_add(len as u64)?;
        let (&start, first) = self.segments.range(..=offset).next_back()?;
        let rel = (offset - start) as usize;

        if rel + len <= first.len() {
            return Some(first.slice(rel..rel + len));
        }
        if rel >= first.len() {
            return None;
        }

        let mut out = BytesMut::with_capacity(len);
        out.extend_from_slice(&first[rel..]);
        let mut pos = start + first.len() as u64;

        for (&seg_start, seg) in self.segments.range(offset + 1..) {
            if pos >= end {
                break;
            }
            if seg_start > pos {
                return None;
            }
            let skip = (pos - seg_start) as usize;
            if skip >= seg.len() {
                continue;
            }
            let take = (seg.len() - skip).min((end - pos) as usize);
            out.extend_from_slice(&seg[skip..skip + take]);
            pos += take as u64;
        }

        (pos >= end).then(|| out.freeze())
    }

    /// Enough bytes at `offset` to hold a box header (extended if possible).
    fn header_bytes(&self, offset: u64) -> Option<Bytes> {
        self.read_range(offset, 16).or_else(|| self.read_range(offset, 8))
    }

    fn fail(&mut self, error: Error) {
        warn!(error = %error, "Container parsing failed");
        self.failed = true;
        self.started = false;
        self.handler.on_error(error);
    }

    fn process(&mut self) {
        if self.failed {
            return;
        }

        if self.movie.is_none() {
            if let Err(e) = self.scan_top_level() {
                self.fail(e);
                return;
            }
        }

        if self.movie.is_some() {
            if let Some((time, sync)) = self.pending_seek.take() {
                self.seek_now(time, sync);
            }
            self.extract();
        }
    }

    /// Walk top-level boxes until the moov box is complete.
    fn scan_top_level(&mut self) -> Result<()> {
        loop {
            let Some(header) = self.header_bytes(self.scan_offset) else {
                return Ok(());
            };
            let Some(atom) = Atom::parse_header(&header, self.scan_offset)? else {
                return Ok(());
            };

            if atom.atom_type == AtomType::MOOV {
                let size = atom.size.ok_or_else(|| {
                    Error::invalid_mp4("moov box without an explicit size")
                })?;
                if size > MAX_MOOV_SIZE {
                    return Err(Error::invalid_mp4(format!(
                        "moov size {} exceeds maximum {}",
                        size, MAX_MOOV_SIZE
                    )));
                }
                let payload_len = (size - atom.header_size as u64) as usize;
                let Some(payload) = self.read_range(atom.data_offset, payload_len) else {
                    trace!(offset = atom.start(), size, "Waiting for complete moov");
                    return Ok(());
                };

                let parsed = MoovReader::new(payload).parse()?;
                debug!(
                    tracks = parsed.info.tracks.len(),
                    duration_secs = parsed.info.duration_secs(),
                    "Movie header parsed"
                );
                self.movie = Some(Movie {
                    info: parsed.info,
                    tables: parsed.sample_tables,
                });
                if let Some(movie) = &self.movie {
                    self.handler.on_ready(&movie.info);
                }
                return Ok(());
            }

            match atom.size {
                Some(size) => {
                    trace!(atom = %atom.atom_type, offset = atom.start(), size, "Skipping box");
                    self.scan_offset = atom.start().checked_add(size).ok_or_else(|| {
                        Error::invalid_mp4(format!(
                            "box {} at offset {} declares size {} past the end of any file",
                            atom.atom_type,
                            atom.start(),
                            size
                        ))
                    })?;
                }
                // Runs to end of file, so no moov can follow
                None => {
                    return Err(Error::MissingAtom("moov"));
                }
            }
        }
    }

    /// Deliver sample batches while extraction is started and data is present.
    fn extract(&mut self) {
        while self.started && !self.failed {
            let Some(movie) = &self.movie else { return };
            let Some(extraction) = &self.extraction else { return };
            let Some(table) = movie.tables.get(&extraction.track_id) else { return };
            let timescale = movie
                .info
                .track(extraction.track_id)
                .map_or(1, |t| t.timescale);

            let track_id = extraction.track_id;
            let mut batch = Vec::with_capacity(extraction.options.batch_size);
            let mut index = extraction.next;

            while batch.len() < extraction.options.batch_size.max(1) {
                let Some(entry) = table.get(index) else { break };
                let Some(data) = self.read_range(entry.offset, entry.size as usize) else {
                    break;
                };
                batch.push(Sample {
                    track_id,
                    number: index,
                    cts: entry.pts(),
                    dts: entry.dts,
                    duration: entry.duration,
                    timescale,
                    is_sync: entry.is_keyframe,
                    offset: entry.offset,
                    data,
                });
                index += 1;
            }

            let exhausted = index >= table.sample_count;

            if batch.is_empty() {
                if exhausted {
                    if let Some(extraction) = self.extraction.as_mut() {
                        if !extraction.end_reported {
                            extraction.end_reported = true;
                            debug!(track_id, "End of track");
                            self.handler.on_end_of_track(track_id);
                        }
                    }
                } else if self.flushed {
                    self.fail(Error::truncated(format!(
                        "input ended before sample {} of track {}",
                        index, track_id
                    )));
                }
                return;
            }

            if let Some(extraction) = self.extraction.as_mut() {
                extraction.next = index;
            }
            trace!(track_id, count = batch.len(), next = index, "Delivering samples");
            if self.handler.on_samples(track_id, batch).is_break() {
                self.started = false;
            }
        }
    }

    fn seek_now(&mut self, time: Duration, use_nearest_sync: bool) {
        let Some(movie) = &self.movie else { return };
        let track_id = match &self.extraction {
            Some(extraction) => extraction.track_id,
            None => match movie.info.tracks.first() {
                Some(track) => track.track_id,
                None => return,
            },
        };
        let Some(table) = movie.tables.get(&track_id) else { return };
        let timescale = movie.info.track(track_id).map_or(1, |t| t.timescale).max(1);

        let target = u64::try_from(time.as_nanos() * timescale as u128 / 1_000_000_000)
            .unwrap_or(u64::MAX);
        let mut index = table.find_sample_at_time(target).unwrap_or(0);
        if use_nearest_sync {
            index = table.find_keyframe_at_or_before(index).unwrap_or(0);
        }

        let position = match table.get(index) {
            Some(entry) => SeekPosition {
                track_id,
                sample_number: index,
                time: Duration::from_nanos(
                    u64::try_from(entry.pts() as u128 * 1_000_000_000 / timescale as u128)
                        .unwrap_or(u64::MAX),
                ),
                file_offset: entry.offset,
            },
            None => SeekPosition {
                track_id,
                sample_number: 0,
                time: Duration::ZERO,
                file_offset: 0,
            },
        };

        if let Some(extraction) = self.extraction.as_mut() {
            extraction.next = position.sample_number;
            extraction.end_reported = false;
        }

        debug!(
            track_id,
            requested_ms = time.as_millis() as u64,
            sample = position.sample_number,
            position_ms = position.time.as_millis() as u64,
            "Seek repositioned"
        );
        self.handler.on_seek_complete(position);
    }
}

impl<H: ParserHandler> ContainerParser<H> for Mp4StreamParser<H> {
    fn append_bytes(&mut self, data: Bytes, file_offset: u64) {
        if self.failed || data.is_empty() {
            return;
        }
        self.received_end = self.received_end.max(file_offset + data.len() as u64);
        self.segments.insert(file_offset, data);
        self.process();
    }

    fn flush(&mut self) {
        if self.flushed {
            return;
        }
        self.flushed = true;
        if self.failed {
            return;
        }

        if self.movie.is_none() {
            self.fail(Error::truncated(format!(
                "input ended after {} bytes without a moov box",
                self.received_end
            )));
            return;
        }
        self.process();
    }

    fn set_extraction_options(&mut self, track_id: u32, options: ExtractionOptions) -> Result<()> {
        let movie = self
            .movie
            .as_ref()
            .ok_or_else(|| Error::invalid_mp4("extraction configured before the movie header"))?;
        if !movie.tables.contains_key(&track_id) {
            return Err(Error::invalid_mp4(format!("no track with id {}", track_id)));
        }

        match self.extraction.as_mut() {
            Some(extraction) if extraction.track_id == track_id => {
                extraction.options = options;
            }
            _ => {
                self.extraction = Some(Extraction {
                    track_id,
                    options,
                    next: 0,
                    end_reported: false,
                });
            }
        }
        Ok(())
    }

    fn start(&mut self) {
        self.started = true;
        self.process();
    }

    fn stop(&mut self) {
        self.started = false;
    }

    fn seek(&mut self, time: Duration, use_nearest_sync: bool) {
        if self.failed {
            return;
        }
        if self.movie.is_none() {
            self.pending_seek = Some((time, use_nearest_sync));
            return;
        }
        self.seek_now(time, use_nearest_sync);
    }

    fn wants_data(&self) -> bool {
        if self.failed || self.flushed {
            return false;
        }
        let Some(movie) = &self.movie else {
            return true;
        };
        if !self.started {
            return false;
        }
        let Some(extraction) = &self.extraction else {
            return false;
        };
        if extraction.end_reported {
            return false;
        }

        match movie
            .tables
            .get(&extraction.track_id)
            .and_then(|t| t.get(extraction.next))
        {
            Some(entry) => self.read_range(entry.offset, entry.size as usize).is_none(),
            None => false,
        }
    }

    fn handler(&self) -> &H {
        &self.handler
    }

    fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{Mp4Fixture, AUDIO_TRACK_ID, VIDEO_TRACK_ID};

    #[derive(Default)]
    struct Recorder {
        ready: Option<MovieInfo>,
        samples: Vec<Sample>,
        errors: Vec<String>,
        seeks: Vec<SeekPosition>,
        ended: Vec<u32>,
        pause_after: Option<usize>,
    }

    impl ParserHandler for Recorder {
        fn on_ready(&mut self, movie: &MovieInfo) {
            self.ready = Some(movie.clone());
        }

        fn on_samples(&mut self, _track_id: u32, samples: Vec<Sample>) -> ControlFlow<()> {
            self.samples.extend(samples);
            match self.pause_after {
                Some(limit) if self.samples.len() >= limit => ControlFlow::Break(()),
                _ => ControlFlow::Continue(()),
            }
        }

        fn on_error(&mut self, error: Error) {
            self.errors.push(error.to_string());
        }

        fn on_seek_complete(&mut self, position: SeekPosition) {
            self.seeks.push(position);
        }

        fn on_end_of_track(&mut self, track_id: u32) {
            self.ended.push(track_id);
        }
    }

    fn feed(parser: &mut Mp4StreamParser<Recorder>, file: &[u8], chunk: usize) {
        for (i, piece) in file.chunks(chunk).enumerate() {
            parser.append_bytes(Bytes::copy_from_slice(piece), (i * chunk) as u64);
        }
    }

    fn ready_parser(file: &[u8]) -> Mp4StreamParser<Recorder> {
        let mut parser = Mp4StreamParser::new(Recorder::default());
        feed(&mut parser, file, 7);
        assert!(parser.handler().ready.is_some());
        parser
    }

    #[test]
    fn test_ready_fires_once_moov_complete() {
        let file = Mp4Fixture::new().video_frames(6, 3).build();
        let mut parser = Mp4StreamParser::new(Recorder::default());

        parser.append_bytes(Bytes::copy_from_slice(&file[..40]), 0);
        assert!(parser.handler().ready.is_none());
        assert!(parser.wants_data());

        parser.append_bytes(Bytes::copy_from_slice(&file[40..]), 40);
        let movie = parser.handler().ready.as_ref().unwrap();
        assert_eq!(movie.tracks.len(), 1);
        assert_eq!(movie.tracks[0].track_id, VIDEO_TRACK_ID);

        // Not started: no demand for more data
        assert!(!parser.wants_data());
    }

    #[test]
    fn test_extract_delivers_all_samples_then_end() {
        let file = Mp4Fixture::new().video_frames(20, 5).audio_frames(10).build();
        let mut parser = ready_parser(&file);

        parser
            .set_extraction_options(VIDEO_TRACK_ID, ExtractionOptions { batch_size: 4 })
            .unwrap();
        parser.start();

        let recorder = parser.handler();
        assert_eq!(recorder.samples.len(), 20);
        assert_eq!(recorder.ended, vec![VIDEO_TRACK_ID]);
        assert!(recorder.samples.iter().all(|s| s.track_id == VIDEO_TRACK_ID));

        let cts: Vec<u64> = recorder.samples.iter().map(|s| s.cts).collect();
        assert!(cts.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(recorder.samples[1].cts, 40);
        assert_eq!(recorder.samples[1].timescale, 1000);
        assert!(recorder.samples[5].is_sync);
        assert!(!recorder.samples[6].is_sync);
        assert_eq!(
            recorder.samples[7].data,
            Bytes::from(Mp4Fixture::sample_payload(VIDEO_TRACK_ID, 7, 24))
        );
    }

    #[test]
    fn test_samples_follow_incoming_bytes() {
        let file = Mp4Fixture::new().video_frames(10, 2).build();
        let mut parser = Mp4StreamParser::new(Recorder::default());

        // Everything up to and including the moov, nothing from mdat
        let moov_end = file.windows(4).position(|w| w == b"mdat").unwrap() - 4;
        parser.append_bytes(Bytes::copy_from_slice(&file[..moov_end]), 0);
        parser
            .set_extraction_options(VIDEO_TRACK_ID, ExtractionOptions::default())
            .unwrap();
        parser.start();
        assert!(parser.handler().samples.is_empty());
        assert!(parser.wants_data());

        parser.append_bytes(Bytes::copy_from_slice(&file[moov_end..]), moov_end as u64);
        assert_eq!(parser.handler().samples.len(), 10);
        assert!(!parser.wants_data());
    }

    #[test]
    fn test_break_pauses_extraction() {
        let file = Mp4Fixture::new().video_frames(12, 3).build();
        let mut parser = ready_parser(&file);
        parser.handler_mut().pause_after = Some(4);

        parser
            .set_extraction_options(VIDEO_TRACK_ID, ExtractionOptions { batch_size: 4 })
            .unwrap();
        parser.start();
        assert_eq!(parser.handler().samples.len(), 4);

        parser.handler_mut().pause_after = None;
        parser.start();
        assert_eq!(parser.handler().samples.len(), 12);
        assert_eq!(parser.handler().samples[4].number, 4);
    }

    #[test]
    fn test_seek_snaps_to_preceding_keyframe() {
        let file = Mp4Fixture::new().video_frames(30, 10).build();
        let mut parser = ready_parser(&file);
        parser
            .set_extraction_options(VIDEO_TRACK_ID, ExtractionOptions::default())
            .unwrap();

        // 0.5s = sample 12 at 40ms per frame; keyframes at 0, 10, 20
        parser.seek(Duration::from_millis(500), true);
        let position = parser.handler().seeks[0];
        assert_eq!(position.sample_number, 10);
        assert_eq!(position.time, Duration::from_millis(400));

        parser.seek(Duration::from_millis(500), false);
        assert_eq!(parser.handler().seeks[1].sample_number, 12);

        parser.seek(Duration::ZERO, true);
        assert_eq!(parser.handler().seeks[2].sample_number, 0);

        parser.seek(Duration::from_millis(900), true);
        parser.start();
        let first = &parser.handler().samples[0];
        assert_eq!(first.number, 20);
        assert!(first.is_sync);
    }

    #[test]
    fn test_seek_before_ready_is_deferred() {
        let file = Mp4Fixture::new().video_frames(10, 5).build();
        let mut parser = Mp4StreamParser::new(Recorder::default());
        parser.seek(Duration::from_millis(300), true);
        assert!(parser.handler().seeks.is_empty());

        feed(&mut parser, &file, 64);
        assert_eq!(parser.handler().seeks.len(), 1);
        assert_eq!(parser.handler().seeks[0].sample_number, 5);
    }

    #[test]
    fn test_seek_rearms_end_of_track() {
        let file = Mp4Fixture::new().video_frames(4, 2).build();
        let mut parser = ready_parser(&file);
        parser
            .set_extraction_options(VIDEO_TRACK_ID, ExtractionOptions::default())
            .unwrap();
        parser.start();
        assert_eq!(parser.handler().ended.len(), 1);

        parser.seek(Duration::from_millis(80), true);
        parser.start();
        assert_eq!(parser.handler().samples.len(), 6);
        assert_eq!(parser.handler().ended.len(), 2);
    }

    #[test]
    fn test_flush_without_moov_reports_error() {
        let file = Mp4Fixture::new().video_frames(4, 2).build();
        let mut parser = Mp4StreamParser::new(Recorder::default());
        parser.append_bytes(Bytes::copy_from_slice(&file[..30]), 0);
        parser.flush();

        assert_eq!(parser.handler().errors.len(), 1);
        assert!(parser.handler().errors[0].contains("without a moov"));
        assert!(!parser.wants_data());
    }

    #[test]
    fn test_oversized_box_reports_error() {
        let mut file = vec![0, 0, 0, 16];
        file.extend_from_slice(b"ftypisom");
        file.extend_from_slice(&[0, 0, 2, 0]);
        file.extend_from_slice(&[0, 0, 0, 1]);
        file.extend_from_slice(b"free");
        file.extend_from_slice(&u64::MAX.to_be_bytes());

        let mut parser = Mp4StreamParser::new(Recorder::default());
        parser.append_bytes(Bytes::from(file), 0);

        assert_eq!(parser.handler().errors.len(), 1);
        assert!(parser.handler().errors[0].contains("past the end"));
        assert!(parser.handler().ready.is_none());
        assert!(!parser.wants_data());
    }

    #[test]
    fn test_flush_with_missing_samples_reports_truncation() {
        let file = Mp4Fixture::new().video_frames(8, 4).build();
        let mut parser = Mp4StreamParser::new(Recorder::default());
        let cut = file.len() - 30;
        parser.append_bytes(Bytes::copy_from_slice(&file[..cut]), 0);
        parser
            .set_extraction_options(VIDEO_TRACK_ID, ExtractionOptions::default())
            .unwrap();
        parser.start();
        let delivered = parser.handler().samples.len();
        assert!(delivered < 8);

        parser.flush();
        assert_eq!(parser.handler().errors.len(), 1);
        assert!(parser.handler().ended.is_empty());
    }

    #[test]
    fn test_moov_at_end() {
        let file = Mp4Fixture::new().video_frames(6, 3).moov_at_end().build();
        let mut parser = Mp4StreamParser::new(Recorder::default());
        feed(&mut parser, &file, 50);
        parser
            .set_extraction_options(VIDEO_TRACK_ID, ExtractionOptions::default())
            .unwrap();
        parser.start();
        assert_eq!(parser.handler().samples.len(), 6);
    }

    #[test]
    fn test_unknown_extraction_track() {
        let file = Mp4Fixture::new().video_frames(2, 1).build();
        let mut parser = ready_parser(&file);
        assert!(parser
            .set_extraction_options(AUDIO_TRACK_ID, ExtractionOptions::default())
            .is_err());
    }

    #[test]
    fn test_read_range_stitches_segments() {
        let mut parser = Mp4StreamParser::new(Recorder::default());
        parser.segments.insert(0, Bytes::from_static(b"abcd"));
        parser.segments.insert(4, Bytes::from_static(b"efgh"));
        parser.segments.insert(10, Bytes::from_static(b"kl"));

        assert_eq!(parser.read_range(1, 2).unwrap(), Bytes::from_static(b"bc"));
        assert_eq!(parser.read_range(2, 5).unwrap(), Bytes::from_static(b"cdefg"));
        assert!(parser.read_range(6, 5).is_none());
        assert!(parser.read_range(20, 1).is_none());
    }
}
