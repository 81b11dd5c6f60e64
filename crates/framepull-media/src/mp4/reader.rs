//! Movie header (moov) parsing.
//!
//! The streaming parser buffers the complete moov box before handing it
//! here, so everything below works on in-memory slices.

use std::collections::HashMap;

use bytes::Bytes;
use tracing::{debug, trace};

use super::atoms::{Atom, AtomType, HandlerType, Track};
use super::codec::codec_string;
use super::sample_table::{SampleTable, SampleTableBuilder};
use super::MovieInfo;
use crate::{Error, Result};

/// Maximum allowed moov size (64 MB) to prevent OOM on malformed files.
pub const MAX_MOOV_SIZE: u64 = 64 * 1024 * 1024;

/// Offset of child boxes inside a VisualSampleEntry (from the stsd payload start).
const VISUAL_ENTRY_CHILDREN: usize = 94;
/// Offset of child boxes inside a version 0 AudioSampleEntry.
const AUDIO_ENTRY_CHILDREN: usize = 44;

/// Result of parsing a moov box: public metadata plus per-track sample tables.
#[derive(Debug, Clone)]
pub struct ParsedMovie {
    pub info: MovieInfo,
    pub sample_tables: HashMap<u32, SampleTable>,
}

/// Reader over a buffered moov payload.
pub struct MoovReader {
    payload: Bytes,
}

impl MoovReader {
    /// Create a reader over the moov payload (box header excluded).
    pub fn new(payload: Bytes) -> Self {
        Self { payload }
    }

    /// Parse the movie header and every track it declares.
    pub fn parse(&self) -> Result<ParsedMovie> {
        let mut info = MovieInfo {
            duration: 0,
            timescale: 1000,
            tracks: Vec::new(),
        };
        let mut sample_tables = HashMap::new();

        for (atom_type, data) in children(&self.payload)? {
            match atom_type {
                AtomType::MVHD => parse_mvhd(&data, &mut info),
                AtomType::TRAK => {
                    let (track, table) = parse_trak(&data)?;
                    debug!(
                        track_id = track.track_id,
                        codec = %track.codec,
                        samples = table.sample_count,
                        "Parsed track"
                    );
                    sample_tables.insert(track.track_id, table);
                    info.tracks.push(track);
                }
                _ => {}
            }
        }

        if info.tracks.is_empty() {
            return Err(Error::MissingAtom("trak"));
        }

        Ok(ParsedMovie {
            info,
            sample_tables,
        })
    }
}

/// Split a container payload into its child boxes.
fn children(data: &Bytes) -> Result<Vec<(AtomType, Bytes)>> {
    let mut out = Vec::new();
    let mut pos = 0usize;

    while pos + 8 <= data.len() {
        let Some(atom) = Atom::parse_header(&data[pos..], pos as u64)? else {
            break;
        };
        let end = match atom.size {
            Some(size) => pos.saturating_add(size as usize),
            None => data.len(),
        };
        if end > data.len() {
            return Err(Error::truncated(format!(
                "child box {} overruns its parent ({} > {})",
                atom.atom_type,
                end,
                data.len()
            )));
        }

        out.push((atom.atom_type, data.slice(atom.data_offset as usize..end)));
        pos = end;
    }

    Ok(out)
}

fn be_u16(data: &[u8], at: usize) -> Option<u16> {
    let b = data.get(at..at + 2)?;
    Some(u16::from_be_bytes([b[0], b[1]]))
}

fn be_u32(data: &[u8], at: usize) -> Option<u32> {
    let b = data.get(at..at + 4)?;
    Some(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
}

fn be_u64(data: &[u8], at: usize) -> Option<u64> {
    let b = data.get(at..at + 8)?;
    let mut buf = [0u8; 8];
    buf.copy_from_slice(b);
    Some(u64::from_be_bytes(buf))
}

/// Timescale and duration from a versioned header (mvhd / mdhd).
fn timing(data: &[u8]) -> Option<(u32, u64)> {
    match *data.first()? {
        0 => Some((be_u32(data, 12)?, be_u32(data, 16)? as u64)),
        _ => Some((be_u32(data, 20)?, be_u64(data, 24)?)),
    }
}

fn parse_mvhd(data: &[u8], info: &mut MovieInfo) {
    if let Some((timescale, duration)) = timing(data) {
        info.timescale = timescale;
        info.duration = duration;
    }
}

fn parse_trak(data: &Bytes) -> Result<(Track, SampleTable)> {
    let mut track = Track::new(0);
    let mut table = SampleTable::default();

    for (atom_type, child) in children(data)? {
        match atom_type {
            AtomType::TKHD => parse_tkhd(&child, &mut track),
            AtomType::MDIA => table = parse_mdia(&child, &mut track)?,
            _ => {}
        }
    }

    if track.track_id == 0 {
        return Err(Error::MissingAtom("tkhd"));
    }

    track.sample_count = table.sample_count;
    Ok((track, table))
}

fn parse_tkhd(data: &[u8], track: &mut Track) {
    let Some(version) = data.first() else {
        return;
    };

    // Both 16.16 fixed point, after the 36-byte matrix
    let (id_at, size_at) = if *version == 0 { (12, 76) } else { (20, 84) };

    if let Some(id) = be_u32(data, id_at) {
        track.track_id = id;
    }
    if let (Some(w), Some(h)) = (be_u32(data, size_at), be_u32(data, size_at + 4)) {
        if w > 0 && h > 0 {
            track.width = Some(w >> 16);
            track.height = Some(h >> 16);
        }
    }
}

fn parse_mdia(data: &Bytes, track: &mut Track) -> Result<SampleTable> {
    let kids = children(data)?;

    // hdlr decides how stsd is read, so pick it up before minf
    for (atom_type, child) in &kids {
        match *atom_type {
            AtomType::MDHD => {
                if let Some((timescale, duration)) = timing(child) {
                    track.timescale = timescale;
                    track.duration = duration;
                }
            }
            AtomType::HDLR => {
                if let Some(b) = child.get(8..12) {
                    track.handler_type = HandlerType::from_bytes([b[0], b[1], b[2], b[3]]);
                }
            }
            _ => {}
        }
    }

    for (atom_type, child) in &kids {
        if *atom_type == AtomType::MINF {
            for (minf_type, minf_child) in children(child)? {
                if minf_type == AtomType::STBL {
                    return parse_stbl(&minf_child, track);
                }
            }
        }
    }

    Err(Error::MissingAtom("stbl"))
}

fn parse_stbl(data: &Bytes, track: &mut Track) -> Result<SampleTable> {
    let mut builder = SampleTableBuilder::new();

    for (atom_type, child) in children(data)? {
        match atom_type {
            AtomType::STSD => parse_stsd(&child, track),
            AtomType::STTS => builder.set_stts(pairs(&child, |d, at| {
                Some((be_u32(d, at)?, be_u32(d, at + 4)?))
            })),
            AtomType::STSS => builder.set_sync_samples(entries(&child, 4, |d, at| be_u32(d, at))),
            AtomType::STSC => builder.set_stsc(entries(&child, 12, |d, at| {
                Some((be_u32(d, at)?, be_u32(d, at + 4)?, be_u32(d, at + 8)?))
            })),
            AtomType::STSZ => {
                let uniform = be_u32(&child, 4).unwrap_or(0);
                let count = be_u32(&child, 8).unwrap_or(0);
                let sizes = if uniform == 0 {
                    (0..count as usize)
                        .map_while(|i| be_u32(&child, 12 + i * 4))
                        .collect()
                } else {
                    Vec::new()
                };
                builder.set_stsz(uniform, count, sizes);
            }
            AtomType::STCO => builder.set_chunk_offsets(entries(&child, 4, |d, at| {
                be_u32(d, at).map(u64::from)
            })),
            AtomType::CO64 => builder.set_chunk_offsets(entries(&child, 8, |d, at| be_u64(d, at))),
            AtomType::CTTS => {
                // Version 0 offsets are nominally unsigned; both read as i32
                builder.set_ctts(pairs(&child, |d, at| {
                    Some((be_u32(d, at)?, be_u32(d, at + 4)? as i32))
                }))
            }
            _ => {}
        }
    }

    Ok(builder.build())
}

/// Read a full-box table of fixed-size entries following the entry count.
fn entries<T>(data: &[u8], stride: usize, read: impl Fn(&[u8], usize) -> Option<T>) -> Vec<T> {
    let count = be_u32(data, 4).unwrap_or(0) as usize;
    (0..count)
        .map_while(|i| read(data, 8 + i * stride))
        .collect()
}

fn pairs<T>(data: &[u8], read: impl Fn(&[u8], usize) -> Option<T>) -> Vec<T> {
    entries(data, 8, read)
}

/// Read the first sample entry: codec, dimensions and configuration box.
fn parse_stsd(data: &Bytes, track: &mut Track) {
    let (Some(entry_size), Some(fourcc)) = (be_u32(data, 8), data.get(12..16)) else {
        return;
    };
    track.sample_entry = AtomType::from_bytes([fourcc[0], fourcc[1], fourcc[2], fourcc[3]]);
    let entry_end = (8 + entry_size as usize).min(data.len());

    if track.handler_type.is_audio() {
        track.channels = be_u16(data, 32);
        track.sample_rate = be_u32(data, 40).map(|r| r >> 16);

        // QuickTime sound description v1 carries 16 extra bytes
        let start = match be_u16(data, 24) {
            Some(1) => AUDIO_ENTRY_CHILDREN + 16,
            _ => AUDIO_ENTRY_CHILDREN,
        };
        track.config_box = find_box(data, start, entry_end, |t| t == AtomType::ESDS);
    } else if track.handler_type.is_video() {
        track.coded_width = be_u16(data, 40).map(u32::from);
        track.coded_height = be_u16(data, 42).map(u32::from);
        track.config_box = find_box(data, VISUAL_ENTRY_CHILDREN, entry_end, |t| {
            t.is_video_config()
        });
    }

    track.codec = codec_string(track.sample_entry, track.config_box.as_ref());
    trace!(
        track_id = track.track_id,
        entry = %track.sample_entry,
        has_config = track.config_box.is_some(),
        "Read sample description"
    );
}

/// Find a child box by type between `start` and `end`, returned header included.
fn find_box(
    data: &Bytes,
    start: usize,
    end: usize,
    wanted: impl Fn(AtomType) -> bool,
) -> Option<Bytes> {
    let mut pos = start;
    while pos + 8 <= end {
        let size = be_u32(data, pos)? as usize;
        let fourcc = data.get(pos + 4..pos + 8)?;
        if size < 8 || pos + size > end {
            break;
        }
        if wanted(AtomType::from_bytes([fourcc[0], fourcc[1], fourcc[2], fourcc[3]])) {
            return Some(data.slice(pos..pos + size));
        }
        pos += size;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::Mp4Fixture;

    fn moov_payload(file: &[u8]) -> Bytes {
        let mut pos = 0;
        while pos + 8 <= file.len() {
            let atom = Atom::parse_header(&file[pos..], pos as u64).unwrap().unwrap();
            let size = atom.size.unwrap() as usize;
            if atom.atom_type == AtomType::MOOV {
                return Bytes::copy_from_slice(&file[pos + 8..pos + size]);
            }
            pos += size;
        }
        panic!("fixture has no moov");
    }

    #[test]
    fn test_parse_video_and_audio_tracks() {
        let file = Mp4Fixture::new().video_frames(10, 3).audio_frames(20).build();
        let movie = MoovReader::new(moov_payload(&file)).parse().unwrap();

        assert_eq!(movie.info.tracks.len(), 2);

        let video = movie.info.video_track().unwrap();
        assert_eq!(video.codec, "avc1.64001f");
        assert_eq!(video.width, Some(320));
        assert_eq!(video.coded_width, Some(320));
        assert_eq!(video.coded_height, Some(240));
        assert_eq!(video.sample_count, 10);
        assert!(video.config_box.is_some());

        let audio = movie.info.audio_track().unwrap();
        assert_eq!(audio.codec, "mp4a.40.2");
        assert_eq!(audio.channels, Some(2));
        assert_eq!(audio.sample_rate, Some(48000));
        assert_eq!(&audio.decoder_description().unwrap()[..], &[0x11, 0x90]);

        let table = &movie.sample_tables[&video.track_id];
        assert_eq!(table.sample_count, 10);
        assert!(table.samples[0].is_keyframe);
        assert!(!table.samples[1].is_keyframe);
        assert!(table.samples[3].is_keyframe);
    }

    #[test]
    fn test_video_description_strips_header() {
        let file = Mp4Fixture::new().video_frames(2, 1).build();
        let movie = MoovReader::new(moov_payload(&file)).parse().unwrap();
        let video = movie.info.video_track().unwrap();

        let description = video.decoder_description().unwrap();
        let config = video.config_box.as_ref().unwrap();
        assert_eq!(description.len(), config.len() - 8);
        assert_eq!(description[1], 0x64);
    }

    #[test]
    fn test_moov_without_tracks() {
        let err = MoovReader::new(Bytes::new()).parse().unwrap_err();
        assert!(matches!(err, Error::MissingAtom("trak")));
    }

    #[test]
    fn test_child_overrun_is_truncation() {
        let payload = Bytes::from_static(&[0, 0, 0, 64, b'm', b'v', b'h', b'd', 0, 0]);
        assert!(matches!(
            MoovReader::new(payload).parse(),
            Err(Error::Truncated(_))
        ));
    }
}
