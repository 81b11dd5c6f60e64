//! Synthetic progressive MP4 files for tests and benchmarks.
//!
//! Produces ftyp + moov + mdat with real sample tables (one sample per
//! chunk, video and audio interleaved in the mdat). Sample payloads are
//! deterministic, see [`Mp4Fixture::sample_payload`].

use bytes::{BufMut, BytesMut};

/// Track ID used for the video track.
pub const VIDEO_TRACK_ID: u32 = 1;
/// Track ID used for the audio track.
pub const AUDIO_TRACK_ID: u32 = 2;

/// AVC decoder configuration (High profile, level 3.1) with a stub SPS/PPS.
const AVCC: &[u8] = &[
    0x01, 0x64, 0x00, 0x1f, 0xff, 0xe1, 0x00, 0x04, 0x67, 0x64, 0x00, 0x1f, 0x01, 0x00, 0x02,
    0x68, 0xee,
];

/// AudioSpecificConfig: AAC-LC, 48 kHz, stereo.
const AAC_LC_48K_STEREO: &[u8] = &[0x11, 0x90];

#[derive(Debug, Clone)]
struct VideoSpec {
    count: u32,
    gop: u32,
    timescale: u32,
    frame_duration: u32,
    width: u16,
    height: u16,
    entry: [u8; 4],
    config_type: [u8; 4],
    config: Vec<u8>,
}

#[derive(Debug, Clone)]
struct AudioSpec {
    count: u32,
    timescale: u32,
    frame_duration: u32,
}

/// Builder for synthetic MP4 files.
#[derive(Debug, Clone, Default)]
pub struct Mp4Fixture {
    video: Option<VideoSpec>,
    audio: Option<AudioSpec>,
    moov_at_end: bool,
}

struct Layout {
    video_offsets: Vec<u64>,
    audio_offsets: Vec<u64>,
}

impl Mp4Fixture {
    /// Create an empty fixture (no tracks).
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a 320x240 AVC video track of `count` frames, a keyframe every `gop` frames.
    ///
    /// Timescale 1000, 40 ticks per frame.
    pub fn video_frames(mut self, count: u32, gop: u32) -> Self {
        self.video = Some(VideoSpec {
            count,
            gop: gop.max(1),
            timescale: 1000,
            frame_duration: 40,
            width: 320,
            height: 240,
            entry: *b"avc1",
            config_type: *b"avcC",
            config: AVCC.to_vec(),
        });
        self
    }

    /// Override the video timing.
    pub fn video_timing(mut self, timescale: u32, frame_duration: u32) -> Self {
        if let Some(video) = self.video.as_mut() {
            video.timescale = timescale;
            video.frame_duration = frame_duration;
        }
        self
    }

    /// Replace the video sample entry and its configuration box payload.
    pub fn video_config(mut self, entry: [u8; 4], config_type: [u8; 4], config: Vec<u8>) -> Self {
        if let Some(video) = self.video.as_mut() {
            video.entry = entry;
            video.config_type = config_type;
            video.config = config;
        }
        self
    }

    /// Add an AAC-LC stereo 48 kHz audio track of `count` frames (1024 ticks each).
    pub fn audio_frames(mut self, count: u32) -> Self {
        self.audio = Some(AudioSpec {
            count,
            timescale: 48000,
            frame_duration: 1024,
        });
        self
    }

    /// Write the moov box after the mdat instead of before it.
    pub fn moov_at_end(mut self) -> Self {
        self.moov_at_end = true;
        self
    }

    /// Size in bytes of a video sample payload.
    pub fn video_sample_size(index: u32, gop: u32) -> usize {
        if index % gop.max(1) == 0 {
            64
        } else {
            24
        }
    }

    /// Deterministic payload: track id, big-endian sample index, then filler.
    pub fn sample_payload(track_id: u32, index: u32, size: usize) -> Vec<u8> {
        let mut data = vec![0xab; size.max(5)];
        data[0] = track_id as u8;
        data[1..5].copy_from_slice(&index.to_be_bytes());
        data
    }

    /// Serialize the file.
    pub fn build(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(4096);
        write_ftyp(&mut buf);
        let ftyp_len = buf.len() as u64;

        let mdat = self.mdat_payload();

        if self.moov_at_end {
            let layout = self.layout(ftyp_len + 8);
            write_mdat(&mut buf, &mdat);
            self.write_moov(&mut buf, &layout);
        } else {
            // Offsets don't change the moov size, so measure it once with a dummy layout
            let mut probe = BytesMut::new();
            self.write_moov(&mut probe, &self.layout(0));
            let layout = self.layout(ftyp_len + probe.len() as u64 + 8);
            self.write_moov(&mut buf, &layout);
            write_mdat(&mut buf, &mdat);
        }

        buf.to_vec()
    }

    /// Interleaving order of samples in the mdat: (track_id, index, size).
    fn interleave(&self) -> Vec<(u32, u32, usize)> {
        let video_count = self.video.as_ref().map_or(0, |v| v.count);
        let audio_count = self.audio.as_ref().map_or(0, |a| a.count);
        let mut order = Vec::new();

        for i in 0..video_count.max(audio_count) {
            if let Some(video) = self.video.as_ref().filter(|_| i < video_count) {
                order.push((VIDEO_TRACK_ID, i, Self::video_sample_size(i, video.gop)));
            }
            if i < audio_count {
                order.push((AUDIO_TRACK_ID, i, 16));
            }
        }

        order
    }

    fn mdat_payload(&self) -> Vec<u8> {
        self.interleave()
            .into_iter()
            .flat_map(|(track, index, size)| Self::sample_payload(track, index, size))
            .collect()
    }

    fn layout(&self, mdat_data_start: u64) -> Layout {
        let mut layout = Layout {
            video_offsets: Vec::new(),
            audio_offsets: Vec::new(),
        };
        let mut pos = mdat_data_start;

        for (track, _, size) in self.interleave() {
            if track == VIDEO_TRACK_ID {
                layout.video_offsets.push(pos);
            } else {
                layout.audio_offsets.push(pos);
            }
            pos += size.max(5) as u64;
        }

        layout
    }

    fn movie_duration_ms(&self) -> u64 {
        let video = self
            .video
            .as_ref()
            .map_or(0, |v| v.count as u64 * v.frame_duration as u64 * 1000 / v.timescale as u64);
        let audio = self
            .audio
            .as_ref()
            .map_or(0, |a| a.count as u64 * a.frame_duration as u64 * 1000 / a.timescale as u64);
        video.max(audio)
    }

    fn write_moov(&self, buf: &mut BytesMut, layout: &Layout) {
        let moov = begin(buf, b"moov");
        write_mvhd(buf, 1000, self.movie_duration_ms());

        if let Some(video) = &self.video {
            self.write_video_trak(buf, video, &layout.video_offsets);
        }
        if let Some(audio) = &self.audio {
            self.write_audio_trak(buf, audio, &layout.audio_offsets);
        }

        end(buf, moov);
    }

    fn write_video_trak(&self, buf: &mut BytesMut, video: &VideoSpec, offsets: &[u64]) {
        let duration = video.count as u64 * video.frame_duration as u64;
        let trak = begin(buf, b"trak");
        write_tkhd(buf, VIDEO_TRACK_ID, duration, Some((video.width, video.height)));

        let mdia = begin(buf, b"mdia");
        write_mdhd(buf, video.timescale, duration);
        write_hdlr(buf, b"vide");
        let minf = begin(buf, b"minf");
        let stbl = begin(buf, b"stbl");

        // stsd with a single visual sample entry
        let stsd = begin(buf, b"stsd");
        buf.put_u32(0);
        buf.put_u32(1);
        let entry = begin(buf, &video.entry);
        buf.put_slice(&[0; 6]);
        buf.put_u16(1); // data reference index
        buf.put_slice(&[0; 16]);
        buf.put_u16(video.width);
        buf.put_u16(video.height);
        buf.put_u32(0x0048_0000);
        buf.put_u32(0x0048_0000);
        buf.put_u32(0);
        buf.put_u16(1); // frame count
        buf.put_slice(&[0; 32]);
        buf.put_u16(0x0018);
        buf.put_i16(-1);
        let config = begin(buf, &video.config_type);
        buf.put_slice(&video.config);
        end(buf, config);
        end(buf, entry);
        end(buf, stsd);

        write_stts(buf, video.count, video.frame_duration);
        let sync: Vec<u32> = (0..video.count)
            .filter(|i| i % video.gop == 0)
            .map(|i| i + 1)
            .collect();
        write_u32_table(buf, b"stss", &sync);
        write_stsc_one_per_chunk(buf);
        let sizes: Vec<u32> = (0..video.count)
            .map(|i| Self::video_sample_size(i, video.gop) as u32)
            .collect();
        write_stsz(buf, &sizes);
        write_stco(buf, offsets);

        end(buf, stbl);
        end(buf, minf);
        end(buf, mdia);
        end(buf, trak);
    }

    fn write_audio_trak(&self, buf: &mut BytesMut, audio: &AudioSpec, offsets: &[u64]) {
        let duration = audio.count as u64 * audio.frame_duration as u64;
        let trak = begin(buf, b"trak");
        write_tkhd(buf, AUDIO_TRACK_ID, duration, None);

        let mdia = begin(buf, b"mdia");
        write_mdhd(buf, audio.timescale, duration);
        write_hdlr(buf, b"soun");
        let minf = begin(buf, b"minf");
        let stbl = begin(buf, b"stbl");

        let stsd = begin(buf, b"stsd");
        buf.put_u32(0);
        buf.put_u32(1);
        let entry = begin(buf, b"mp4a");
        buf.put_slice(&[0; 6]);
        buf.put_u16(1);
        buf.put_u32(0);
        buf.put_u32(0);
        buf.put_u16(2); // channels
        buf.put_u16(16); // sample size
        buf.put_u16(0);
        buf.put_u16(0);
        buf.put_u32(48000 << 16);
        write_esds(buf, AAC_LC_48K_STEREO);
        end(buf, entry);
        end(buf, stsd);

        write_stts(buf, audio.count, audio.frame_duration);
        write_stsc_one_per_chunk(buf);
        write_stsz(buf, &vec![16; audio.count as usize]);
        write_stco(buf, offsets);

        end(buf, stbl);
        end(buf, minf);
        end(buf, mdia);
        end(buf, trak);
    }
}

fn begin(buf: &mut BytesMut, fourcc: &[u8; 4]) -> usize {
    let start = buf.len();
    buf.put_u32(0); // patched by `end`
    buf.put_slice(fourcc);
    start
}

fn end(buf: &mut BytesMut, start: usize) {
    let size = (buf.len() - start) as u32;
    buf[start..start + 4].copy_from_slice(&size.to_be_bytes());
}

fn write_ftyp(buf: &mut BytesMut) {
    let ftyp = begin(buf, b"ftyp");
    buf.put_slice(b"isom");
    buf.put_u32(0x200);
    for brand in [b"isom", b"iso2", b"avc1", b"mp41"] {
        buf.put_slice(brand);
    }
    end(buf, ftyp);
}

fn write_mdat(buf: &mut BytesMut, payload: &[u8]) {
    let mdat = begin(buf, b"mdat");
    buf.put_slice(payload);
    end(buf, mdat);
}

fn write_mvhd(buf: &mut BytesMut, timescale: u32, duration: u64) {
    let mvhd = begin(buf, b"mvhd");
    buf.put_u32(0); // version 0
    buf.put_u32(0);
    buf.put_u32(0);
    buf.put_u32(timescale);
    buf.put_u32(duration as u32);
    buf.put_u32(0x0001_0000); // rate
    buf.put_u16(0x0100); // volume
    buf.put_slice(&[0; 10]);
    for value in [0x0001_0000u32, 0, 0, 0, 0x0001_0000, 0, 0, 0, 0x4000_0000] {
        buf.put_u32(value);
    }
    buf.put_slice(&[0; 24]);
    buf.put_u32(3); // next track ID
    end(buf, mvhd);
}

fn write_tkhd(buf: &mut BytesMut, track_id: u32, duration: u64, size: Option<(u16, u16)>) {
    let tkhd = begin(buf, b"tkhd");
    buf.put_u32(0x0000_0007); // version 0, enabled | in_movie | in_preview
    buf.put_u32(0);
    buf.put_u32(0);
    buf.put_u32(track_id);
    buf.put_u32(0);
    buf.put_u32(duration as u32);
    buf.put_u64(0);
    buf.put_u16(0); // layer
    buf.put_u16(0); // alternate group
    buf.put_u16(if size.is_some() { 0 } else { 0x0100 });
    buf.put_u16(0);
    for value in [0x0001_0000u32, 0, 0, 0, 0x0001_0000, 0, 0, 0, 0x4000_0000] {
        buf.put_u32(value);
    }
    let (w, h) = size.unwrap_or((0, 0));
    buf.put_u32((w as u32) << 16);
    buf.put_u32((h as u32) << 16);
    end(buf, tkhd);
}

fn write_mdhd(buf: &mut BytesMut, timescale: u32, duration: u64) {
    let mdhd = begin(buf, b"mdhd");
    buf.put_u32(0);
    buf.put_u32(0);
    buf.put_u32(0);
    buf.put_u32(timescale);
    buf.put_u32(duration as u32);
    buf.put_u16(0x55c4); // und
    buf.put_u16(0);
    end(buf, mdhd);
}

fn write_hdlr(buf: &mut BytesMut, handler: &[u8; 4]) {
    let hdlr = begin(buf, b"hdlr");
    buf.put_u32(0);
    buf.put_u32(0);
    buf.put_slice(handler);
    buf.put_slice(&[0; 12]);
    buf.put_slice(b"framepull\0");
    end(buf, hdlr);
}

fn write_esds(buf: &mut BytesMut, asc: &[u8]) {
    let esds = begin(buf, b"esds");
    buf.put_u32(0);

    let dcd_len = 13 + 2 + asc.len();
    let es_len = 3 + 2 + dcd_len + 3;

    buf.put_u8(0x03);
    buf.put_u8(es_len as u8);
    buf.put_u16(1); // ES_ID
    buf.put_u8(0); // flags

    buf.put_u8(0x04);
    buf.put_u8(dcd_len as u8);
    buf.put_u8(0x40); // MPEG-4 audio
    buf.put_u8(0x15); // audio stream
    buf.put_slice(&[0, 0, 0]);
    buf.put_u32(128_000);
    buf.put_u32(128_000);

    buf.put_u8(0x05);
    buf.put_u8(asc.len() as u8);
    buf.put_slice(asc);

    buf.put_slice(&[0x06, 0x01, 0x02]);
    end(buf, esds);
}

fn write_stts(buf: &mut BytesMut, count: u32, delta: u32) {
    let stts = begin(buf, b"stts");
    buf.put_u32(0);
    buf.put_u32(1);
    buf.put_u32(count);
    buf.put_u32(delta);
    end(buf, stts);
}

fn write_stsc_one_per_chunk(buf: &mut BytesMut) {
    let stsc = begin(buf, b"stsc");
    buf.put_u32(0);
    buf.put_u32(1);
    buf.put_u32(1); // first chunk
    buf.put_u32(1); // samples per chunk
    buf.put_u32(1); // sample description index
    end(buf, stsc);
}

fn write_u32_table(buf: &mut BytesMut, fourcc: &[u8; 4], values: &[u32]) {
    let table = begin(buf, fourcc);
    buf.put_u32(0);
    buf.put_u32(values.len() as u32);
    for value in values {
        buf.put_u32(*value);
    }
    end(buf, table);
}

fn write_stsz(buf: &mut BytesMut, sizes: &[u32]) {
    let stsz = begin(buf, b"stsz");
    buf.put_u32(0);
    buf.put_u32(0); // per-sample sizes follow
    buf.put_u32(sizes.len() as u32);
    for size in sizes {
        buf.put_u32(*size);
    }
    end(buf, stsz);
}

fn write_stco(buf: &mut BytesMut, offsets: &[u64]) {
    let values: Vec<u32> = offsets.iter().map(|o| *o as u32).collect();
    write_u32_table(buf, b"stco", &values);
}
