//! MP4 atom definitions and header parsing.

use bytes::Bytes;

/// Four-character atom type code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct AtomType(pub [u8; 4]);

impl AtomType {
    pub const FTYP: Self = Self(*b"ftyp");
    pub const MOOV: Self = Self(*b"moov");
    pub const MDAT: Self = Self(*b"mdat");
    pub const MVHD: Self = Self(*b"mvhd");
    pub const TRAK: Self = Self(*b"trak");
    pub const TKHD: Self = Self(*b"tkhd");
    pub const MDIA: Self = Self(*b"mdia");
    pub const MDHD: Self = Self(*b"mdhd");
    pub const HDLR: Self = Self(*b"hdlr");
    pub const MINF: Self = Self(*b"minf");
    pub const STBL: Self = Self(*b"stbl");
    pub const STSD: Self = Self(*b"stsd");
    pub const STTS: Self = Self(*b"stts");
    pub const STSS: Self = Self(*b"stss");
    pub const STSC: Self = Self(*b"stsc");
    pub const STSZ: Self = Self(*b"stsz");
    pub const STCO: Self = Self(*b"stco");
    pub const CO64: Self = Self(*b"co64");
    pub const CTTS: Self = Self(*b"ctts");
    pub const FREE: Self = Self(*b"free");
    pub const SKIP: Self = Self(*b"skip");
    pub const UDTA: Self = Self(*b"udta");

    // Sample entries
    pub const AVC1: Self = Self(*b"avc1");
    pub const AVC3: Self = Self(*b"avc3");
    pub const HVC1: Self = Self(*b"hvc1");
    pub const HEV1: Self = Self(*b"hev1");
    pub const VP08: Self = Self(*b"vp08");
    pub const VP09: Self = Self(*b"vp09");
    pub const AV01: Self = Self(*b"av01");
    pub const MP4A: Self = Self(*b"mp4a");

    // Decoder configuration boxes
    pub const AVCC: Self = Self(*b"avcC");
    pub const HVCC: Self = Self(*b"hvcC");
    pub const VPCC: Self = Self(*b"vpcC");
    pub const AV1C: Self = Self(*b"av1C");
    pub const ESDS: Self = Self(*b"esds");

    /// Create from bytes.
    pub fn from_bytes(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    /// Get the 4-char code as a string.
    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.0).unwrap_or("????")
    }

    /// Whether this code names a video decoder configuration box.
    pub fn is_video_config(&self) -> bool {
        matches!(*self, Self::AVCC | Self::HVCC | Self::VPCC | Self::AV1C)
    }
}

impl std::fmt::Display for AtomType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Parsed atom header.
#[derive(Debug, Clone)]
pub struct Atom {
    /// Atom type code.
    pub atom_type: AtomType,
    /// Atom size including header. `None` when the atom extends to the end of input.
    pub size: Option<u64>,
    /// Offset where atom data starts (after header).
    pub data_offset: u64,
    /// Size of the header (8 or 16 bytes).
    pub header_size: u8,
}

impl Atom {
    /// Parse an atom header from the start of `buf`, which sits at `offset`.
    ///
    /// Returns `Ok(None)` when `buf` does not yet hold a complete header.
    pub fn parse_header(buf: &[u8], offset: u64) -> crate::Result<Option<Self>> {
        if buf.len() < 8 {
            return Ok(None);
        }

        let size = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as u64;
        let atom_type = AtomType::from_bytes([buf[4], buf[5], buf[6], buf[7]]);

        let (size, header_size) = match size {
            1 => {
                if buf.len() < 16 {
                    return Ok(None);
                }
                let mut ext = [0u8; 8];
                ext.copy_from_slice(&buf[8..16]);
                (Some(u64::from_be_bytes(ext)), 16u8)
            }
            0 => (None, 8u8),
            n => (Some(n), 8u8),
        };

        if let Some(size) = size {
            if size < header_size as u64 {
                return Err(crate::Error::invalid_mp4(format!(
                    "atom {} at offset {} declares size {} smaller than its header",
                    atom_type, offset, size
                )));
            }
        }

        Ok(Some(Self {
            atom_type,
            size,
            data_offset: offset + header_size as u64,
            header_size,
        }))
    }

    /// Offset of the first byte of the header.
    pub fn start(&self) -> u64 {
        self.data_offset - self.header_size as u64
    }

    /// Get the data size (size - header), if the size is known.
    pub fn data_size(&self) -> Option<u64> {
        self.size.map(|s| s.saturating_sub(self.header_size as u64))
    }

    /// Check if this atom contains child atoms.
    pub fn is_container(&self) -> bool {
        matches!(
            self.atom_type,
            AtomType::MOOV
                | AtomType::TRAK
                | AtomType::MDIA
                | AtomType::MINF
                | AtomType::STBL
                | AtomType::UDTA
        )
    }
}

/// Handler type for a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum HandlerType {
    Video,
    Audio,
    Hint,
    Meta,
    Text,
    Unknown([u8; 4]),
}

impl HandlerType {
    pub fn from_bytes(bytes: [u8; 4]) -> Self {
        match &bytes {
            b"vide" => Self::Video,
            b"soun" => Self::Audio,
            b"hint" => Self::Hint,
            b"meta" => Self::Meta,
            b"text" => Self::Text,
            _ => Self::Unknown(bytes),
        }
    }

    pub fn is_video(&self) -> bool {
        matches!(self, Self::Video)
    }

    pub fn is_audio(&self) -> bool {
        matches!(self, Self::Audio)
    }
}

/// Track metadata extracted from a trak atom.
///
/// Immutable once the movie header has been parsed. Sample tables are kept
/// by the parser; this is the part callers see.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct Track {
    /// Track ID.
    pub track_id: u32,
    /// Handler type (video/audio/etc).
    pub handler_type: HandlerType,
    /// Track duration in media timescale.
    pub duration: u64,
    /// Media timescale (ticks per second for this track).
    pub timescale: u32,
    /// Number of samples in the track.
    pub sample_count: u32,
    /// Sample entry code (avc1, hvc1, mp4a, ...).
    pub sample_entry: AtomType,
    /// Codec string as understood by decoders (e.g. `avc1.64001f`).
    pub codec: String,
    /// Raw decoder configuration box, header included (avcC, hvcC, vpcC, av1C or esds).
    #[cfg_attr(feature = "serialize", serde(skip))]
    pub config_box: Option<Bytes>,
    /// Display width from the track header (video only).
    pub width: Option<u32>,
    /// Display height from the track header (video only).
    pub height: Option<u32>,
    /// Coded width from the visual sample entry.
    pub coded_width: Option<u32>,
    /// Coded height from the visual sample entry.
    pub coded_height: Option<u32>,
    /// Sample rate (audio only).
    pub sample_rate: Option<u32>,
    /// Channel count (audio only).
    pub channels: Option<u16>,
}

impl Track {
    /// Create empty track info.
    pub fn new(track_id: u32) -> Self {
        Self {
            track_id,
            handler_type: HandlerType::Unknown([0; 4]),
            duration: 0,
            timescale: 1,
            sample_count: 0,
            sample_entry: AtomType([0; 4]),
            codec: String::new(),
            config_box: None,
            width: None,
            height: None,
            coded_width: None,
            coded_height: None,
            sample_rate: None,
            channels: None,
        }
    }

    /// Get duration in seconds.
    pub fn duration_secs(&self) -> f64 {
        if self.timescale == 0 {
            0.0
        } else {
            self.duration as f64 / self.timescale as f64
        }
    }

    /// Decoder-specific description for this track.
    ///
    /// Video tracks yield the configuration box payload with its header
    /// stripped; audio tracks yield the AudioSpecificConfig carried in esds.
    pub fn decoder_description(&self) -> crate::Result<Bytes> {
        let config = self.config_box.as_ref().ok_or_else(|| {
            if self.handler_type.is_audio() {
                crate::Error::MissingAtom("esds")
            } else {
                crate::Error::MissingAtom("avcC/hvcC/vpcC/av1C")
            }
        })?;

        if self.handler_type.is_audio() {
            super::description::audio_specific_config(config)
        } else {
            super::description::strip_box_header(config)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_header_compact() {
        let buf = [0, 0, 0, 24, b'f', b't', b'y', b'p'];
        let atom = Atom::parse_header(&buf, 100).unwrap().unwrap();
        assert_eq!(atom.atom_type, AtomType::FTYP);
        assert_eq!(atom.size, Some(24));
        assert_eq!(atom.data_offset, 108);
        assert_eq!(atom.start(), 100);
        assert_eq!(atom.data_size(), Some(16));
    }

    #[test]
    fn test_parse_header_extended() {
        let mut buf = vec![0, 0, 0, 1, b'm', b'd', b'a', b't'];
        buf.extend_from_slice(&0x1_0000_0000u64.to_be_bytes());
        let atom = Atom::parse_header(&buf, 0).unwrap().unwrap();
        assert_eq!(atom.header_size, 16);
        assert_eq!(atom.size, Some(0x1_0000_0000));

        // Extended size field not yet available
        assert!(Atom::parse_header(&buf[..12], 0).unwrap().is_none());
    }

    #[test]
    fn test_parse_header_to_end() {
        let buf = [0, 0, 0, 0, b'm', b'd', b'a', b't'];
        let atom = Atom::parse_header(&buf, 0).unwrap().unwrap();
        assert_eq!(atom.size, None);
        assert_eq!(atom.data_size(), None);
    }

    #[test]
    fn test_parse_header_rejects_undersized() {
        let buf = [0, 0, 0, 4, b'f', b'r', b'e', b'e'];
        assert!(Atom::parse_header(&buf, 0).is_err());
    }

    #[test]
    fn test_handler_type() {
        assert!(HandlerType::from_bytes(*b"vide").is_video());
        assert!(HandlerType::from_bytes(*b"soun").is_audio());
        assert_eq!(
            HandlerType::from_bytes(*b"abcd"),
            HandlerType::Unknown(*b"abcd")
        );
    }
}
