//! Decoder description extraction.
//!
//! Video decoders want the raw configuration record (avcC, hvcC, ...) without
//! its box header. AAC decoders want the AudioSpecificConfig buried inside the
//! esds descriptor tree.

use bytes::Bytes;

use crate::{Error, Result};

const ES_DESCRIPTOR_TAG: u8 = 0x03;
const DECODER_CONFIG_DESCRIPTOR_TAG: u8 = 0x04;
const DECODER_SPECIFIC_INFO_TAG: u8 = 0x05;

/// Strip the box header from a serialized configuration box.
///
/// Handles both the compact 8-byte header and the 16-byte extended form.
/// A box with an empty payload is an error: there is nothing to hand a decoder.
pub fn strip_box_header(config_box: &Bytes) -> Result<Bytes> {
    if config_box.len() <= 8 {
        return Err(Error::invalid_mp4(format!(
            "configuration box too short ({} bytes)",
            config_box.len()
        )));
    }

    let size32 = u32::from_be_bytes([config_box[0], config_box[1], config_box[2], config_box[3]]);
    let header = if size32 == 1 { 16 } else { 8 };

    if config_box.len() <= header {
        return Err(Error::invalid_mp4(format!(
            "configuration box too short ({} bytes)",
            config_box.len()
        )));
    }

    Ok(config_box.slice(header..))
}

/// Fields of the DecoderConfigDescriptor in an esds box.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EsdsConfig {
    /// MPEG-4 object type indication (0x40 for MPEG-4 audio).
    pub object_type_indication: u8,
    /// Stream type (0x05 for audio).
    pub stream_type: u8,
    /// DecoderSpecificInfo payload, the AudioSpecificConfig for AAC.
    pub specific_info: Option<Bytes>,
}

impl EsdsConfig {
    /// Audio object type from the first five bits of the AudioSpecificConfig.
    pub fn audio_object_type(&self) -> Option<u8> {
        let info = self.specific_info.as_ref()?;
        let first = *info.first()?;
        let aot = first >> 3;
        if aot == 31 {
            // Escaped object type: 6 more bits follow
            let second = *info.get(1)?;
            Some(32 + (((first & 0x07) << 3) | (second >> 5)))
        } else {
            Some(aot)
        }
    }
}

/// Extract the AudioSpecificConfig from a serialized esds box.
pub fn audio_specific_config(esds_box: &Bytes) -> Result<Bytes> {
    parse_esds(esds_box)?
        .specific_info
        .ok_or(Error::MissingAtom("DecoderSpecificInfo"))
}

/// Parse the descriptor tree of a serialized esds box (header included).
pub fn parse_esds(esds_box: &Bytes) -> Result<EsdsConfig> {
    let payload = strip_box_header(esds_box)?;
    // version (1) + flags (3)
    if payload.len() < 4 {
        return Err(Error::BufferUnderflow {
            need: 4,
            have: payload.len(),
        });
    }

    let mut cursor = DescriptorCursor::new(payload.slice(4..));
    let (tag, es_len) = cursor.descriptor_header()?;
    if tag != ES_DESCRIPTOR_TAG {
        return Err(Error::invalid_mp4(format!(
            "esds: expected ES_Descriptor, found tag {:#04x}",
            tag
        )));
    }
    let es_end = cursor.pos + es_len;

    cursor.skip(2)?; // ES_ID
    let flags = cursor.u8()?;
    if flags & 0x80 != 0 {
        cursor.skip(2)?; // dependsOn_ES_ID
    }
    if flags & 0x40 != 0 {
        let url_len = cursor.u8()? as usize;
        cursor.skip(url_len)?;
    }
    if flags & 0x20 != 0 {
        cursor.skip(2)?; // OCR_ES_Id
    }

    while cursor.pos < es_end.min(cursor.data.len()) {
        let (tag, len) = cursor.descriptor_header()?;
        let body_start = cursor.pos;

        if tag == DECODER_CONFIG_DESCRIPTOR_TAG {
            let object_type_indication = cursor.u8()?;
            let stream_type = cursor.u8()? >> 2;
            // bufferSizeDB (3) + maxBitrate (4) + avgBitrate (4)
            cursor.skip(11)?;

            let mut specific_info = None;
            let dcd_end = body_start + len;
            while cursor.pos < dcd_end.min(cursor.data.len()) {
                let (inner_tag, inner_len) = cursor.descriptor_header()?;
                if inner_tag == DECODER_SPECIFIC_INFO_TAG {
                    specific_info = Some(cursor.take(inner_len)?);
                    break;
                }
                cursor.skip(inner_len)?;
            }

            return Ok(EsdsConfig {
                object_type_indication,
                stream_type,
                specific_info,
            });
        }

        cursor.seek(body_start + len)?;
    }

    Err(Error::MissingAtom("DecoderConfigDescriptor"))
}

struct DescriptorCursor {
    data: Bytes,
    pos: usize,
}

impl DescriptorCursor {
    fn new(data: Bytes) -> Self {
        Self { data, pos: 0 }
    }

    fn u8(&mut self) -> Result<u8> {
        let byte = *self.data.get(self.pos).ok_or(Error::BufferUnderflow {
            need: self.pos + 1,
            have: self.data.len(),
        })?;
        self.pos += 1;
        Ok(byte)
    }

    fn skip(&mut self, n: usize) -> Result<()> {
        self.seek(self.pos + n)
    }

    fn seek(&mut self, pos: usize) -> Result<()> {
        if pos > self.data.len() {
            return Err(Error::BufferUnderflow {
                need: pos,
                have: self.data.len(),
            });
        }
        self.pos = pos;
        Ok(())
    }

    fn take(&mut self, n: usize) -> Result<Bytes> {
        let start = self.pos;
        self.skip(n)?;
        Ok(self.data.slice(start..start + n))
    }

    /// Tag byte followed by a size of up to four 7-bit groups.
    fn descriptor_header(&mut self) -> Result<(u8, usize)> {
        let tag = self.u8()?;
        let mut len = 0usize;
        for _ in 0..4 {
            let b = self.u8()?;
            len = (len << 7) | (b & 0x7f) as usize;
            if b & 0x80 == 0 {
                break;
            }
        }
        Ok((tag, len))
    }
}
