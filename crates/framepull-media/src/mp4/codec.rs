//! Codec string derivation (RFC 6381 style) from sample entries.

use bytes::Bytes;

use super::atoms::AtomType;
use super::description::{parse_esds, strip_box_header};

/// Build the codec string for a sample entry and its configuration box.
///
/// Falls back to the bare four-character code when the configuration box is
/// missing or too short to read profile information from.
pub fn codec_string(entry: AtomType, config_box: Option<&Bytes>) -> String {
    let payload = config_box.and_then(|b| strip_box_header(b).ok());
    let fourcc = entry.as_str();

    let derived = match (entry, payload.as_deref()) {
        (AtomType::AVC1 | AtomType::AVC3, Some(avcc)) => avc(fourcc, avcc),
        (AtomType::HVC1 | AtomType::HEV1, Some(hvcc)) => hevc(fourcc, hvcc),
        (AtomType::VP08 | AtomType::VP09, Some(vpcc)) => vpx(fourcc, vpcc),
        (AtomType::AV01, Some(av1c)) => av1(av1c),
        (AtomType::MP4A, _) => Some(mp4a(config_box)),
        _ => None,
    };

    derived.unwrap_or_else(|| fourcc.to_string())
}

/// Codec string to hand a decoder.
///
/// Decoders generally reject the fully qualified VP8 form (`vp08.00.41.08`),
/// so it collapses to plain `vp8`.
pub fn decoder_codec(codec: &str) -> &str {
    if codec.starts_with("vp08") {
        "vp8"
    } else {
        codec
    }
}

fn avc(fourcc: &str, avcc: &[u8]) -> Option<String> {
    // configurationVersion, profile, compatibility, level
    let profile = *avcc.get(1)?;
    let compat = *avcc.get(2)?;
    let level = *avcc.get(3)?;
    Some(format!("{}.{:02x}{:02x}{:02x}", fourcc, profile, compat, level))
}

fn hevc(fourcc: &str, hvcc: &[u8]) -> Option<String> {
    if hvcc.len() < 13 {
        return None;
    }

    let profile_space = hvcc[1] >> 6;
    let tier = (hvcc[1] >> 5) & 0x01;
    let profile_idc = hvcc[1] & 0x1f;
    let compat = u32::from_be_bytes([hvcc[2], hvcc[3], hvcc[4], hvcc[5]]);
    let constraints = &hvcc[6..12];
    let level_idc = hvcc[12];

    let space = match profile_space {
        1 => "A",
        2 => "B",
        3 => "C",
        _ => "",
    };

    let mut out = format!(
        "{}.{}{}.{:x}.{}{}",
        fourcc,
        space,
        profile_idc,
        compat.reverse_bits(),
        if tier == 1 { 'H' } else { 'L' },
        level_idc
    );

    // Trailing zero constraint bytes are omitted
    let used = constraints
        .iter()
        .rposition(|b| *b != 0)
        .map(|i| i + 1)
        .unwrap_or(0);
    for byte in &constraints[..used] {
        out.push_str(&format!(".{:x}", byte));
    }

    Some(out)
}

fn vpx(fourcc: &str, vpcc: &[u8]) -> Option<String> {
    // Full box: version (1) + flags (3) precede the record
    let profile = *vpcc.get(4)?;
    let level = *vpcc.get(5)?;
    let bit_depth = *vpcc.get(6)? >> 4;
    Some(format!(
        "{}.{:02}.{:02}.{:02}",
        fourcc, profile, level, bit_depth
    ))
}

fn av1(av1c: &[u8]) -> Option<String> {
    let b1 = *av1c.get(1)?;
    let b2 = *av1c.get(2)?;

    let profile = b1 >> 5;
    let level = b1 & 0x1f;
    let tier = if b2 & 0x80 != 0 { 'H' } else { 'M' };
    let high_bitdepth = b2 & 0x40 != 0;
    let twelve_bit = b2 & 0x20 != 0;
    let bit_depth = match (high_bitdepth, twelve_bit) {
        (true, true) if profile == 2 => 12,
        (true, _) => 10,
        _ => 8,
    };

    Some(format!("av01.{}.{:02}{}.{:02}", profile, level, tier, bit_depth))
}

fn mp4a(esds_box: Option<&Bytes>) -> String {
    let Some(config) = esds_box.and_then(|b| parse_esds(b).ok()) else {
        return "mp4a".to_string();
    };

    if config.object_type_indication != 0x40 {
        return format!("mp4a.{:x}", config.object_type_indication);
    }

    match config.audio_object_type() {
        Some(aot) => format!("mp4a.40.{}", aot),
        None => "mp4a.40".to_string(),
    }
}
