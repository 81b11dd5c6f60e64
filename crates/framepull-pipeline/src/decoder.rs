//! Decoder boundary: configuration, decoded frames, and the sink contract.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use framepull_media::mp4::decoder_codec;
use framepull_media::Track;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::chunk::EncodedChunk;
use crate::{Error, Result};

/// Everything a decoder needs before the first chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecoderConfig {
    /// Codec string (`avc1.64001f`, `vp8`, `mp4a.40.2`, ...).
    pub codec: String,
    pub coded_width: Option<u32>,
    pub coded_height: Option<u32>,
    pub sample_rate: Option<u32>,
    pub channel_count: Option<u16>,
    /// Decoder-specific description with the box header stripped.
    pub description: Bytes,
}

impl DecoderConfig {
    /// Build the configuration for `track`.
    ///
    /// Fails with [`Error::Config`] when the track carries no usable
    /// decoder-specific description.
    pub fn for_track(track: &Track) -> Result<Self> {
        let description = track.decoder_description().map_err(|e| {
            Error::config(format!("track {}: {}", track.track_id, e))
        })?;

        Ok(Self {
            codec: decoder_codec(&track.codec).to_string(),
            coded_width: track.coded_width.or(track.width),
            coded_height: track.coded_height.or(track.height),
            sample_rate: track.sample_rate,
            channel_count: track.channels,
            description,
        })
    }

    pub fn is_audio(&self) -> bool {
        self.sample_rate.is_some()
    }
}

/// Live/released counters for decoded frames.
///
/// Shared between a decoder and the frames it produces, so tests and
/// statistics can check that every frame was released exactly once.
#[derive(Debug, Default)]
pub struct FrameLedger {
    live: AtomicUsize,
    released: AtomicUsize,
    leaked: AtomicUsize,
}

impl FrameLedger {
    /// Frames created and not yet released.
    pub fn live(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }

    /// Frames released through [`DecodedFrame::release`].
    pub fn released(&self) -> usize {
        self.released.load(Ordering::Acquire)
    }

    /// Frames dropped without an explicit release.
    pub fn leaked(&self) -> usize {
        self.leaked.load(Ordering::Acquire)
    }
}

/// A decoded frame.
///
/// Must be released exactly once. [`DecodedFrame::release`] consumes the
/// frame; dropping it unreleased still frees it but is logged as a defect.
#[derive(Debug)]
pub struct DecodedFrame {
    timestamp_us: i64,
    duration_us: i64,
    width: u32,
    height: u32,
    data: Bytes,
    ledger: Arc<FrameLedger>,
    released: bool,
}

impl DecodedFrame {
    pub fn new(
        timestamp_us: i64,
        duration_us: i64,
        (width, height): (u32, u32),
        data: Bytes,
        ledger: Arc<FrameLedger>,
    ) -> Self {
        ledger.live.fetch_add(1, Ordering::AcqRel);
        Self {
            timestamp_us,
            duration_us,
            width,
            height,
            data,
            ledger,
            released: false,
        }
    }

    pub fn timestamp_us(&self) -> i64 {
        self.timestamp_us
    }

    pub fn duration_us(&self) -> i64 {
        self.duration_us
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Image (or audio) payload.
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Give the frame's resources back.
    pub fn release(mut self) {
        self.released = true;
        self.ledger.live.fetch_sub(1, Ordering::AcqRel);
        self.ledger.released.fetch_add(1, Ordering::AcqRel);
    }
}

impl Drop for DecodedFrame {
    fn drop(&mut self) {
        if !self.released {
            warn!(
                timestamp_us = self.timestamp_us,
                "Decoded frame dropped without release"
            );
            self.ledger.live.fetch_sub(1, Ordering::AcqRel);
            self.ledger.leaked.fetch_add(1, Ordering::AcqRel);
        }
    }
}

/// What a decoder emits.
#[derive(Debug)]
pub enum DecoderOutput {
    Frame(DecodedFrame),
    Error(String),
}

/// Decoder contract.
///
/// Outputs are delivered on the channel handed to the implementation when it
/// is constructed, in submission order.
pub trait DecodeSink: Send {
    fn is_config_supported(&self, config: &DecoderConfig) -> bool;

    fn configure(&mut self, config: &DecoderConfig) -> Result<()>;

    /// Queue a chunk. Returns immediately; the frame arrives on the output channel.
    fn decode(&mut self, chunk: EncodedChunk) -> Result<()>;

    /// Chunks accepted but not yet turned into output.
    fn decode_queue_size(&self) -> usize;

    /// Drop all queued work. Nothing submitted before the reset is emitted.
    fn reset(&mut self);
}

const SUPPORTED_CODECS: &[&str] = &[
    "avc1", "avc3", "hvc1", "hev1", "vp8", "vp09", "av01", "mp4a",
];

/// Decoder that "decodes" by forwarding the chunk payload as the frame.
///
/// Useful for exercising scheduling end to end without a codec: output
/// order, queue depth, latency and frame release behave like a real decoder.
/// An empty chunk is reported as a decode error.
pub struct PassthroughDecoder {
    outputs: mpsc::UnboundedSender<DecoderOutput>,
    ledger: Arc<FrameLedger>,
    latency: Duration,
    queue: Arc<AtomicUsize>,
    generation: Arc<AtomicU64>,
    work: Option<mpsc::UnboundedSender<(u64, EncodedChunk)>>,
    dimensions: (u32, u32),
}

impl PassthroughDecoder {
    pub fn new(outputs: mpsc::UnboundedSender<DecoderOutput>) -> Self {
        Self {
            outputs,
            ledger: Arc::new(FrameLedger::default()),
            latency: Duration::ZERO,
            queue: Arc::new(AtomicUsize::new(0)),
            generation: Arc::new(AtomicU64::new(0)),
            work: None,
            dimensions: (0, 0),
        }
    }

    /// Simulated per-chunk decode time.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn ledger(&self) -> Arc<FrameLedger> {
        self.ledger.clone()
    }

    fn spawn_worker(&self) -> mpsc::UnboundedSender<(u64, EncodedChunk)> {
        let (tx, mut rx) = mpsc::unbounded_channel::<(u64, EncodedChunk)>();
        let outputs = self.outputs.clone();
        let ledger = self.ledger.clone();
        let latency = self.latency;
        let queue = self.queue.clone();
        let generation = self.generation.clone();
        let dimensions = self.dimensions;

        tokio::spawn(async move {
            while let Some((submitted_in, chunk)) = rx.recv().await {
                if !latency.is_zero() {
                    tokio::time::sleep(latency).await;
                }

                if submitted_in == generation.load(Ordering::Acquire) {
                    let output = if chunk.data.is_empty() {
                        DecoderOutput::Error(format!(
                            "empty chunk at {}us",
                            chunk.timestamp_us
                        ))
                    } else {
                        DecoderOutput::Frame(DecodedFrame::new(
                            chunk.timestamp_us,
                            chunk.duration_us,
                            dimensions,
                            chunk.data,
                            ledger.clone(),
                        ))
                    };
                    // Receiver gone means the session is over
                    if outputs.send(output).is_err() {
                        queue.fetch_sub(1, Ordering::AcqRel);
                        break;
                    }
                }
                queue.fetch_sub(1, Ordering::AcqRel);
            }
        });

        tx
    }
}

impl DecodeSink for PassthroughDecoder {
    fn is_config_supported(&self, config: &DecoderConfig) -> bool {
        SUPPORTED_CODECS
            .iter()
            .any(|prefix| config.codec.starts_with(prefix))
    }

    fn configure(&mut self, config: &DecoderConfig) -> Result<()> {
        if !self.is_config_supported(config) {
            return Err(Error::config(format!("unsupported codec {}", config.codec)));
        }
        self.dimensions = (
            config.coded_width.unwrap_or(0),
            config.coded_height.unwrap_or(0),
        );
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.work = Some(self.spawn_worker());
        debug!(codec = %config.codec, "Passthrough decoder configured");
        Ok(())
    }

    fn decode(&mut self, chunk: EncodedChunk) -> Result<()> {
        let work = self
            .work
            .as_ref()
            .ok_or_else(|| Error::Decode("decoder is not configured".into()))?;

        self.queue.fetch_add(1, Ordering::AcqRel);
        let generation = self.generation.load(Ordering::Acquire);
        work.send((generation, chunk)).map_err(|_| {
            self.queue.fetch_sub(1, Ordering::AcqRel);
            Error::Decode("decoder worker stopped".into())
        })
    }

    fn decode_queue_size(&self) -> usize {
        self.queue.load(Ordering::Acquire)
    }

    fn reset(&mut self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::ChunkType;
    use assert_matches::assert_matches;

    fn config() -> DecoderConfig {
        DecoderConfig {
            codec: "avc1.64001f".into(),
            coded_width: Some(320),
            coded_height: Some(240),
            sample_rate: None,
            channel_count: None,
            description: Bytes::from_static(&[1, 0x64, 0, 0x1f]),
        }
    }

    fn chunk(timestamp_us: i64, data: &'static [u8]) -> EncodedChunk {
        EncodedChunk {
            track_id: 1,
            chunk_type: ChunkType::Key,
            timestamp_us,
            duration_us: 40_000,
            data: Bytes::from_static(data),
        }
    }

    #[test]
    fn test_release_accounting() {
        let ledger = Arc::new(FrameLedger::default());
        let a = DecodedFrame::new(0, 40, (1, 1), Bytes::new(), ledger.clone());
        let b = DecodedFrame::new(40, 40, (1, 1), Bytes::new(), ledger.clone());
        assert_eq!(ledger.live(), 2);

        a.release();
        assert_eq!(ledger.live(), 1);
        assert_eq!(ledger.released(), 1);

        drop(b);
        assert_eq!(ledger.live(), 0);
        assert_eq!(ledger.leaked(), 1);
    }

    fn track_with_config(codec: &str, config_box: Option<Bytes>) -> Track {
        let mut track = Track::new(1);
        track.handler_type = framepull_media::HandlerType::Video;
        track.codec = codec.into();
        track.config_box = config_box;
        track.coded_width = Some(640);
        track.coded_height = Some(360);
        track
    }

    #[test]
    fn test_config_for_track() {
        let mut avcc = vec![0, 0, 0, 12, b'a', b'v', b'c', b'C'];
        avcc.extend_from_slice(&[1, 0x64, 0, 0x1f]);
        let track = track_with_config("avc1.64001f", Some(Bytes::from(avcc)));

        let config = DecoderConfig::for_track(&track).unwrap();
        assert_eq!(config.codec, "avc1.64001f");
        assert_eq!(config.coded_width, Some(640));
        assert_eq!(&config.description[..], &[1, 0x64, 0, 0x1f]);
        assert!(!config.is_audio());
    }

    #[test]
    fn test_vp8_codec_normalized() {
        let mut vpcc = vec![0, 0, 0, 20, b'v', b'p', b'c', b'C'];
        vpcc.extend_from_slice(&[1, 0, 0, 0, 0, 10, 8, 0x10, 1, 1, 1, 0]);
        let track = track_with_config("vp08.00.10.08", Some(Bytes::from(vpcc)));
        assert_eq!(DecoderConfig::for_track(&track).unwrap().codec, "vp8");
    }

    #[test]
    fn test_header_only_config_box() {
        let track = track_with_config(
            "avc1",
            Some(Bytes::from_static(&[0, 0, 0, 8, b'a', b'v', b'c', b'C'])),
        );
        assert_matches!(DecoderConfig::for_track(&track), Err(Error::Config(_)));

        let track = track_with_config("avc1", None);
        assert_matches!(DecoderConfig::for_track(&track), Err(Error::Config(_)));
    }

    #[test]
    fn test_supported_codecs() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let decoder = PassthroughDecoder::new(tx);
        assert!(decoder.is_config_supported(&config()));
        assert!(decoder.is_config_supported(&DecoderConfig {
            codec: "vp8".into(),
            ..config()
        }));
        assert!(!decoder.is_config_supported(&DecoderConfig {
            codec: "tx3g".into(),
            ..config()
        }));
    }

    #[tokio::test]
    async fn test_decode_before_configure() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut decoder = PassthroughDecoder::new(tx);
        assert_matches!(decoder.decode(chunk(0, b"x")), Err(Error::Decode(_)));
    }

    #[tokio::test]
    async fn test_outputs_in_submission_order() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut decoder = PassthroughDecoder::new(tx);
        decoder.configure(&config()).unwrap();

        for ts in [0, 40_000, 80_000] {
            decoder.decode(chunk(ts, b"frame")).unwrap();
        }

        for expected in [0, 40_000, 80_000] {
            match rx.recv().await {
                Some(DecoderOutput::Frame(frame)) => {
                    assert_eq!(frame.timestamp_us(), expected);
                    assert_eq!(frame.width(), 320);
                    frame.release();
                }
                other => panic!("unexpected output: {:?}", other),
            }
        }
        assert_eq!(decoder.ledger().released(), 3);
    }

    #[tokio::test]
    async fn test_empty_chunk_is_decode_error() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut decoder = PassthroughDecoder::new(tx);
        decoder.configure(&config()).unwrap();
        decoder.decode(chunk(0, b"")).unwrap();

        assert_matches!(rx.recv().await, Some(DecoderOutput::Error(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_queue_depth_and_reset() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut decoder = PassthroughDecoder::new(tx).with_latency(Duration::from_millis(10));
        decoder.configure(&config()).unwrap();

        decoder.decode(chunk(0, b"a")).unwrap();
        decoder.decode(chunk(40_000, b"b")).unwrap();
        assert_eq!(decoder.decode_queue_size(), 2);

        decoder.reset();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(decoder.decode_queue_size(), 0);
        assert!(rx.try_recv().is_err());

        decoder.decode(chunk(80_000, b"c")).unwrap();
        match rx.recv().await {
            Some(DecoderOutput::Frame(frame)) => {
                assert_eq!(frame.timestamp_us(), 80_000);
                frame.release();
            }
            other => panic!("unexpected output: {:?}", other),
        }
    }
}
