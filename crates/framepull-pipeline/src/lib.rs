//! Framepull-Pipeline: from byte stream to presented frame
//!
//! The stages, in data-flow order:
//!
//! - `feeder` - [`ByteFeeder`] reads a transport in order and tags offsets
//! - `adapter` - [`ContainerAdapter`] turns parser callbacks into sample pulls,
//!   with seek handling and a bounded [`SampleBuffer`]
//! - `chunk` - [`ChunkFactory`] normalizes sample timing to microseconds
//! - `decoder` - the [`DecodeSink`] contract and a pass-through implementation
//! - `scheduler` - [`FrameScheduler`] keeps the decoder fed and picks the
//!   frame to show from the [`FrameWindow`]
//! - `clock` - [`PlaybackClock`] supplies the media time for frame selection
//!
//! Each demuxer runs as its own task; the scheduler is owned by whoever
//! drives playback and is not shared.

pub mod adapter;
pub mod chunk;
pub mod clock;
pub mod decoder;
pub mod error;
pub mod feeder;
pub mod frame_window;
pub mod options;
pub mod sample_buffer;
pub mod scheduler;

pub use adapter::{ContainerAdapter, DemuxState, PullReply, SeekOutcome};
pub use chunk::{ChunkFactory, ChunkType, EncodedChunk};
pub use clock::PlaybackClock;
pub use decoder::{
    DecodeSink, DecodedFrame, DecoderConfig, DecoderOutput, FrameLedger, PassthroughDecoder,
};
pub use error::{Error, Result};
pub use feeder::{ByteFeeder, ByteSource};
pub use frame_window::FrameWindow;
pub use options::{DemuxOptions, SchedulerOptions, SeekPolicy, TimestampMode, TrackSelector};
pub use sample_buffer::SampleBuffer;
pub use scheduler::{
    FillOutcome, FrameScheduler, Presenter, RenderOutcome, SchedulerStats, SubmitOutcome,
};
