//! Framepull-Media: incremental MP4 demuxing
//!
//! This crate turns a byte stream into track metadata and elementary-stream
//! samples without needing random access to the source.
//!
//! # Modules
//!
//! - `mp4` - box headers, moov parsing, sample tables, codec strings and
//!   decoder descriptions (avcC/hvcC/vpcC/av1C/esds)
//! - `parser` - the push-driven [`Mp4StreamParser`] and the
//!   [`ContainerParser`] / [`ParserHandler`] contract it implements
//! - `fixture` - synthetic MP4 files (tests and the `fixtures` feature)
//!
//! # Architecture
//!
//! Bytes are appended in file order as they arrive:
//!
//! 1. Top-level boxes are scanned until the moov box is complete
//! 2. moov is parsed into tracks and resolved sample tables
//! 3. The handler is told the tracks are ready
//! 4. Once extraction is started, samples whose payloads are present are
//!    delivered in batches; the handler can pause delivery at any time

pub mod error;
#[cfg(any(test, feature = "fixtures"))]
pub mod fixture;
pub mod mp4;
pub mod parser;

pub use error::{Error, Result};
pub use mp4::{HandlerType, MovieInfo, Track};
pub use parser::{
    ContainerParser, ExtractionOptions, Mp4StreamParser, ParserHandler, Sample, SeekPosition,
};
