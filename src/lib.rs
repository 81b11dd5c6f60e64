//! Framepull - pull-driven MP4 demuxing and frame-accurate playback
//!
//! This library crate exposes the binary's building blocks for integration testing.

pub mod config;
pub mod inspect;
pub mod presenter;
pub mod source;
pub mod worker;
