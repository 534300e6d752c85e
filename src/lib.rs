//! ffembed - in-process ffmpeg/ffprobe host
//!
//! This library crate exposes the configuration and host layers for
//! integration testing.

pub mod config;
pub mod host;
