//! # ffembed-av
//!
//! Run FFmpeg's command-line tools (`ffmpeg`, `ffprobe`) as in-process library
//! calls instead of subprocesses.
//!
//! This crate provides:
//! - Entry dispatch to the tools' `main` functions, callable repeatedly in one
//!   process (global tool state is reset before every run)
//! - Capture of everything a run prints to stdout/stderr into a bounded buffer
//! - Forwarding of FFmpeg's `av_log` records to a registered listener
//!
//! ## Concurrency
//!
//! A run redirects the process's stdout/stderr descriptors, which are shared by
//! every thread. Runs are therefore serialized by a process-wide lock; see
//! [`exclusive`] to hold it across several calls.
//!
//! ## Features
//!
//! - `native-ffmpeg` - Install the log bridge as FFmpeg's `av_log` callback
//! - `fftools` - Link the fftools entry points and enable [`run_ffmpeg`],
//!   [`run_ffprobe`] and their captured forms
//!
//! ## Example
//!
//! ```no_run
//! # #[cfg(feature = "fftools")]
//! # fn main() -> ffembed_av::Result<()> {
//! use std::sync::Arc;
//!
//! ffembed_av::set_logger(Some(Arc::new(|level: i32, message: &str| {
//!     eprint!("[{level}] {message}");
//! })));
//!
//! let captured = ffembed_av::run_ffprobe_captured(&["ffprobe", "-version"], 256)?;
//! assert!(captured.output.len() < 256);
//! println!("{}", captured.output);
//! # Ok(())
//! # }
//! # #[cfg(not(feature = "fftools"))]
//! # fn main() {}
//! ```

pub mod capture;
mod dispatch;
mod error;
pub mod level;
pub mod lifecycle;
pub mod log_bridge;
pub mod tools;

// Re-exports
pub use capture::{CaptureOutcome, Captured, ChannelKind};
pub use dispatch::{exclusive, InvocationGuard, ToolRunner};
pub use error::{Error, Result};
pub use level::LogLevel;
pub use lifecycle::Lifecycle;
pub use log_bridge::{
    log_level, log_to_tracing, set_context_prefix, set_log_level, set_logger, LogListener,
};
pub use tools::{Argv, Tool, ToolLibrary};

#[cfg(feature = "fftools")]
pub use tools::LinkedFftools;

#[cfg(feature = "fftools")]
fn linked_runner() -> &'static ToolRunner {
    static RUNNER: std::sync::OnceLock<ToolRunner> = std::sync::OnceLock::new();
    RUNNER.get_or_init(ToolRunner::linked)
}

/// Run `ffmpeg` with output going to the real process streams.
#[cfg(feature = "fftools")]
pub fn run_ffmpeg<S: AsRef<str>>(args: &[S]) -> Result<i32> {
    linked_runner().run_ffmpeg(args)
}

/// Run `ffmpeg` and capture its output into a `capacity`-byte buffer.
#[cfg(feature = "fftools")]
pub fn run_ffmpeg_captured<S: AsRef<str>>(args: &[S], capacity: usize) -> Result<Captured> {
    linked_runner().run_ffmpeg_captured(args, capacity)
}

/// Run `ffprobe` with output going to the real process streams.
#[cfg(feature = "fftools")]
pub fn run_ffprobe<S: AsRef<str>>(args: &[S]) -> Result<i32> {
    linked_runner().run_ffprobe(args)
}

/// Run `ffprobe` and capture its output into a `capacity`-byte buffer.
#[cfg(feature = "fftools")]
pub fn run_ffprobe_captured<S: AsRef<str>>(args: &[S], capacity: usize) -> Result<Captured> {
    linked_runner().run_ffprobe_captured(args, capacity)
}
