//! Capturing the output of an in-process tool run.
//!
//! Standard output and standard error are process-wide: the tools write
//! straight to descriptors 1 and 2. To capture a run, both descriptors are
//! pointed at a private channel for its duration and restored afterwards.
//! Restoration lives in [`Redirection`]'s `Drop`, so it also happens when the
//! entry point panics.
//!
//! Capture never fails a run. If the channel or the redirection cannot be
//! set up, the tool runs uncaptured and the buffer is left empty.
//!
//! Callers must hold the invocation lock (see [`crate::exclusive`]).

mod channel;

pub use channel::ChannelKind;

use crate::lifecycle::Lifecycle;
use crate::tools::{Argv, Tool, ToolLibrary};
use channel::Channel;
use std::ffi::CStr;
use std::io::{self, Write};
use std::os::fd::{AsRawFd, BorrowedFd, OwnedFd, RawFd};

/// Result of a run into a caller-provided buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureOutcome {
    /// The tool's exit code, unmodified.
    pub exit_code: i32,
    /// Bytes written to the buffer; `buffer[len]` is NUL.
    pub len: usize,
    /// More output was produced than fit in the buffer.
    pub truncated: bool,
    /// Channel used, or `None` if the run was not captured.
    pub channel: Option<ChannelKind>,
}

impl CaptureOutcome {
    fn uncaptured(exit_code: i32) -> Self {
        Self {
            exit_code,
            len: 0,
            truncated: false,
            channel: None,
        }
    }
}

/// Result of a captured run with the output decoded as text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Captured {
    /// The tool's exit code, unmodified.
    pub exit_code: i32,
    /// Interleaved stdout and stderr text, shorter than the capacity in bytes.
    pub output: String,
    /// More output was produced than fit.
    pub truncated: bool,
    /// Channel used, or `None` if the run was not captured.
    pub channel: Option<ChannelKind>,
}

impl Captured {
    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Prepare the lifecycle and call the entry point, output going to the
/// current process streams.
pub(crate) fn run_direct(
    library: &dyn ToolLibrary,
    tool: Tool,
    argv: &mut Argv,
    program_name: &CStr,
) -> i32 {
    Lifecycle::global().prepare(library, tool, program_name);
    library.main(tool, argv)
}

/// Run with stdout/stderr captured into `buffer`.
///
/// An empty buffer means no capture. The buffer always ends up
/// NUL-terminated when it has room for it.
pub(crate) fn run_captured_into(
    library: &dyn ToolLibrary,
    tool: Tool,
    argv: &mut Argv,
    program_name: &CStr,
    buffer: &mut [u8],
    kind: ChannelKind,
) -> CaptureOutcome {
    if buffer.is_empty() {
        return CaptureOutcome::uncaptured(run_direct(library, tool, argv, program_name));
    }
    buffer[0] = 0;

    let mut channel = match Channel::open(kind, buffer.len()) {
        Ok(channel) => channel,
        Err(e) => {
            tracing::warn!("Failed to open capture channel, running {} uncaptured: {}", tool, e);
            return CaptureOutcome::uncaptured(run_direct(library, tool, argv, program_name));
        }
    };

    let installed = match channel.write_fd() {
        Some(target) => Redirection::install(target),
        None => Err(io::Error::new(io::ErrorKind::BrokenPipe, "capture channel has no writer")),
    };
    let redirection = match installed {
        Ok(redirection) => redirection,
        Err(e) => {
            tracing::warn!("Failed to redirect output, running {} uncaptured: {}", tool, e);
            return CaptureOutcome::uncaptured(run_direct(library, tool, argv, program_name));
        }
    };
    channel.close_writer();

    let exit_code = run_direct(library, tool, argv, program_name);

    drop(redirection);

    let used = channel.kind();
    let (len, truncated) = channel.drain_into(buffer);
    tracing::debug!(
        tool = %tool,
        exit_code,
        captured = len,
        truncated,
        channel = %used,
        "Captured tool output"
    );

    CaptureOutcome {
        exit_code,
        len,
        truncated,
        channel: Some(used),
    }
}

/// Run with output captured into a fresh buffer of `capacity` bytes.
pub(crate) fn run_captured(
    library: &dyn ToolLibrary,
    tool: Tool,
    argv: &mut Argv,
    program_name: &CStr,
    capacity: usize,
    kind: ChannelKind,
) -> Captured {
    let mut buffer = vec![0u8; capacity];
    let outcome = run_captured_into(library, tool, argv, program_name, &mut buffer, kind);

    Captured {
        exit_code: outcome.exit_code,
        output: bounded_text(&buffer[..outcome.len], capacity.saturating_sub(1)),
        truncated: outcome.truncated,
        channel: outcome.channel,
    }
}

/// Decode captured bytes, keeping the result within `limit` bytes.
///
/// Lossy decoding can grow the text, and a truncated buffer can end inside
/// a multi-byte character; the cut lands on a char boundary.
fn bounded_text(bytes: &[u8], limit: usize) -> String {
    let mut text = String::from_utf8_lossy(bytes).into_owned();
    if text.len() > limit {
        let mut cut = limit;
        while !text.is_char_boundary(cut) {
            cut -= 1;
        }
        text.truncate(cut);
    }
    text
}

/// Saved stdout/stderr targets; restored on drop.
struct Redirection {
    saved_stdout: OwnedFd,
    saved_stderr: OwnedFd,
}

impl Redirection {
    /// Point descriptors 1 and 2 at `target`.
    fn install(target: BorrowedFd<'_>) -> io::Result<Self> {
        flush_std_streams();

        let saved_stdout = duplicate(libc::STDOUT_FILENO)?;
        let saved_stderr = duplicate(libc::STDERR_FILENO)?;
        // From here on, dropping `redirection` undoes any partial install.
        let redirection = Self {
            saved_stdout,
            saved_stderr,
        };

        redirect(target.as_raw_fd(), libc::STDOUT_FILENO)?;
        redirect(target.as_raw_fd(), libc::STDERR_FILENO)?;

        Ok(redirection)
    }
}

impl Drop for Redirection {
    fn drop(&mut self) {
        flush_std_streams();
        // Nothing can be reported from here; the streams are ours to fix.
        let _ = redirect(self.saved_stdout.as_raw_fd(), libc::STDOUT_FILENO);
        let _ = redirect(self.saved_stderr.as_raw_fd(), libc::STDERR_FILENO);
    }
}

fn duplicate(fd: RawFd) -> io::Result<OwnedFd> {
    // SAFETY: descriptors 1 and 2 stay open for the life of the process.
    unsafe { BorrowedFd::borrow_raw(fd) }.try_clone_to_owned()
}

fn redirect(src: RawFd, dst: RawFd) -> io::Result<()> {
    loop {
        // SAFETY: dup2 only replaces what `dst` refers to.
        if unsafe { libc::dup2(src, dst) } != -1 {
            return Ok(());
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}

/// Push out anything buffered in Rust's or C's stdio.
fn flush_std_streams() {
    let _ = io::stdout().flush();
    let _ = io::stderr().flush();
    // SAFETY: fflush(NULL) flushes every open C output stream.
    unsafe {
        libc::fflush(std::ptr::null_mut());
    }
}
