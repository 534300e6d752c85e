//! Entry dispatch: the public way to run a tool.

use crate::capture::{self, CaptureOutcome, Captured, ChannelKind};
use crate::tools::{Argv, Tool, ToolLibrary};
use crate::{Error, Result};
use parking_lot::{ReentrantMutex, ReentrantMutexGuard};
use std::ffi::{CStr, CString};
use std::sync::Arc;

static INVOCATION: ReentrantMutex<()> = parking_lot::const_reentrant_mutex(());

/// Proof that the caller holds the process-wide invocation lock.
///
/// Returned by [`exclusive`]. Dropping it releases the lock.
#[must_use = "the lock is released when the guard is dropped"]
pub struct InvocationGuard {
    _guard: ReentrantMutexGuard<'static, ()>,
}

/// Acquire the process-wide invocation lock.
///
/// Tool runs redirect process-wide descriptors and drive process-wide tool
/// state, so at most one may execute at a time. Every [`ToolRunner`] call
/// takes this lock itself; holding the guard lets a caller keep other threads
/// out across several calls, or while it inspects stdout/stderr. The lock is
/// reentrant: calls made by the holding thread proceed.
pub fn exclusive() -> InvocationGuard {
    InvocationGuard {
        _guard: INVOCATION.lock(),
    }
}

/// Runs the tools of one [`ToolLibrary`].
///
/// # Example
///
/// ```no_run
/// # #[cfg(feature = "fftools")]
/// # fn main() -> ffembed_av::Result<()> {
/// use ffembed_av::ToolRunner;
///
/// let runner = ToolRunner::linked();
/// let captured = runner.run_ffprobe_captured(&["ffprobe", "-version"], 4096)?;
/// println!("exit {}: {}", captured.exit_code, captured.output);
/// # Ok(())
/// # }
/// # #[cfg(not(feature = "fftools"))]
/// # fn main() {}
/// ```
#[derive(Clone)]
pub struct ToolRunner {
    library: Arc<dyn ToolLibrary>,
    channel: ChannelKind,
    ffmpeg_name: CString,
    ffprobe_name: CString,
}

impl ToolRunner {
    /// Create a runner with default program names and a temp-file channel.
    pub fn new(library: impl ToolLibrary + 'static) -> Self {
        Self::from_arc(Arc::new(library))
    }

    /// Create a runner sharing an existing library handle.
    pub fn from_arc(library: Arc<dyn ToolLibrary>) -> Self {
        Self {
            library,
            channel: ChannelKind::default(),
            ffmpeg_name: default_name(Tool::Ffmpeg),
            ffprobe_name: default_name(Tool::Ffprobe),
        }
    }

    /// Runner over the fftools linked into this binary.
    #[cfg(feature = "fftools")]
    pub fn linked() -> Self {
        Self::new(crate::tools::LinkedFftools)
    }

    /// Use a different capture channel.
    pub fn with_channel(mut self, channel: ChannelKind) -> Self {
        self.channel = channel;
        self
    }

    /// Override the program name a tool reports in its diagnostics.
    pub fn with_program_name(mut self, tool: Tool, name: &str) -> Result<Self> {
        if name.is_empty() {
            return Err(Error::invalid_program_name(name, "empty"));
        }
        let name =
            CString::new(name).map_err(|e| Error::invalid_program_name(name, e.to_string()))?;
        match tool {
            Tool::Ffmpeg => self.ffmpeg_name = name,
            Tool::Ffprobe => self.ffprobe_name = name,
        }
        Ok(self)
    }

    pub fn channel(&self) -> ChannelKind {
        self.channel
    }

    /// Program name used for `tool`.
    pub fn program_name(&self, tool: Tool) -> &CStr {
        match tool {
            Tool::Ffmpeg => &self.ffmpeg_name,
            Tool::Ffprobe => &self.ffprobe_name,
        }
    }

    /// Run `tool` with output going to the real process streams.
    ///
    /// Returns the tool's exit code unmodified.
    pub fn run<S: AsRef<str>>(&self, tool: Tool, args: &[S]) -> Result<i32> {
        let mut argv = Argv::new(args)?;
        let _lock = exclusive();

        tracing::debug!(tool = %tool, argc = argv.argc(), "Running tool");
        let exit_code = capture::run_direct(
            self.library.as_ref(),
            tool,
            &mut argv,
            self.program_name(tool),
        );
        tracing::debug!(tool = %tool, exit_code, "Tool finished");

        Ok(exit_code)
    }

    /// Run `tool` with stdout/stderr captured into a `capacity`-byte buffer.
    ///
    /// The returned text is shorter than `capacity` bytes; excess output is
    /// dropped and flagged in [`Captured::truncated`]. A capacity of zero runs
    /// the tool uncaptured.
    pub fn run_captured<S: AsRef<str>>(
        &self,
        tool: Tool,
        args: &[S],
        capacity: usize,
    ) -> Result<Captured> {
        let mut argv = Argv::new(args)?;
        let _lock = exclusive();

        tracing::debug!(tool = %tool, argc = argv.argc(), capacity, "Running tool captured");
        Ok(capture::run_captured(
            self.library.as_ref(),
            tool,
            &mut argv,
            self.program_name(tool),
            capacity,
            self.channel,
        ))
    }

    /// Run `tool` with stdout/stderr captured into a caller-owned buffer.
    ///
    /// On return `buffer[outcome.len]` is NUL. An empty buffer runs the tool
    /// uncaptured.
    pub fn run_captured_into<S: AsRef<str>>(
        &self,
        tool: Tool,
        args: &[S],
        buffer: &mut [u8],
    ) -> Result<CaptureOutcome> {
        let mut argv = Argv::new(args)?;
        let _lock = exclusive();

        tracing::debug!(
            tool = %tool,
            argc = argv.argc(),
            capacity = buffer.len(),
            "Running tool captured"
        );
        Ok(capture::run_captured_into(
            self.library.as_ref(),
            tool,
            &mut argv,
            self.program_name(tool),
            buffer,
            self.channel,
        ))
    }

    /// Run the transcoding tool.
    pub fn run_ffmpeg<S: AsRef<str>>(&self, args: &[S]) -> Result<i32> {
        self.run(Tool::Ffmpeg, args)
    }

    /// Run the transcoding tool with captured output.
    pub fn run_ffmpeg_captured<S: AsRef<str>>(
        &self,
        args: &[S],
        capacity: usize,
    ) -> Result<Captured> {
        self.run_captured(Tool::Ffmpeg, args, capacity)
    }

    /// Run the probe tool.
    pub fn run_ffprobe<S: AsRef<str>>(&self, args: &[S]) -> Result<i32> {
        self.run(Tool::Ffprobe, args)
    }

    /// Run the probe tool with captured output.
    pub fn run_ffprobe_captured<S: AsRef<str>>(
        &self,
        args: &[S],
        capacity: usize,
    ) -> Result<Captured> {
        self.run_captured(Tool::Ffprobe, args, capacity)
    }
}

impl std::fmt::Debug for ToolRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRunner")
            .field("channel", &self.channel)
            .field("ffmpeg_name", &self.ffmpeg_name)
            .field("ffprobe_name", &self.ffprobe_name)
            .finish_non_exhaustive()
    }
}

fn default_name(tool: Tool) -> CString {
    CString::new(tool.default_program_name()).unwrap_or_default()
}
