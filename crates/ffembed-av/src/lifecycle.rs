//! Process-wide init/reset lifecycle of the wrapped tools.
//!
//! The fftools are written as programs: they expect to start in a fresh
//! process. [`Lifecycle`] makes them restartable. Logging is wired into
//! FFmpeg once per process, and tool state is reset immediately before every
//! run so that each call behaves like an independent process start.

use crate::log_bridge;
use crate::tools::{Tool, ToolLibrary};
use parking_lot::Mutex;
use std::ffi::{CStr, CString};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Once;

static LIFECYCLE: Lifecycle = Lifecycle::new();

/// Explicit state of the wrapped library's process lifetime.
pub struct Lifecycle {
    logging: Once,
    installs: AtomicUsize,
    runs: AtomicU64,
    program_name: Mutex<Option<CString>>,
}

impl Lifecycle {
    const fn new() -> Self {
        Self {
            logging: Once::new(),
            installs: AtomicUsize::new(0),
            runs: AtomicU64::new(0),
            program_name: parking_lot::const_mutex(None),
        }
    }

    /// The process-wide instance.
    pub fn global() -> &'static Lifecycle {
        &LIFECYCLE
    }

    /// Install the log bridge and the current threshold into FFmpeg.
    ///
    /// Only the first call does the work; it returns `true`, every later call
    /// returns `false`.
    pub fn initialize_once(&self) -> bool {
        let mut performed = false;
        self.logging.call_once(|| {
            log_bridge::install();
            self.installs.fetch_add(1, Ordering::AcqRel);
            performed = true;
        });
        performed
    }

    /// Reset tool-global state and set the program name for the next run.
    pub fn reset_before_each_run(
        &self,
        library: &dyn ToolLibrary,
        tool: Tool,
        program_name: &CStr,
    ) {
        library.reset();
        library.set_program_name(tool, program_name);
        *self.program_name.lock() = Some(program_name.to_owned());
        self.runs.fetch_add(1, Ordering::AcqRel);
    }

    /// Everything that has to happen right before an entry point is called.
    pub fn prepare(&self, library: &dyn ToolLibrary, tool: Tool, program_name: &CStr) {
        self.initialize_once();
        self.reset_before_each_run(library, tool, program_name);
    }

    /// Whether the log bridge has been installed.
    pub fn is_initialized(&self) -> bool {
        self.logging.is_completed()
    }

    /// How many times the log bridge was installed (0 or 1).
    pub fn install_count(&self) -> usize {
        self.installs.load(Ordering::Acquire)
    }

    /// Number of resets performed, i.e. entry points prepared.
    pub fn runs(&self) -> u64 {
        self.runs.load(Ordering::Acquire)
    }

    /// Program name set for the most recent run.
    pub fn program_name(&self) -> Option<String> {
        self.program_name
            .lock()
            .as_ref()
            .map(|name| name.to_string_lossy().into_owned())
    }
}
