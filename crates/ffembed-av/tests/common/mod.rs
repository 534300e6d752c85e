//! Shared test harness for the integration tests.
//!
//! Provides [`ScriptedTool`], an in-process [`ToolLibrary`] whose `main`
//! follows instructions passed as arguments, so tests can make a "tool" print
//! to fd 1/2, emit log records, fail, or panic without linking FFmpeg.
//!
//! Recognised arguments (everything else is ignored, including `argv[0]`):
//!
//! - `--stdout=TEXT` / `--stderr=TEXT` - write TEXT through Rust's std streams
//! - `--c-stdout=TEXT` - write TEXT through C's buffered `printf`
//! - `--bulk=N` - write N bytes of `x` to stdout
//! - `--log=LEVEL:TEXT` - forward a log record through the bridge
//! - `--exit=CODE` - return CODE instead of 0
//! - `--panic` - panic after handling the preceding arguments

#![allow(dead_code)]

use std::ffi::{CStr, CString};
use std::io::{Read, Seek, SeekFrom, Write};
use std::os::fd::{AsRawFd, BorrowedFd, OwnedFd, RawFd};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use ffembed_av::{Argv, Tool, ToolLibrary, ToolRunner};
use parking_lot::Mutex;

/// Scripted stand-in for the fftools library.
#[derive(Default)]
pub struct ScriptedTool {
    /// Number of `reset` calls.
    pub resets: AtomicUsize,
    /// Number of `main` calls.
    pub runs: AtomicUsize,
    /// Runs that started without a preceding reset.
    pub dirty_starts: AtomicUsize,
    /// Program names set, in order.
    pub program_names: Mutex<Vec<(Tool, String)>>,
    /// Tools invoked, in order.
    pub invoked: Mutex<Vec<Tool>>,
    // Mimics tool-global state that survives between runs unless reset.
    leftover: Mutex<Vec<String>>,
}

impl ScriptedTool {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn runner(self: &Arc<Self>) -> ToolRunner {
        ToolRunner::from_arc(Arc::clone(self) as Arc<dyn ToolLibrary>)
    }

    pub fn last_program_name(&self) -> Option<String> {
        self.program_names.lock().last().map(|(_, name)| name.clone())
    }
}

impl ToolLibrary for ScriptedTool {
    fn main(&self, tool: Tool, argv: &mut Argv) -> i32 {
        self.runs.fetch_add(1, Ordering::SeqCst);
        self.invoked.lock().push(tool);

        let mut leftover = self.leftover.lock();
        if !leftover.is_empty() {
            self.dirty_starts.fetch_add(1, Ordering::SeqCst);
        }
        leftover.extend(argv.iter().map(str::to_string));
        drop(leftover);

        let mut exit_code = 0;
        for arg in argv.iter() {
            if let Some(text) = arg.strip_prefix("--stdout=") {
                let mut out = std::io::stdout().lock();
                out.write_all(text.as_bytes()).unwrap();
                out.flush().unwrap();
            } else if let Some(text) = arg.strip_prefix("--stderr=") {
                std::io::stderr().write_all(text.as_bytes()).unwrap();
            } else if let Some(text) = arg.strip_prefix("--c-stdout=") {
                let text = CString::new(text).unwrap();
                // SAFETY: "%s" with one C string argument.
                unsafe {
                    libc::printf(c"%s".as_ptr(), text.as_ptr());
                }
            } else if let Some(count) = arg.strip_prefix("--bulk=") {
                let count: usize = count.parse().unwrap();
                let mut out = std::io::stdout().lock();
                // A full pipe reports WouldBlock; the tool keeps going.
                let _ = out.write_all(&vec![b'x'; count]);
                let _ = out.flush();
            } else if let Some(record) = arg.strip_prefix("--log=") {
                let (level, text) = record.split_once(':').unwrap();
                ffembed_av::log_bridge::forward(level.parse().unwrap(), text.as_bytes());
            } else if let Some(code) = arg.strip_prefix("--exit=") {
                exit_code = code.parse().unwrap();
            } else if arg == "--panic" {
                panic!("scripted tool panicked");
            }
        }

        exit_code
    }

    fn reset(&self) {
        self.resets.fetch_add(1, Ordering::SeqCst);
        self.leftover.lock().clear();
    }

    fn set_program_name(&self, tool: Tool, name: &CStr) {
        self.program_names
            .lock()
            .push((tool, name.to_string_lossy().into_owned()));
    }
}

/// Identity of the open file behind a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FdTarget {
    pub dev: u64,
    pub ino: u64,
}

pub fn target_of(fd: RawFd) -> FdTarget {
    // SAFETY: stat is plain old data; fstat fills it in.
    let mut st: libc::stat = unsafe { std::mem::zeroed() };
    let ret = unsafe { libc::fstat(fd, &mut st) };
    assert_eq!(ret, 0, "fstat({fd}) failed: {}", std::io::Error::last_os_error());
    FdTarget {
        dev: st.st_dev as u64,
        ino: st.st_ino as u64,
    }
}

/// Current targets of stdout and stderr.
pub fn std_targets() -> (FdTarget, FdTarget) {
    (target_of(libc::STDOUT_FILENO), target_of(libc::STDERR_FILENO))
}

/// Run `f` with the test process's own stdout pointed at a temp file and
/// return what was written there.
///
/// Callers must hold `ffembed_av::exclusive()`.
pub fn with_stdout_in_file<T>(f: impl FnOnce() -> T) -> (T, String) {
    let mut file = tempfile::tempfile().unwrap();
    // SAFETY: fd 1 is open for the life of the process.
    let saved: OwnedFd = unsafe { BorrowedFd::borrow_raw(libc::STDOUT_FILENO) }
        .try_clone_to_owned()
        .unwrap();

    std::io::stdout().flush().unwrap();
    assert_ne!(unsafe { libc::dup2(file.as_raw_fd(), libc::STDOUT_FILENO) }, -1);

    let result = f();

    std::io::stdout().flush().unwrap();
    assert_ne!(unsafe { libc::dup2(saved.as_raw_fd(), libc::STDOUT_FILENO) }, -1);

    let mut written = String::new();
    file.seek(SeekFrom::Start(0)).unwrap();
    file.read_to_string(&mut written).unwrap();
    (result, written)
}
