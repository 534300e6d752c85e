//! The wrapped command-line tools and the seam to the library providing them.

use crate::{Error, Result};
use libc::{c_char, c_int};
use std::ffi::{CStr, CString};
use std::fmt;

/// Which entry point to invoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tool {
    /// The primary transcoding tool.
    Ffmpeg,
    /// The probe/inspect tool.
    Ffprobe,
}

impl Tool {
    /// Name the tool reports in its own diagnostics unless overridden.
    pub const fn default_program_name(self) -> &'static str {
        match self {
            Tool::Ffmpeg => "ffmpeg",
            Tool::Ffprobe => "ffprobe",
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.default_program_name())
    }
}

/// A library exporting the tools' `main` functions.
///
/// Implementations must be callable repeatedly in one process: [`reset`]
/// runs before every [`main`] and must bring the library's global state back
/// to its post-initialization baseline.
///
/// [`reset`]: ToolLibrary::reset
/// [`main`]: ToolLibrary::main
pub trait ToolLibrary: Send + Sync {
    /// Run the tool's `main` with the given argument vector and return its
    /// exit code.
    fn main(&self, tool: Tool, argv: &mut Argv) -> i32;

    /// Reset tool-global state.
    fn reset(&self);

    /// Set the program name used in the tool's diagnostics.
    fn set_program_name(&self, _tool: Tool, _name: &CStr) {}
}

/// An owned C argument vector: `argc` strings plus a trailing NULL.
pub struct Argv {
    ptrs: Vec<*mut c_char>,
}

impl Argv {
    /// Build an argument vector, rejecting arguments with interior NUL bytes.
    pub fn new<S: AsRef<str>>(args: &[S]) -> Result<Self> {
        let strings = args
            .iter()
            .enumerate()
            .map(|(index, arg)| {
                CString::new(arg.as_ref())
                    .map_err(|e| Error::invalid_argument(index, e.to_string()))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut ptrs: Vec<*mut c_char> = strings.into_iter().map(CString::into_raw).collect();
        ptrs.push(std::ptr::null_mut());

        Ok(Self { ptrs })
    }

    /// Number of arguments, excluding the trailing NULL.
    pub fn argc(&self) -> c_int {
        (self.ptrs.len() - 1) as c_int
    }

    /// Pointer suitable for a C `char *argv[]` parameter.
    pub fn as_mut_ptr(&mut self) -> *mut *mut c_char {
        self.ptrs.as_mut_ptr()
    }

    /// The arguments as Rust strings.
    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        self.ptrs[..self.ptrs.len() - 1].iter().map(|&ptr| {
            // SAFETY: every non-terminal pointer came from CString::into_raw
            // and is released only in Drop.
            let arg = unsafe { CStr::from_ptr(ptr) };
            arg.to_str().unwrap_or_default()
        })
    }

    pub fn is_empty(&self) -> bool {
        self.argc() == 0
    }
}

impl Drop for Argv {
    fn drop(&mut self) {
        for &ptr in &self.ptrs[..self.ptrs.len() - 1] {
            // SAFETY: reclaims the allocation handed out by into_raw.
            drop(unsafe { CString::from_raw(ptr) });
        }
    }
}

impl fmt::Debug for Argv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

#[cfg(feature = "fftools")]
pub use linked::LinkedFftools;

#[cfg(feature = "fftools")]
mod linked {
    use super::{Argv, Tool, ToolLibrary};
    use libc::{c_char, c_int};
    use std::ffi::CStr;

    // fftools/ffmpeg.c and fftools/ffprobe.c compiled with -Dmain=ffmpeg_main
    // and -Dmain=ffprobe_main, plus the reset and program-name hooks.
    #[link(name = "fftools")]
    extern "C" {
        fn ffmpeg_main(argc: c_int, argv: *mut *mut c_char) -> c_int;
        fn ffprobe_main(argc: c_int, argv: *mut *mut c_char) -> c_int;
        fn ffmpeg_reset();
        fn ffmpeg_set_program_name(name: *const c_char);
    }

    /// The fftools entry points linked into this process.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct LinkedFftools;

    impl ToolLibrary for LinkedFftools {
        fn main(&self, tool: Tool, argv: &mut Argv) -> i32 {
            let argc = argv.argc();
            // SAFETY: argv is a NULL-terminated array of argc valid C strings
            // that outlives the call.
            unsafe {
                match tool {
                    Tool::Ffmpeg => ffmpeg_main(argc, argv.as_mut_ptr()),
                    Tool::Ffprobe => ffprobe_main(argc, argv.as_mut_ptr()),
                }
            }
        }

        fn reset(&self) {
            // SAFETY: the hook only reinitialises fftools globals.
            unsafe { ffmpeg_reset() }
        }

        fn set_program_name(&self, _tool: Tool, name: &CStr) {
            // SAFETY: the hook copies the string before returning.
            unsafe { ffmpeg_set_program_name(name.as_ptr()) }
        }
    }
}
