//! Bridge from FFmpeg's logging facility to a registered listener.
//!
//! FFmpeg reports diagnostics through `av_log`, a printf-style variadic call.
//! With the `native-ffmpeg` feature the bridge is installed as FFmpeg's log
//! callback: every record at or below the threshold is rendered into a
//! bounded line buffer and handed to the listener as `(level, text)`.
//!
//! The text borrows the render buffer. A listener that wants to keep a
//! message must copy it; the borrow makes retaining it a compile error.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use ffembed_av::{set_log_level, set_logger, LogLevel};
//!
//! set_log_level(LogLevel::Warning.into());
//! set_logger(Some(Arc::new(|level: i32, message: &str| {
//!     eprintln!("[{level}] {}", message.trim_end());
//! })));
//! # set_logger(None);
//! ```

use crate::level::LogLevel;
use parking_lot::RwLock;
use std::borrow::Cow;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Arc;

/// Capacity of the render buffer, including the NUL terminator.
pub const LINE_CAPACITY: usize = 1024;

/// Receiver for forwarded log records.
pub type LogListener = Arc<dyn Fn(i32, &str) + Send + Sync>;

static LISTENER: RwLock<Option<LogListener>> = parking_lot::const_rwlock(None);
static THRESHOLD: AtomicI32 = AtomicI32::new(LogLevel::Info.as_raw());
static CONTEXT_PREFIX: AtomicBool = AtomicBool::new(false);

/// Register the process-wide listener, replacing any previous one.
///
/// `None` disables forwarding; records are then dropped silently.
pub fn set_logger(listener: Option<LogListener>) {
    *LISTENER.write() = listener;
}

/// Whether a listener is currently registered.
pub fn has_logger() -> bool {
    LISTENER.read().is_some()
}

/// Set the severity threshold; records with a higher level are dropped.
///
/// With `native-ffmpeg` the threshold is also applied to FFmpeg's own level
/// filter.
pub fn set_log_level(level: i32) {
    THRESHOLD.store(level, Ordering::Release);
    #[cfg(feature = "native-ffmpeg")]
    native::apply_level(level);
}

/// The current severity threshold.
pub fn log_level() -> i32 {
    THRESHOLD.load(Ordering::Acquire)
}

/// Render FFmpeg's `[name @ 0x...]` context prefix in forwarded messages.
pub fn set_context_prefix(enabled: bool) {
    CONTEXT_PREFIX.store(enabled, Ordering::Release);
}

/// Register a listener that re-emits records as `tracing` events under the
/// `ffmpeg` target.
pub fn log_to_tracing() {
    set_logger(Some(Arc::new(trace_record)));
}

/// Forward a record produced by Rust code.
///
/// Applies the same threshold and bounding as records coming from FFmpeg:
/// the text is cut to `LINE_CAPACITY - 1` bytes.
pub fn forward(level: i32, message: &[u8]) {
    let Some(listener) = accepting_listener(level) else {
        return;
    };

    let mut line = LineBuffer::new();
    line.fill(message);
    notify(&listener, level, &line);
}

/// Install the bridge into FFmpeg. Called once per process by the lifecycle.
pub(crate) fn install() {
    #[cfg(feature = "native-ffmpeg")]
    native::install(log_level());
}

fn accepting_listener(level: i32) -> Option<LogListener> {
    if level > log_level() {
        return None;
    }
    // Clone out so the listener runs without the lock held.
    LISTENER.read().clone()
}

fn notify(listener: &LogListener, level: i32, line: &LineBuffer) {
    let text = line.text();
    // A panic must not unwind into C frames.
    let _ = panic::catch_unwind(AssertUnwindSafe(|| listener(level, &text)));
}

fn trace_record(level: i32, message: &str) {
    let message = message.trim_end_matches(['\n', '\r']);
    if message.is_empty() {
        return;
    }

    match LogLevel::from_raw(level) {
        LogLevel::Quiet | LogLevel::Panic | LogLevel::Fatal | LogLevel::Error => {
            tracing::error!(target: "ffmpeg", "{}", message)
        }
        LogLevel::Warning => tracing::warn!(target: "ffmpeg", "{}", message),
        LogLevel::Info => tracing::info!(target: "ffmpeg", "{}", message),
        LogLevel::Verbose | LogLevel::Debug => tracing::debug!(target: "ffmpeg", "{}", message),
        LogLevel::Trace => tracing::trace!(target: "ffmpeg", "{}", message),
    }
}

/// Fixed-size, always NUL-terminated render buffer for one record.
pub(crate) struct LineBuffer {
    bytes: [u8; LINE_CAPACITY],
}

impl LineBuffer {
    pub(crate) fn new() -> Self {
        Self {
            bytes: [0; LINE_CAPACITY],
        }
    }

    /// Copy `src` in, truncating. Returns `true` if bytes were dropped.
    pub(crate) fn fill(&mut self, src: &[u8]) -> bool {
        let len = src.len().min(LINE_CAPACITY - 1);
        self.bytes[..len].copy_from_slice(&src[..len]);
        self.bytes[len] = 0;
        len < src.len()
    }

    /// The rendered bytes up to the first NUL.
    pub(crate) fn as_bytes(&self) -> &[u8] {
        let end = self
            .bytes
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(LINE_CAPACITY - 1);
        &self.bytes[..end]
    }

    pub(crate) fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.as_bytes())
    }
}

#[cfg(feature = "native-ffmpeg")]
mod native {
    use super::{accepting_listener, notify, LineBuffer, CONTEXT_PREFIX, LINE_CAPACITY};
    use ffmpeg_the_third::ffi;
    use libc::{c_char, c_int, c_void};
    use std::sync::atomic::Ordering;

    // `va_list` is passed differently per ABI; these mirror the shapes the
    // generated bindings use for `av_log_set_callback`.
    #[cfg(any(
        all(
            not(target_arch = "aarch64"),
            not(target_arch = "powerpc"),
            not(target_arch = "s390x"),
            not(target_arch = "x86_64")
        ),
        all(target_arch = "aarch64", target_vendor = "apple"),
        target_family = "wasm",
        target_os = "uefi",
        windows,
    ))]
    type VaListType = *mut c_char;

    #[cfg(all(target_arch = "x86_64", not(target_os = "uefi"), not(windows)))]
    type VaListType = *mut ffi::__va_list_tag;

    #[cfg(all(
        target_arch = "aarch64",
        not(target_vendor = "apple"),
        not(target_os = "uefi"),
        not(windows),
    ))]
    type VaListType = *mut c_void;

    #[cfg(all(target_arch = "powerpc", not(target_os = "uefi"), not(windows)))]
    type VaListType = *mut ffi::__va_list_tag_powerpc;

    #[cfg(target_arch = "s390x")]
    type VaListType = *mut ffi::__va_list_tag_s390x;

    unsafe extern "C" fn ffmpeg_log_callback(
        avcl: *mut c_void,
        level: c_int,
        fmt: *const c_char,
        args: VaListType,
    ) {
        if fmt.is_null() {
            return;
        }
        let Some(listener) = accepting_listener(level) else {
            return;
        };

        let mut line = LineBuffer::new();
        let mut print_prefix: c_int = CONTEXT_PREFIX.load(Ordering::Acquire).into();

        // SAFETY: fmt/args come straight from av_vlog and the buffer length
        // passed matches the buffer.
        let needed = unsafe {
            ffi::av_log_format_line2(
                avcl,
                level,
                fmt,
                args,
                line.bytes.as_mut_ptr() as *mut c_char,
                LINE_CAPACITY as c_int,
                &mut print_prefix,
            )
        };

        line.bytes[LINE_CAPACITY - 1] = 0;
        if needed < 0 {
            line.bytes[0] = 0;
        }

        notify(&listener, level, &line);
    }

    pub(super) fn install(level: i32) {
        // SAFETY: both calls only swap libavutil globals.
        unsafe {
            ffi::av_log_set_callback(Some(ffmpeg_log_callback));
            ffi::av_log_set_level(level);
        }
    }

    pub(super) fn apply_level(level: i32) {
        // SAFETY: plain store into a libavutil global.
        unsafe { ffi::av_log_set_level(level) }
    }
}
