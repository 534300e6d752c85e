//! FFmpeg log levels.

use crate::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// Named FFmpeg log levels, matching the `AV_LOG_*` constants.
///
/// Lower values are more severe. A record is forwarded when its level is
/// less than or equal to the configured threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    Quiet,
    Panic,
    Fatal,
    Error,
    Warning,
    Info,
    Verbose,
    Debug,
    Trace,
}

impl LogLevel {
    const ALL: [LogLevel; 9] = [
        LogLevel::Quiet,
        LogLevel::Panic,
        LogLevel::Fatal,
        LogLevel::Error,
        LogLevel::Warning,
        LogLevel::Info,
        LogLevel::Verbose,
        LogLevel::Debug,
        LogLevel::Trace,
    ];

    /// The raw `AV_LOG_*` value.
    pub const fn as_raw(self) -> i32 {
        match self {
            LogLevel::Quiet => -8,
            LogLevel::Panic => 0,
            LogLevel::Fatal => 8,
            LogLevel::Error => 16,
            LogLevel::Warning => 24,
            LogLevel::Info => 32,
            LogLevel::Verbose => 40,
            LogLevel::Debug => 48,
            LogLevel::Trace => 56,
        }
    }

    /// The name FFmpeg uses for this level on its `-loglevel` option.
    pub const fn name(self) -> &'static str {
        match self {
            LogLevel::Quiet => "quiet",
            LogLevel::Panic => "panic",
            LogLevel::Fatal => "fatal",
            LogLevel::Error => "error",
            LogLevel::Warning => "warning",
            LogLevel::Info => "info",
            LogLevel::Verbose => "verbose",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }

    /// Map a raw level to the named level that contains it.
    ///
    /// FFmpeg levels are bands: anything between two constants belongs to the
    /// more severe one, e.g. 20 is reported as [`LogLevel::Error`].
    pub fn from_raw(raw: i32) -> Self {
        Self::ALL
            .iter()
            .rev()
            .copied()
            .find(|level| level.as_raw() <= raw)
            .unwrap_or(LogLevel::Quiet)
    }
}

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel::Info
    }
}

impl From<LogLevel> for i32 {
    fn from(level: LogLevel) -> Self {
        level.as_raw()
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LogLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if let Ok(raw) = trimmed.parse::<i32>() {
            return Ok(LogLevel::from_raw(raw));
        }

        let lower = trimmed.to_ascii_lowercase();
        let level = match lower.as_str() {
            "warn" => Some(LogLevel::Warning),
            other => Self::ALL.iter().copied().find(|l| l.name() == other),
        };

        level.ok_or_else(|| Error::InvalidLevel(s.to_string()))
    }
}
