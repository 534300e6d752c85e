use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub capture: CaptureConfig,

    #[serde(default)]
    pub programs: ProgramsConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// FFmpeg log level, by name ("warning") or number (24)
    #[serde(default = "default_level")]
    pub level: String,

    /// Render the "[ctx @ 0x...]" prefix in forwarded messages
    #[serde(default)]
    pub context_prefix: bool,

    /// Forward FFmpeg log records to tracing under the `ffmpeg` target
    #[serde(default = "default_true")]
    pub forward: bool,
}

fn default_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            context_prefix: false,
            forward: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CaptureConfig {
    /// Capture output even when `--capture` is not given
    #[serde(default)]
    pub enabled: bool,

    /// Buffer size in bytes, including the NUL terminator
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// "temp-file" or "pipe"
    #[serde(default = "default_channel")]
    pub channel: String,
}

fn default_capacity() -> usize {
    65536
}

fn default_channel() -> String {
    "temp-file".to_string()
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            capacity: default_capacity(),
            channel: default_channel(),
        }
    }
}

/// Program names the tools report in their diagnostics.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProgramsConfig {
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg: String,

    #[serde(default = "default_ffprobe")]
    pub ffprobe: String,
}

fn default_ffmpeg() -> String {
    "ffmpeg".to_string()
}

fn default_ffprobe() -> String {
    "ffprobe".to_string()
}

impl Default for ProgramsConfig {
    fn default() -> Self {
        Self {
            ffmpeg: default_ffmpeg(),
            ffprobe: default_ffprobe(),
        }
    }
}
