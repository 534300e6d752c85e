//! Wiring between the configuration and the in-process tool runner.

use crate::config::{CaptureConfig, Config, LoggingConfig};
use anyhow::{Context, Result};
use ffembed_av::{ChannelKind, LogLevel, Tool, ToolLibrary, ToolRunner};
use std::io::Write;
use std::sync::Arc;

/// Apply the `[logging]` section to the log bridge.
pub fn apply_logging(logging: &LoggingConfig) -> Result<LogLevel> {
    let level: LogLevel = logging
        .level
        .parse()
        .with_context(|| format!("Invalid logging level '{}'", logging.level))?;

    ffembed_av::set_log_level(level.into());
    ffembed_av::set_context_prefix(logging.context_prefix);
    if logging.forward {
        ffembed_av::log_to_tracing();
    } else {
        ffembed_av::set_logger(None);
    }

    tracing::debug!(
        level = %level,
        listener = ffembed_av::log_bridge::has_logger(),
        "Configured FFmpeg logging"
    );
    Ok(level)
}

/// Build a runner over `library` with the configured channel and program names.
pub fn build_runner(library: Arc<dyn ToolLibrary>, config: &Config) -> Result<ToolRunner> {
    let channel: ChannelKind = config
        .capture
        .channel
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid capture channel: {}", e))?;

    let runner = ToolRunner::from_arc(library)
        .with_channel(channel)
        .with_program_name(Tool::Ffmpeg, &config.programs.ffmpeg)?
        .with_program_name(Tool::Ffprobe, &config.programs.ffprobe)?;

    Ok(runner)
}

/// Runner over the fftools linked into this binary.
#[cfg(feature = "fftools")]
pub fn linked_runner(config: &Config) -> Result<ToolRunner> {
    build_runner(Arc::new(ffembed_av::LinkedFftools), config)
}

/// Capture buffer size for a run: the command line wins over the config.
pub fn capture_capacity(capture: &CaptureConfig, requested: Option<usize>) -> Option<usize> {
    requested.or(capture.enabled.then_some(capture.capacity))
}

/// Full argument vector for `tool`, with the configured program name as `argv[0]`.
pub fn tool_argv(runner: &ToolRunner, tool: Tool, args: &[String]) -> Vec<String> {
    let mut argv = Vec::with_capacity(args.len() + 1);
    argv.push(runner.program_name(tool).to_string_lossy().into_owned());
    argv.extend(args.iter().cloned());
    argv
}

/// Run `tool` and return its exit code.
///
/// With a capacity the output is captured and written to `out` once the run
/// has finished; without one the tool writes to the real streams.
pub fn invoke<W: Write>(
    runner: &ToolRunner,
    tool: Tool,
    args: &[String],
    capacity: Option<usize>,
    out: &mut W,
) -> Result<i32> {
    let argv = tool_argv(runner, tool, args);

    let Some(capacity) = capacity else {
        return Ok(runner.run(tool, &argv)?);
    };

    let captured = runner.run_captured(tool, &argv, capacity)?;
    if captured.truncated {
        tracing::warn!(capacity, "Captured output was truncated");
    }
    if captured.channel.is_none() {
        tracing::warn!("Output could not be captured; it went to the terminal");
    }

    out.write_all(captured.output.as_bytes())?;
    out.flush()?;

    if !captured.is_success() {
        tracing::debug!(tool = %tool, exit_code = captured.exit_code, "Captured run failed");
    }
    Ok(captured.exit_code)
}
