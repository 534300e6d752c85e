mod types;

pub use types::*;

use anyhow::{Context, Result};
use ffembed_av::{ChannelKind, LogLevel};
use std::path::Path;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = [
        "./ffembed.toml",
        "~/.config/ffembed/config.toml",
        "/etc/ffembed/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            tracing::debug!("Using config file: {:?}", path);
            return load_config(path);
        }
    }

    Ok(Config::default())
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    config
        .logging
        .level
        .parse::<LogLevel>()
        .with_context(|| format!("Invalid logging level '{}'", config.logging.level))?;

    config
        .capture
        .channel
        .parse::<ChannelKind>()
        .map_err(|e| anyhow::anyhow!("Invalid capture channel: {}", e))?;

    if config.capture.enabled && config.capture.capacity < 2 {
        anyhow::bail!(
            "Capture capacity must be at least 2 bytes, got {}",
            config.capture.capacity
        );
    }

    for (tool, name) in [
        ("ffmpeg", &config.programs.ffmpeg),
        ("ffprobe", &config.programs.ffprobe),
    ] {
        if name.is_empty() {
            anyhow::bail!("Program name for {} cannot be empty", tool);
        }
        if name.contains('\0') {
            anyhow::bail!("Program name for {} contains a NUL byte", tool);
        }
    }

    Ok(())
}
