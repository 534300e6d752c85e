use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ffembed")]
#[command(author, version, about = "Run ffmpeg and ffprobe in process")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run ffmpeg with the given arguments
    Ffmpeg {
        /// Capture output into a buffer of this many bytes and print it afterwards
        #[arg(long, value_name = "BYTES")]
        capture: Option<usize>,

        /// Arguments passed to ffmpeg (after `--`)
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Run ffprobe with the given arguments
    Ffprobe {
        /// Capture output into a buffer of this many bytes and print it afterwards
        #[arg(long, value_name = "BYTES")]
        capture: Option<usize>,

        /// Arguments passed to ffprobe (after `--`)
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
