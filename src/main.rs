mod cli;

use ffembed::{config, host};

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use ffembed_av::Tool;
use std::path::Path;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "ffembed=trace,ffembed_av=debug,ffmpeg=debug".to_string()
        } else {
            "ffembed=info,ffembed_av=info,ffmpeg=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Ffmpeg { capture, args } => {
            run_tool(Tool::Ffmpeg, &args, capture, cli.config.as_deref())
        }
        Commands::Ffprobe { capture, args } => {
            run_tool(Tool::Ffprobe, &args, capture, cli.config.as_deref())
        }
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("ffembed {}", env!("CARGO_PKG_VERSION"));
            println!("  native-ffmpeg: {}", cfg!(feature = "native-ffmpeg"));
            println!("  fftools: {}", cfg!(feature = "fftools"));
            Ok(())
        }
    }
}

#[cfg(feature = "fftools")]
fn run_tool(
    tool: Tool,
    args: &[String],
    capture: Option<usize>,
    config_path: Option<&Path>,
) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    host::apply_logging(&config.logging)?;

    let runner = host::linked_runner(&config)?;
    let capacity = host::capture_capacity(&config.capture, capture);

    tracing::debug!(tool = %tool, ?capacity, "Invoking tool");
    let exit_code = host::invoke(&runner, tool, args, capacity, &mut std::io::stdout())?;

    if exit_code != 0 {
        tracing::debug!(tool = %tool, exit_code, "Tool exited with failure");
    }
    std::process::exit(exit_code)
}

#[cfg(not(feature = "fftools"))]
fn run_tool(
    tool: Tool,
    _args: &[String],
    _capture: Option<usize>,
    config_path: Option<&Path>,
) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    host::apply_logging(&config.logging)?;

    anyhow::bail!(
        "No {} library is linked into this build; rebuild with --features fftools",
        tool
    )
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            print_summary(&config);
        }
        None => {
            println!("No config file specified, using defaults");
            let config = config::Config::default();
            println!("Default config:");
            print_summary(&config);
        }
    }

    Ok(())
}

fn print_summary(config: &config::Config) {
    println!("  Log level: {}", config.logging.level);
    println!("  Forward to tracing: {}", config.logging.forward);
    println!("  Capture enabled: {}", config.capture.enabled);
    println!(
        "  Capture: {} bytes via {}",
        config.capture.capacity, config.capture.channel
    );
    println!(
        "  Programs: {}, {}",
        config.programs.ffmpeg, config.programs.ffprobe
    );
}
