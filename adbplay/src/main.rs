//! adbplay - play one audio file to completion
//!
//! Exit status is 0 when playback reached Stopped, 1 on a usage error and 1
//! on any subsystem failure or buffering abort.

use adbplay::audio::NativeSubsystem;
use adbplay::logging::{init_tracing, LogStream};
use adbplay::{play_file, Overrides, Settings, BUILD_INFO};
use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

/// Command-line arguments for adbplay
#[derive(Parser, Debug)]
#[command(name = "adbplay")]
#[command(about = "Play an audio file through the native audio subsystem")]
#[command(version = BUILD_INFO)]
struct Args {
    /// TOML configuration file
    #[arg(short, long, env = "ADBPLAY_CONFIG")]
    config: Option<PathBuf>,

    /// Delay between play-state polls, in milliseconds
    #[arg(long)]
    poll_interval_ms: Option<u64>,

    /// Output device name (default device when omitted)
    #[arg(short, long)]
    device: Option<String>,

    /// tracing filter for the diagnostic log
    #[arg(long)]
    log_filter: Option<String>,

    /// Audio file to play
    path: PathBuf,
}

impl Args {
    fn overrides(&self) -> Overrides {
        Overrides {
            config_file: self.config.clone(),
            poll_interval_ms: self.poll_interval_ms,
            output_device: self.device.clone(),
            log_filter: self.log_filter.clone(),
        }
    }
}

/// Short usage line for a missing path
fn usage() -> ExitCode {
    let program = std::env::args()
        .next()
        .unwrap_or_else(|| "adbplay".to_string());
    println!("Usage: {} <path_to_audio_file>", program);
    ExitCode::FAILURE
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) if e.kind() == ErrorKind::MissingRequiredArgument => return usage(),
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // Tracing may not be up yet when configuration failed
            eprintln!("Error: {:#}", e);
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let settings =
        Settings::resolve(&args.overrides()).context("Failed to resolve configuration")?;

    init_tracing(&settings.log_filter);
    info!("Starting adbplay v{}", BUILD_INFO);

    let subsystem = NativeSubsystem::new(&settings);
    let polls = play_file(&subsystem, &args.path, &settings, LogStream::stdout())
        .await
        .with_context(|| format!("Playback of {} failed", args.path.display()))?;

    info!(polls, "Done");
    Ok(())
}
