//! Command-line front end for the QEMU human monitor.
//!
//! Start QEMU with `-monitor telnet:localhost:8888,server,nowait`, then:
//!
//! ```text
//! vmcli screenshot --output shot.ppm
//! vmcli send-input 'root\n'
//! vmcli send-input --raw ctrl-alt-f2
//! vmcli reboot
//! ```

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use vmcli::{MonitorConfig, DEFAULT_MONITOR};

#[derive(Parser)]
#[command(name = "vmcli")]
#[command(about = "Tool for interacting with a QEMU VM over its monitor console")]
struct Cli {
    /// QEMU monitor address
    #[arg(long, global = true)]
    monitor: Option<String>,

    /// TOML file with monitor settings
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// How long to wait for the monitor's echo between keys (ms)
    #[arg(long, global = true)]
    pacing_timeout_ms: Option<u64>,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Take a screenshot
    Screenshot {
        /// Where QEMU should write the image (PPM)
        #[arg(long)]
        output: PathBuf,
    },

    /// Inject keyboard input
    SendInput {
        /// Raw qemu monitor key sequence, eg. 'ctrl-alt-f1'
        #[arg(long)]
        raw: bool,

        /// Input to send, newlines can be encoded as \n or simply a newline character
        what: String,
    },

    /// Reboot the system
    Reboot,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = build_config(&cli)?;

    match cli.command {
        Commands::Screenshot { output } => {
            let path = vmcli::screenshot(&config, &output)
                .with_context(|| format!("Screenshot via {} failed", config.address))?;
            println!("{} {}", "Screendump requested:".green(), path.display());
        }
        Commands::SendInput { raw, what } => {
            let report = vmcli::send_input(&config, &what, raw)
                .with_context(|| format!("Sending input via {} failed", config.address))?;
            println!("{} {} key(s)", "Sent".green(), report.sent);
            if report.cancelled_reads > 0 {
                println!(
                    "{}",
                    format!("  {} read(s) timed out waiting for echo", report.cancelled_reads)
                        .yellow()
                );
            }
        }
        Commands::Reboot => {
            vmcli::reboot(&config)
                .with_context(|| format!("Reboot via {} failed", config.address))?;
            println!("{}", "System reset sent".green());
        }
    }

    Ok(())
}

/// Defaults, then the config file, then flags.
fn build_config(cli: &Cli) -> Result<MonitorConfig> {
    let mut config = match &cli.config {
        Some(path) => MonitorConfig::load(path)?,
        None => MonitorConfig::default(),
    };

    if let Some(monitor) = &cli.monitor {
        config.address = monitor.clone();
    }
    if let Some(ms) = cli.pacing_timeout_ms {
        config.pacing_timeout = Duration::from_millis(ms);
    }
    config.validate()?;

    // fail on a bad address before anything else happens
    config
        .monitor_address()
        .with_context(|| format!("Bad --monitor value (default is {})", DEFAULT_MONITOR))?;

    Ok(config)
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .init();
}
