// SPDX-License-Identifier: GPL-3.0-only

use barcode_scanner::app::Symbology;
use barcode_scanner::config::Config;
use barcode_scanner::constants::app_info;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

mod cli;

#[derive(Parser)]
#[command(name = "barcode-scanner")]
#[command(about = "Scan barcodes from a camera or image files")]
#[command(version = app_info::version())]
#[command(subcommand_required = false)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan from a camera until a code is read (default)
    Scan {
        #[command(flatten)]
        options: ScanOptions,
    },

    /// Scan still images
    ScanImage {
        /// Image files or directories
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Save the image with the detection outline drawn on it
        #[arg(short, long)]
        annotate: Option<PathBuf>,

        /// Symbologies to look for, comma separated
        #[arg(short, long, value_delimiter = ',')]
        symbology: Vec<Symbology>,
    },

    /// List available cameras
    List,

    /// Switch the torch on or off
    Torch {
        #[arg(value_enum)]
        state: TorchState,
    },
}

#[derive(clap::Args, Default)]
struct ScanOptions {
    /// Camera device node, e.g. /dev/video0
    #[arg(short, long)]
    device: Option<String>,

    /// Symbologies to look for, comma separated
    #[arg(short, long, value_delimiter = ',')]
    symbology: Vec<Symbology>,

    /// Give up after this many seconds
    #[arg(short, long)]
    timeout: Option<u64>,

    /// Switch the torch on while scanning
    #[arg(long)]
    torch: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum TorchState {
    On,
    Off,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=barcode_scanner=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = Config::load()?;

    match cli.command.unwrap_or(Commands::Scan {
        options: ScanOptions::default(),
    }) {
        Commands::Scan { options } => {
            if let Some(device) = options.device {
                config.device_path = Some(device);
            }
            if !options.symbology.is_empty() {
                config.symbologies = options.symbology;
            }
            if options.torch {
                config.torch_on_start = true;
            }
            cli::scan(config, options.timeout.map(Duration::from_secs))
        }
        Commands::ScanImage {
            files,
            annotate,
            symbology,
        } => {
            if !symbology.is_empty() {
                config.symbologies = symbology;
            }
            cli::scan_images(config, &files, annotate)
        }
        Commands::List => cli::list_cameras(&config),
        Commands::Torch { state } => cli::set_torch(matches!(state, TorchState::On)),
    }
}
