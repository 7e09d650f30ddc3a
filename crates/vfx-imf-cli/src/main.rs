//! imf - inspect, verify and re-encode image container files

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "imf")]
#[command(author, version, about = "Inspect, verify and re-encode image container files")]
#[command(long_about = "
Works on single- and multi-part files in the OpenEXR 2 layout.

Examples:
  imf info shot.exr                     # Parts, windows, channels
  imf info shot.exr --all               # Every header attribute
  imf check renders/*.exr               # Decode every chunk
  imf copy in.exr out.exr -c zips       # Re-encode with another compression
  RUST_LOG=vfx_imf=trace imf check a.exr
")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Show parts, windows, channels and attributes
    #[command(visible_alias = "i")]
    Info(InfoArgs),

    /// Decode every chunk and report broken files
    Check(CheckArgs),

    /// Re-encode a file, optionally changing its compression
    #[command(visible_alias = "cp")]
    Copy(CopyArgs),
}

#[derive(Args)]
struct InfoArgs {
    /// Input file(s)
    #[arg(required = true)]
    input: Vec<PathBuf>,

    /// List every header attribute
    #[arg(short, long)]
    all: bool,
}

#[derive(Args)]
struct CheckArgs {
    /// Input file(s)
    #[arg(required = true)]
    input: Vec<PathBuf>,

    /// Decode chunks on the calling thread only
    #[arg(long)]
    serial: bool,
}

#[derive(Args)]
struct CopyArgs {
    /// Input file
    input: PathBuf,

    /// Output file
    output: PathBuf,

    /// Compression (none, rle, zips, zip, piz, pxr24, b44, b44a, dwaa, dwab)
    #[arg(short, long)]
    compression: Option<String>,

    /// Deflate level for zip/zips (0-10)
    #[arg(long, default_value = "4")]
    zip_level: u8,
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Info(args) => commands::info::run(args, cli.verbose),
        Commands::Check(args) => commands::check::run(args, cli.verbose),
        Commands::Copy(args) => commands::copy::run(args, cli.verbose),
    }
}
