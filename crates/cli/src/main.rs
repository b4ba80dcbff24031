mod cmd;
mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use depforge_lib::consts::DEFAULT_DEPS_FILE;

use crate::output::OutputFormat;

/// depforge - fetch, build and locate external dependencies incrementally
#[derive(Parser)]
#[command(name = "depforge")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable debug logging
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Synchronise, build and locate every dependency of a descriptor file
  Fetch {
    /// Path to the descriptor file
    #[arg(default_value = DEFAULT_DEPS_FILE)]
    file: PathBuf,

    /// Directory receiving the package manifest (overrides DEPFORGE_OUTPUT_DIR)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Root storage directory (overrides DEPFORGE_ROOT)
    #[arg(long)]
    root: Option<PathBuf>,

    /// Skip synchronisation and builds; only locate packages
    #[arg(long)]
    fast: bool,

    #[arg(long, value_enum, default_value_t)]
    format: OutputFormat,
  },

  /// Show the stored fingerprints of every dependency
  Status {
    /// Path to the descriptor file
    #[arg(default_value = DEFAULT_DEPS_FILE)]
    file: PathBuf,

    /// Root storage directory (overrides DEPFORGE_ROOT)
    #[arg(long)]
    root: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t)]
    format: OutputFormat,
  },
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "debug" } else { "info" };
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  match cli.command {
    Commands::Fetch {
      file,
      output,
      root,
      fast,
      format,
    } => cmd::cmd_fetch(&file, output, root, fast, format),
    Commands::Status { file, root, format } => cmd::cmd_status(&file, root, format),
  }
}
