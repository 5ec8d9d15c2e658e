//! kintsugi: command-line interface over the build engine.
//!
//! - `kintsugi build <root-hash>` - build a recipe DAG into the store
//! - `kintsugi gc` - collect unreachable store paths
//! - `kintsugi modpack ...` - generations, rollback, deletion
//! - `kintsugi vase ...` - manage versioned source trees

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use kintsugi_lib::consts::DEFAULT_ROOT_DIR_NAME;

mod cmd;
mod output;

use output::OutputFormat;

#[derive(Parser)]
#[command(name = "kintsugi", version, about = "Declarative, content-addressed modpack builds")]
struct Cli {
  /// Store root directory (default: ~/.kintsugi)
  #[arg(long, global = true)]
  root: Option<PathBuf>,

  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Build the derivation DAG rooted at a recipe hash
  Build {
    /// Root recipe hash (32 hex characters)
    root_hash: String,

    /// Register the result as a new generation of this modpack
    #[arg(long)]
    register: Option<String>,

    /// Directory for resolving relative fetch_local paths
    #[arg(long)]
    modpack_path: Option<PathBuf>,
  },

  /// Remove store paths not reachable from any modpack generation
  Gc {
    /// Report what would be deleted without deleting
    #[arg(long)]
    dry_run: bool,

    #[arg(short, long, value_enum, default_value_t)]
    output: OutputFormat,
  },

  /// Inspect and manage modpack generations
  Modpack {
    #[command(subcommand)]
    command: cmd::modpack::ModpackCommand,
  },

  /// Manage vases (versioned user-provided source trees)
  Vase {
    #[command(subcommand)]
    command: cmd::vase::VaseCommand,
  },
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
  // Logs go to stderr; stdout is reserved for command output (including
  // machine-readable JSON).
  FmtSubscriber::builder()
    .with_max_level(level)
    .with_target(false)
    .without_time()
    .with_writer(std::io::stderr)
    .init();

  let root = match cli.root {
    Some(root) => root,
    None => default_root()?,
  };

  match cli.command {
    Commands::Build {
      root_hash,
      register,
      modpack_path,
    } => cmd::build::cmd_build(&root, &root_hash, register.as_deref(), modpack_path.as_deref()),
    Commands::Gc { dry_run, output } => cmd::gc::cmd_gc(&root, dry_run, output),
    Commands::Modpack { command } => cmd::modpack::cmd_modpack(&root, command),
    Commands::Vase { command } => cmd::vase::cmd_vase(&root, command),
  }
}

fn default_root() -> Result<PathBuf> {
  let home = std::env::var_os("HOME").context("HOME is not set; pass --root explicitly")?;
  Ok(PathBuf::from(home).join(DEFAULT_ROOT_DIR_NAME))
}
