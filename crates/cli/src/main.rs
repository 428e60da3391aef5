//! toolchain-bootstrap: build reproducible toolchain archives.

mod cmd;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use toolchain_bootstrap::manifest::Tool;
use toolchain_bootstrap::tablegen::DEFAULT_TBLGEN;

use crate::cmd::BuildArgs;
use crate::output::{Status, error_chain, status};

/// Build reproducible, byte-for-byte deterministic toolchain archives
#[derive(Parser)]
#[command(name = "toolchain-bootstrap")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Download pinned inputs, run the build driver and package its output
  Build {
    /// Which tool to build
    #[arg(value_enum)]
    tool: ToolArg,

    /// Directory to write downloads and the final archive into
    artifacts_path: PathBuf,

    /// Manifest to use instead of the built-in one
    #[arg(long)]
    manifest: Option<PathBuf>,

    /// Directory containing build driver scripts
    #[arg(long, env = "TOOLCHAIN_BOOTSTRAP_SCRIPTS", default_value = "scripts")]
    scripts_dir: PathBuf,

    /// Create the temporary build workspace under this directory
    #[arg(long)]
    workspace_root: Option<PathBuf>,
  },

  /// Normalize an llvm-tblgen JSON dump
  NormalizeJson {
    /// JSON file to read
    input: PathBuf,

    /// Write here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
  },

  /// Regenerate option table JSON from an LLVM source checkout
  Tablegen {
    /// Name of the llvm-tblgen executable to use
    #[arg(long, default_value = DEFAULT_TBLGEN)]
    tblgen: String,

    /// Directory of a unified LLVM source checkout
    llvm_source_path: PathBuf,

    /// Output directory to write files
    output_path: PathBuf,
  },
}

#[derive(Clone, Copy, ValueEnum)]
enum ToolArg {
  Llvm,
}

impl From<ToolArg> for Tool {
  fn from(arg: ToolArg) -> Self {
    match arg {
      ToolArg::Llvm => Tool::Llvm,
    }
  }
}

fn main() -> ExitCode {
  let cli = Cli::parse();
  init_tracing(cli.verbose);

  let result = match cli.command {
    Commands::Build {
      tool,
      artifacts_path,
      manifest,
      scripts_dir,
      workspace_root,
    } => cmd::cmd_build(BuildArgs {
      tool: tool.into(),
      artifacts_path,
      manifest,
      scripts_dir,
      workspace_root,
    }),
    Commands::NormalizeJson { input, output } => cmd::cmd_normalize_json(&input, output.as_deref()),
    Commands::Tablegen {
      tblgen,
      llvm_source_path,
      output_path,
    } => cmd::cmd_tablegen(&llvm_source_path, &output_path, &tblgen),
  };

  match result {
    Ok(()) => ExitCode::SUCCESS,
    Err(err) => {
      status(Status::Failed, &error_chain(&err));
      ExitCode::FAILURE
    }
  }
}

fn init_tracing(verbose: bool) {
  let default_level = if verbose { "debug" } else { "info" };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();
}
