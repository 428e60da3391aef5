//! Implementation of the `toolchain-bootstrap build` command.
//!
//! Resolves the manifest and host, then hands both to the pipeline, which
//! downloads the pinned inputs, runs the build driver and writes the final
//! archive into the artifacts directory.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use tracing::debug;

use toolchain_bootstrap::fetch::Downloader;
use toolchain_bootstrap::manifest::{Manifest, Tool};
use toolchain_bootstrap::pipeline::Pipeline;
use toolchain_bootstrap::platform::{HostProbe, PlatformProbe};

use crate::output::{Facts, Status, format_elapsed, format_size, status};

/// Arguments for [`cmd_build`].
pub struct BuildArgs {
  pub tool: Tool,
  pub artifacts_path: PathBuf,
  pub manifest: Option<PathBuf>,
  pub scripts_dir: PathBuf,
  pub workspace_root: Option<PathBuf>,
}

/// Execute the build command.
///
/// Configuration problems (unreadable manifest, wrong tool, unsupported host)
/// are reported before anything is downloaded or written.
pub fn cmd_build(args: BuildArgs) -> Result<()> {
  let start = Instant::now();

  let manifest = match &args.manifest {
    Some(path) => Manifest::load(path).with_context(|| format!("Failed to load manifest {}", path.display()))?,
    None => Manifest::builtin(args.tool).context("Built-in manifest is invalid")?,
  };
  manifest.ensure_tool(args.tool)?;

  let host = HostProbe
    .probe()
    .context("Unsupported host architecture (expected x86_64 or aarch64)")?;
  debug!(host = %host, "resolved host");

  let driver = args.scripts_dir.join(&manifest.driver);
  let downloader = Downloader::http().context("Failed to create HTTP client")?;
  let mut pipeline = Pipeline::new(downloader, host);
  if let Some(root) = args.workspace_root {
    pipeline = pipeline.with_workspace_root(root);
  }

  status(
    Status::Note,
    &format!(
      "Building {} for {} with {} inputs",
      args.tool,
      host.triple(&manifest.platform),
      manifest.artifacts_for(host.arch).len()
    ),
  );

  let output = pipeline
    .run(&manifest, &driver, &args.artifacts_path)
    .map_err(|e| {
      let stage = e.stage();
      anyhow::Error::new(e).context(format!("Build failed during {stage}"))
    })?;

  status(Status::Done, &format!("Wrote {}", output.path.display()));
  Facts::new()
    .add("sha256", output.sha256.as_str())
    .add("size", format_size(output.size))
    .add("entries", output.stats.entries.to_string())
    .add("time", format_elapsed(start.elapsed()))
    .print();

  Ok(())
}
