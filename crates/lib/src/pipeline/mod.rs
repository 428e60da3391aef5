//! Build orchestration.
//!
//! A [`Pipeline`] turns a manifest into a finished archive:
//! fetch every pinned input, stage the inputs and the build driver in a
//! private workspace, run the driver with a derived environment, then archive
//! and compress its output directory.

mod driver;
mod env;
mod package;
mod types;
mod workspace;

use std::path::{Path, PathBuf};

use tracing::{debug, error, info};

use crate::fetch::{Downloader, HttpTransport, Transport};
use crate::manifest::Manifest;
use crate::platform::HostInfo;

pub use driver::run_driver;
pub use env::{BuildEnvironment, HOST_TRIPLE, MACOSX_DEPLOYMENT_TARGET, NUM_CPUS, NUM_JOBS_AGGRESSIVE, aggressive_jobs};
pub use package::package;
pub use types::{BuildOutput, PipelineError, Stage};
pub use workspace::Workspace;

/// Tracks and logs stage transitions for one run.
struct Progress {
  stage: Stage,
}

impl Progress {
  fn new() -> Self {
    Self { stage: Stage::Init }
  }

  fn enter(&mut self, next: Stage) {
    debug_assert!(!self.stage.is_terminal(), "{} is final", self.stage);
    info!(from = %self.stage, to = %next, "stage transition");
    self.stage = next;
  }
}

/// Sequential build pipeline for one host.
pub struct Pipeline<T = HttpTransport> {
  downloader: Downloader<T>,
  host: HostInfo,
  workspace_root: Option<PathBuf>,
}

impl<T: Transport> Pipeline<T> {
  pub fn new(downloader: Downloader<T>, host: HostInfo) -> Self {
    Self {
      downloader,
      host,
      workspace_root: None,
    }
  }

  /// Create workspaces under `root` instead of the system temp directory.
  pub fn with_workspace_root(mut self, root: impl Into<PathBuf>) -> Self {
    self.workspace_root = Some(root.into());
    self
  }

  /// Run the whole pipeline.
  ///
  /// Inputs are downloaded into `artifacts_dir` and the finished archive is
  /// written there as well. The workspace is gone by the time this returns,
  /// whatever the outcome.
  pub fn run(&self, manifest: &Manifest, driver: &Path, artifacts_dir: &Path) -> Result<BuildOutput, PipelineError> {
    let mut progress = Progress::new();
    info!(tool = %manifest.tool, host = %self.host, "starting build");

    match self.run_stages(&mut progress, manifest, driver, artifacts_dir) {
      Ok(output) => {
        progress.enter(Stage::Done);
        Ok(output)
      }
      Err(e) => {
        error!(stage = %e.stage(), error = %e, "build failed");
        progress.enter(Stage::Failed);
        Err(e)
      }
    }
  }

  fn run_stages(
    &self,
    progress: &mut Progress,
    manifest: &Manifest,
    driver: &Path,
    artifacts_dir: &Path,
  ) -> Result<BuildOutput, PipelineError> {
    let arch = self.host.arch;
    let artifacts = manifest.artifacts_for(arch);

    progress.enter(Stage::FetchingInputs);
    let mut fetched = Vec::with_capacity(artifacts.len());
    for spec in &artifacts {
      let result = self
        .downloader
        .fetch(spec, artifacts_dir)
        .map_err(|source| PipelineError::Fetch {
          name: spec.name.clone(),
          source,
        })?;
      fetched.push(result.path);
    }

    progress.enter(Stage::Staging);
    if !driver.is_file() {
      return Err(PipelineError::MissingDriver {
        path: driver.to_path_buf(),
      });
    }
    let workspace = Workspace::create(self.workspace_root.as_deref()).map_err(PipelineError::Workspace)?;
    let stage = |path: &Path| {
      workspace.stage(path).map_err(|source| PipelineError::Copy {
        path: path.to_path_buf(),
        source,
      })
    };
    for path in &fetched {
      stage(path.as_path())?;
    }
    let staged_driver = stage(driver)?;

    progress.enter(Stage::Building);
    let env = BuildEnvironment::new(manifest, &artifacts, &self.host);
    for (key, value) in env.iter() {
      debug!(key, value, "build environment");
    }
    run_driver(&staged_driver, workspace.path(), &env)?;

    progress.enter(Stage::Packaging);
    let output = package(
      &workspace.path().join(&manifest.output_dir),
      &manifest.path_prefix,
      &artifacts_dir.join(manifest.archive_name(arch)),
    )?;

    // A leftover workspace does not invalidate the archive; `close` already
    // logs the failure.
    workspace.close().ok();
    Ok(output)
  }
}
