//! Build driver invocation.

use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};

use tracing::{debug, info};

use super::env::BuildEnvironment;
use super::types::PipelineError;

/// Run the build driver at `program` inside `workspace` and wait for it.
///
/// The driver inherits our environment plus `env`. Its stdout is ours; on
/// Unix its stderr is pointed at our stdout too, so the two streams
/// interleave the way they were written.
pub fn run_driver(program: &Path, workspace: &Path, env: &BuildEnvironment) -> Result<ExitStatus, PipelineError> {
  let spawn_err = |source| PipelineError::Spawn {
    path: program.to_path_buf(),
    source,
  };

  let mut command = Command::new(program);
  command
    .current_dir(workspace)
    .envs(env.iter())
    .stdin(Stdio::null())
    .stdout(Stdio::inherit())
    .stderr(merged_stderr().map_err(spawn_err)?);

  info!(driver = %program.display(), "running build driver");
  debug!(cwd = %workspace.display(), vars = env.len(), "spawning process");

  let status = command.status().map_err(spawn_err)?;
  if !status.success() {
    return Err(PipelineError::DriverFailed { code: status.code() });
  }

  debug!("build driver finished");
  Ok(status)
}

#[cfg(unix)]
fn merged_stderr() -> std::io::Result<Stdio> {
  use std::os::fd::AsFd;

  let fd = std::io::stdout().as_fd().try_clone_to_owned()?;
  Ok(Stdio::from(fd))
}

#[cfg(not(unix))]
fn merged_stderr() -> std::io::Result<Stdio> {
  Ok(Stdio::inherit())
}
