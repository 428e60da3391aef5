//! Ephemeral staging directory owned by a single run.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::{debug, warn};

use crate::consts::WORKSPACE_PREFIX;

/// Scratch directory that holds staged inputs while the driver runs.
///
/// The directory and everything in it is removed when the value is dropped,
/// whether the run succeeded or not.
#[derive(Debug)]
pub struct Workspace {
  dir: TempDir,
}

impl Workspace {
  /// Create a fresh workspace, under `root` when given, otherwise in the
  /// system temporary directory.
  pub fn create(root: Option<&Path>) -> io::Result<Self> {
    let mut builder = tempfile::Builder::new();
    builder.prefix(WORKSPACE_PREFIX);
    let dir = match root {
      Some(root) => {
        // The driver is spawned by path with the workspace as its cwd, so the
        // workspace path must not depend on our own cwd.
        let root = std::path::absolute(root)?;
        fs::create_dir_all(&root)?;
        builder.tempdir_in(&root)?
      }
      None => builder.tempdir()?,
    };
    debug!(path = %dir.path().display(), "created workspace");
    Ok(Self { dir })
  }

  pub fn path(&self) -> &Path {
    self.dir.path()
  }

  /// Copy `src` into the workspace root, keeping its file name and
  /// permission bits.
  pub fn stage(&self, src: &Path) -> io::Result<PathBuf> {
    let name = src
      .file_name()
      .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))?;
    let dest = self.path().join(name);
    fs::copy(src, &dest)?;
    debug!(from = %src.display(), to = %dest.display(), "staged");
    Ok(dest)
  }

  /// Remove the workspace now, reporting failures instead of ignoring them.
  pub fn close(self) -> io::Result<()> {
    let path = self.path().to_path_buf();
    self.dir.close().inspect_err(|e| {
      warn!(path = %path.display(), error = %e, "failed to remove workspace");
    })
  }
}
