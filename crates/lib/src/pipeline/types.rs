//! Types for pipeline runs.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::archive::{ArchiveError, ArchiveStats};
use crate::fetch::FetchError;
use crate::util::hash::ContentHash;

/// Position of a run in its lifecycle.
///
/// A run moves `Init → FetchingInputs → Staging → Building → Packaging → Done`
/// and can drop into `Failed` from any of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
  Init,
  FetchingInputs,
  Staging,
  Building,
  Packaging,
  Done,
  Failed,
}

impl Stage {
  pub fn as_str(&self) -> &'static str {
    match self {
      Stage::Init => "init",
      Stage::FetchingInputs => "fetching inputs",
      Stage::Staging => "staging",
      Stage::Building => "building",
      Stage::Packaging => "packaging",
      Stage::Done => "done",
      Stage::Failed => "failed",
    }
  }

  /// Whether a run in this stage has finished, successfully or not.
  pub fn is_terminal(&self) -> bool {
    matches!(self, Stage::Done | Stage::Failed)
  }
}

impl fmt::Display for Stage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Errors that abort a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
  #[error("failed to fetch '{name}': {source}")]
  Fetch {
    name: String,
    #[source]
    source: FetchError,
  },

  #[error("build driver not found at {}", path.display())]
  MissingDriver { path: PathBuf },

  #[error("failed to create workspace: {0}")]
  Workspace(#[source] std::io::Error),

  #[error("failed to stage {}: {source}", path.display())]
  Copy {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to launch build driver {}: {source}", path.display())]
  Spawn {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("build driver failed with exit code {}", code.map_or_else(|| "none (terminated by signal)".to_string(), |c| c.to_string()))]
  DriverFailed { code: Option<i32> },

  #[error("build output directory {} does not exist", path.display())]
  MissingOutput { path: PathBuf },

  #[error("failed to archive build output: {0}")]
  Archive(#[from] ArchiveError),

  #[error("failed to write {}: {source}", path.display())]
  Write {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
}

impl PipelineError {
  /// The stage the run was in when this error occurred.
  pub fn stage(&self) -> Stage {
    match self {
      PipelineError::Fetch { .. } => Stage::FetchingInputs,
      PipelineError::MissingDriver { .. } | PipelineError::Workspace(_) | PipelineError::Copy { .. } => Stage::Staging,
      PipelineError::Spawn { .. } | PipelineError::DriverFailed { .. } => Stage::Building,
      PipelineError::MissingOutput { .. } | PipelineError::Archive(_) | PipelineError::Write { .. } => Stage::Packaging,
    }
  }

  /// Exit code of the build driver, when it ran and failed.
  pub fn driver_exit_code(&self) -> Option<i32> {
    match self {
      PipelineError::DriverFailed { code } => *code,
      _ => None,
    }
  }
}

/// Result of a successful run.
#[derive(Debug, Clone)]
pub struct BuildOutput {
  /// Final location of the compressed archive.
  pub path: PathBuf,
  /// Digest of the compressed archive.
  pub sha256: ContentHash,
  /// Size of the compressed archive in bytes.
  pub size: u64,
  pub stats: ArchiveStats,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn errors_report_their_stage() {
    let io = || std::io::Error::other("boom");

    assert_eq!(
      PipelineError::MissingDriver {
        path: PathBuf::from("scripts/clang-macos.sh")
      }
      .stage(),
      Stage::Staging
    );
    assert_eq!(PipelineError::Workspace(io()).stage(), Stage::Staging);
    assert_eq!(
      PipelineError::Spawn {
        path: PathBuf::from("driver"),
        source: io()
      }
      .stage(),
      Stage::Building
    );
    assert_eq!(PipelineError::DriverFailed { code: Some(2) }.stage(), Stage::Building);
    assert_eq!(
      PipelineError::MissingOutput {
        path: PathBuf::from("out/toolchain")
      }
      .stage(),
      Stage::Packaging
    );
    assert_eq!(
      PipelineError::Fetch {
        name: "cmake".into(),
        source: FetchError::Integrity {
          url: "https://example.com/cmake.tar.gz".into(),
          expected: "a".repeat(64),
          actual: "b".repeat(64),
        },
      }
      .stage(),
      Stage::FetchingInputs
    );
  }

  #[test]
  fn integrity_failure_names_both_digests() {
    let err = PipelineError::Fetch {
      name: "ninja".into(),
      source: FetchError::Integrity {
        url: "https://example.com/ninja.zip".into(),
        expected: "a".repeat(64),
        actual: "b".repeat(64),
      },
    };
    let message = err.to_string();
    assert!(message.contains(&"a".repeat(64)));
    assert!(message.contains(&"b".repeat(64)));
  }

  #[test]
  fn driver_failure_message() {
    assert_eq!(
      PipelineError::DriverFailed { code: Some(3) }.to_string(),
      "build driver failed with exit code 3"
    );
    assert_eq!(PipelineError::DriverFailed { code: Some(3) }.driver_exit_code(), Some(3));
    assert!(PipelineError::DriverFailed { code: None }.to_string().contains("signal"));
  }

  #[test]
  fn terminal_stages() {
    assert!(Stage::Done.is_terminal());
    assert!(Stage::Failed.is_terminal());
    assert!(!Stage::Building.is_terminal());
    assert_eq!(Stage::FetchingInputs.to_string(), "fetching inputs");
  }
}
