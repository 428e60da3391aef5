//! Types for artifact downloads.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::consts::DOWNLOAD_ATTEMPTS;

/// Transport level failure. Always retryable.
#[derive(Debug, Error)]
pub enum TransferError {
  /// The request could not be sent or the connection failed.
  #[error("request failed: {0}")]
  Request(#[from] reqwest::Error),

  /// The server answered with a non-success status.
  #[error("server responded with HTTP {0}")]
  Status(u16),

  /// The connection broke while the body was being read.
  #[error("connection interrupted: {0}")]
  Stream(#[source] std::io::Error),
}

/// Errors that can occur while fetching an artifact.
#[derive(Debug, Error)]
pub enum FetchError {
  /// The downloaded bytes do not hash to the pinned digest.
  #[error("integrity mismatch on {url}: wanted sha256={expected}; got sha256={actual}")]
  Integrity {
    url: String,
    expected: String,
    actual: String,
  },

  /// Every attempt failed at the transport level.
  #[error("download of {url} failed after {attempts} attempts: {source}")]
  Transfer {
    url: String,
    attempts: u32,
    #[source]
    source: TransferError,
  },

  /// Local filesystem failure.
  #[error("i/o error on {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
}

impl FetchError {
  /// Whether another attempt could succeed under the default policy.
  pub fn is_retryable(&self) -> bool {
    matches!(self, FetchError::Transfer { .. })
  }

  pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
    FetchError::Io {
      path: path.into(),
      source,
    }
  }
}

/// Lifecycle of one artifact download.
///
/// `Absent -> Fetching -> Verified` or `Absent -> Fetching -> Failed`; a
/// cached file with the right digest goes straight from `Absent` to
/// `Verified`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadState {
  Absent,
  Fetching { attempt: u32 },
  Verified { cached: bool },
  Failed,
}

impl fmt::Display for DownloadState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      DownloadState::Absent => write!(f, "absent"),
      DownloadState::Fetching { attempt } => write!(f, "fetching (attempt {attempt})"),
      DownloadState::Verified { cached: true } => write!(f, "verified (cached)"),
      DownloadState::Verified { cached: false } => write!(f, "verified"),
      DownloadState::Failed => write!(f, "failed"),
    }
  }
}

/// A successfully fetched artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fetched {
  pub path: PathBuf,
  pub state: DownloadState,
  /// Network attempts made; zero for a cache hit.
  pub attempts: u32,
}

/// How hard to try before giving up on an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
  /// Total attempts, including the first one.
  pub max_attempts: u32,

  /// Treat a digest mismatch like a transfer failure and try again.
  pub retry_integrity: bool,
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self {
      max_attempts: DOWNLOAD_ATTEMPTS,
      retry_integrity: false,
    }
  }
}
