//! Integrity-verified artifact downloads.
//!
//! Downloads stream into `<dest>.tmp` while being hashed and are renamed into
//! place only once the digest matches, so nothing partial or corrupt is ever
//! visible under the final name. A destination that already hashes correctly
//! is reused without touching the network.

mod transport;
mod types;

use std::fs::{self, File};
use std::io::{BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use flate2::read::MultiGzDecoder;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::consts::CHUNK_SIZE;
use crate::manifest::ArtifactSpec;
use crate::util::hash::{HashingWriter, hash_file};

pub use transport::{HttpTransport, Response, Transport};
pub use types::{DownloadState, FetchError, Fetched, RetryPolicy, TransferError};

/// Outcome of a single failed attempt.
enum AttemptError {
  Transfer(TransferError),
  Fatal(FetchError),
}

/// Fetches manifest entries into a local directory.
pub struct Downloader<T = HttpTransport> {
  transport: T,
  policy: RetryPolicy,
}

impl Downloader<HttpTransport> {
  /// Downloader over a real HTTP client with the default retry policy.
  pub fn http() -> Result<Self, TransferError> {
    Ok(Self::new(HttpTransport::new()?))
  }
}

impl<T: Transport> Downloader<T> {
  pub fn new(transport: T) -> Self {
    Self {
      transport,
      policy: RetryPolicy::default(),
    }
  }

  pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
    self.policy = policy;
    self
  }

  pub fn transport(&self) -> &T {
    &self.transport
  }

  pub fn into_transport(self) -> T {
    self.transport
  }

  /// Fetch `spec` into `dest_dir`, returning where it landed.
  ///
  /// Transfer failures are retried up to the policy's attempt budget with no
  /// delay in between. Integrity failures abort immediately unless the policy
  /// opts into retrying them.
  pub fn fetch(&self, spec: &ArtifactSpec, dest_dir: &Path) -> Result<Fetched, FetchError> {
    fs::create_dir_all(dest_dir).map_err(|e| FetchError::io(dest_dir, e))?;

    let dest = dest_dir.join(spec.file_name());
    info!(url = %spec.url, path = %dest.display(), "downloading");

    if dest.exists() {
      debug!(path = %dest.display(), "checking cached file");
      match hash_file(&dest) {
        Ok(actual) if actual == spec.sha256 => {
          info!(path = %dest.display(), "exists and passes integrity checks");
          return Ok(Fetched {
            path: dest,
            state: DownloadState::Verified { cached: true },
            attempts: 0,
          });
        }
        Ok(actual) => {
          warn!(expected = %spec.sha256, actual = %actual, "existing file hash is wrong; removing");
        }
        Err(e) => {
          warn!(error = %e, "existing file could not be read; removing");
        }
      }
      fs::remove_file(&dest).map_err(|e| FetchError::io(&dest, e))?;
    }

    let tmp = temp_path(&dest);
    let max_attempts = self.policy.max_attempts.max(1);
    let mut last_failure = None;

    for attempt in 1..=max_attempts {
      let state = DownloadState::Fetching { attempt };
      debug!(name = %spec.name, state = %state, "download attempt");

      let failure = match self.attempt(spec, &tmp) {
        Ok(()) => {
          fs::rename(&tmp, &dest).map_err(|e| FetchError::io(&dest, e))?;
          info!(url = %spec.url, attempts = attempt, "successfully downloaded");
          return Ok(Fetched {
            path: dest,
            state: DownloadState::Verified { cached: false },
            attempts: attempt,
          });
        }
        Err(failure) => failure,
      };

      remove_if_exists(&tmp)?;

      match failure {
        AttemptError::Transfer(e) => {
          warn!(url = %spec.url, attempt, error = %e, "transfer failed; retrying");
          last_failure = Some(FetchError::Transfer {
            url: spec.url.clone(),
            attempts: attempt,
            source: e,
          });
        }
        AttemptError::Fatal(e @ FetchError::Integrity { .. }) if self.policy.retry_integrity => {
          warn!(url = %spec.url, attempt, error = %e, "integrity check failed; retrying");
          last_failure = Some(e);
        }
        AttemptError::Fatal(e) => {
          debug!(name = %spec.name, state = %DownloadState::Failed, "download aborted");
          return Err(e);
        }
      }
    }

    debug!(name = %spec.name, state = %DownloadState::Failed, "download attempts exhausted");
    // The loop runs at least once and every non-returning arm records a failure.
    Err(last_failure.unwrap_or_else(|| FetchError::io(&dest, std::io::Error::other("no download attempt made"))))
  }

  fn attempt(&self, spec: &ArtifactSpec, tmp: &Path) -> Result<(), AttemptError> {
    let response = self.transport.get(&spec.url).map_err(AttemptError::Transfer)?;
    let mut body = decode_body(&spec.url, response);

    let fatal = |e: std::io::Error| AttemptError::Fatal(FetchError::io(tmp, e));
    let file = File::create(tmp).map_err(fatal)?;
    let mut writer = HashingWriter::new(BufWriter::new(file));
    let mut buffer = vec![0u8; CHUNK_SIZE];

    loop {
      let n = match body.read(&mut buffer) {
        Ok(0) => break,
        Ok(n) => n,
        Err(e) if e.kind() == ErrorKind::Interrupted => continue,
        Err(e) => return Err(AttemptError::Transfer(TransferError::Stream(e))),
      };
      writer.write_all(&buffer[..n]).map_err(fatal)?;
    }

    let size = writer.bytes_written();
    let (buffered, actual) = writer.finish();
    let file = buffered.into_inner().map_err(|e| fatal(e.into_error()))?;
    file.sync_all().map_err(fatal)?;
    drop(file);

    debug!(url = %spec.url, size, sha256 = %actual, "stream complete");

    if actual != spec.sha256 {
      return Err(AttemptError::Fatal(FetchError::Integrity {
        url: spec.url.clone(),
        expected: spec.sha256.to_string(),
        actual: actual.to_string(),
      }));
    }

    Ok(())
  }
}

/// Undo gzip transport encoding unless the URL itself names a gzip file.
fn decode_body(url: &str, response: Response) -> Box<dyn Read> {
  let gzip = response.content_encoding.as_deref() == Some("gzip");
  let file_name = url_to_filename(url);
  let already_compressed = file_name.ends_with(".gz") || file_name.ends_with(".tgz");

  if gzip && !already_compressed {
    debug!(url, "decoding gzip transfer encoding");
    Box::new(MultiGzDecoder::new(response.body))
  } else {
    response.body
  }
}

fn temp_path(dest: &Path) -> PathBuf {
  let mut name = dest.file_name().map(|n| n.to_os_string()).unwrap_or_default();
  name.push(".tmp");
  dest.with_file_name(name)
}

fn remove_if_exists(path: &Path) -> Result<(), FetchError> {
  match fs::remove_file(path) {
    Ok(()) => Ok(()),
    Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
    Err(e) => Err(FetchError::io(path, e)),
  }
}

/// Convert a URL to a safe filename.
///
/// Takes the last path component and sanitizes it. Falls back to hash of URL
/// if no suitable filename can be extracted.
pub fn url_to_filename(url: &str) -> String {
  if let Some(filename) = url.rsplit('/').next() {
    let filename = filename.split(['?', '#']).next().unwrap_or(filename);

    let sanitized: String = filename
      .chars()
      .map(|c| {
        if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
          c
        } else {
          '_'
        }
      })
      .collect();

    if !sanitized.is_empty() && sanitized != "." && sanitized != ".." {
      return sanitized;
    }
  }

  let mut hasher = Sha256::new();
  hasher.update(url.as_bytes());
  format!("download_{}", &hex::encode(hasher.finalize())[..16])
}
