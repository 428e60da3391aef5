//! Compression and atomic commit of the final archive.

use std::io::{BufWriter, Write};
use std::path::Path;

use tempfile::NamedTempFile;
use tracing::{debug, info};

use super::types::{BuildOutput, PipelineError};
use crate::archive::{FsSource, build_archive};
use crate::consts::COMPRESSION_LEVEL;
use crate::util::hash::HashingWriter;

/// Archive `tree` under `prefix`, compress it and commit it to `dest`.
///
/// The stream is written to a temporary file next to `dest` and renamed over
/// it only after the compressed frame is complete, so `dest` is either absent,
/// the previous artifact, or the complete new one.
pub fn package(tree: &Path, prefix: &str, dest: &Path) -> Result<BuildOutput, PipelineError> {
  if !tree.is_dir() {
    return Err(PipelineError::MissingOutput {
      path: tree.to_path_buf(),
    });
  }

  let dest_dir = match dest.parent() {
    Some(parent) if !parent.as_os_str().is_empty() => parent,
    _ => Path::new("."),
  };
  let write_err = |source| PipelineError::Write {
    path: dest.to_path_buf(),
    source,
  };

  std::fs::create_dir_all(dest_dir).map_err(write_err)?;
  let mut tmp = NamedTempFile::new_in(dest_dir).map_err(write_err)?;
  debug!(tmp = %tmp.path().display(), level = COMPRESSION_LEVEL, "compressing archive");

  let hashing = HashingWriter::new(BufWriter::new(tmp.as_file_mut()));
  let encoder = zstd::Encoder::new(hashing, COMPRESSION_LEVEL).map_err(write_err)?;
  let (encoder, stats) = build_archive(&FsSource::new(tree), Some(Path::new(prefix)), encoder)?;
  let hashing = encoder.finish().map_err(write_err)?;

  let size = hashing.bytes_written();
  let (mut buffered, sha256) = hashing.finish();
  buffered.flush().map_err(write_err)?;
  drop(buffered);

  tmp.as_file().sync_all().map_err(write_err)?;
  tmp.persist(dest).map_err(|e| write_err(e.error))?;

  info!(
    path = %dest.display(),
    entries = stats.entries,
    size,
    sha256 = %sha256,
    "wrote archive"
  );

  Ok(BuildOutput {
    path: dest.to_path_buf(),
    sha256,
    size,
    stats,
  })
}
