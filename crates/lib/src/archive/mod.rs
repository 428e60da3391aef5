//! Deterministic archive assembly.
//!
//! Produces a tar stream whose bytes depend only on the logical content of a
//! directory tree. Entry order comes from sorting, never from the order the
//! filesystem lists things in; every header carries the same mtime, a zero
//! `root` owner and normalized permissions, and no pax records are written.

mod source;
mod walk;

use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use tar::{Builder, EntryType, Header};
use thiserror::Error;
use tracing::{debug, warn};

use crate::consts::{ARCHIVE_OWNER, DEFAULT_MTIME};

pub use source::{EntryKind, FsSource, MemoryTree, SourceEntry, TreeSource};
pub use walk::{ArchiveEntry, TreeWalk, WalkError, normalize_mode, walk};

/// Errors that can occur while building an archive.
#[derive(Debug, Error)]
pub enum ArchiveError {
  #[error(transparent)]
  Walk(#[from] WalkError),

  #[error("failed to read '{path}': {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to append '{path}' to archive: {source}")]
  Append {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to finish archive: {0}")]
  Finish(#[source] io::Error),
}

/// Counters reported after an archive has been written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArchiveStats {
  pub entries: usize,
  pub files: usize,
  pub content_bytes: u64,
  pub skipped: usize,
}

/// Write the tree in `source` as a tar stream into `writer`.
///
/// Every entry is placed under `prefix` when one is given. Returns the writer
/// once the end-of-archive marker has been written.
pub fn build_archive<S, W>(source: &S, prefix: Option<&Path>, writer: W) -> Result<(W, ArchiveStats), ArchiveError>
where
  S: TreeSource + ?Sized,
  W: Write,
{
  let mut builder = Builder::new(writer);
  let mut stats = ArchiveStats::default();

  for entry in walk(source, prefix) {
    let entry = entry?;
    if append_entry(&mut builder, source, &entry)? {
      stats.entries += 1;
      if let EntryKind::File { size } = entry.kind {
        stats.files += 1;
        stats.content_bytes += size;
      }
    } else {
      stats.skipped += 1;
    }
  }

  let writer = builder.into_inner().map_err(ArchiveError::Finish)?;
  debug!(
    entries = stats.entries,
    files = stats.files,
    bytes = stats.content_bytes,
    "archive written"
  );
  Ok((writer, stats))
}

/// Build a normalized header. Path and link name are filled in by the builder.
fn normalized_header(entry_type: EntryType, size: u64, mode: u32) -> io::Result<Header> {
  let mut header = Header::new_gnu();
  header.set_entry_type(entry_type);
  header.set_size(size);
  header.set_mode(mode);
  header.set_mtime(DEFAULT_MTIME);
  header.set_uid(0);
  header.set_gid(0);
  header.set_username(ARCHIVE_OWNER)?;
  header.set_groupname(ARCHIVE_OWNER)?;
  Ok(header)
}

/// Append one entry. Returns false when the entry kind cannot be archived.
fn append_entry<S, W>(builder: &mut Builder<W>, source: &S, entry: &ArchiveEntry) -> Result<bool, ArchiveError>
where
  S: TreeSource + ?Sized,
  W: Write,
{
  let append_err = |source| ArchiveError::Append {
    path: entry.path.clone(),
    source,
  };

  match &entry.kind {
    EntryKind::File { size } => {
      let mut header = normalized_header(EntryType::Regular, *size, entry.mode).map_err(append_err)?;
      let reader = source.open_file(&entry.source_path).map_err(|source| ArchiveError::Read {
        path: entry.source_path.clone(),
        source,
      })?;
      let mut reader = ExactReader::new(reader, *size);
      builder
        .append_data(&mut header, &entry.path, &mut reader)
        .map_err(append_err)?;
    }
    EntryKind::Symlink { target, .. } => {
      let mut header = normalized_header(EntryType::Symlink, 0, entry.mode).map_err(append_err)?;
      builder
        .append_link(&mut header, &entry.path, target)
        .map_err(append_err)?;
    }
    EntryKind::Directory | EntryKind::Fifo => {
      let entry_type = if entry.kind == EntryKind::Directory {
        EntryType::Directory
      } else {
        EntryType::Fifo
      };
      let mut header = normalized_header(entry_type, 0, entry.mode).map_err(append_err)?;
      builder
        .append_data(&mut header, &entry.path, io::empty())
        .map_err(append_err)?;
    }
    EntryKind::Other => {
      warn!(path = %entry.source_path.display(), "skipping entry of unsupported type");
      return Ok(false);
    }
  }

  Ok(true)
}

/// Reads exactly `expected` bytes, failing if the source is shorter or longer.
///
/// The size in the header is fixed before content is streamed, so a file that
/// changes underneath us must not produce a silently corrupt archive.
struct ExactReader<R> {
  inner: R,
  remaining: u64,
}

impl<R: Read> ExactReader<R> {
  fn new(inner: R, expected: u64) -> Self {
    Self {
      inner,
      remaining: expected,
    }
  }
}

impl<R: Read> Read for ExactReader<R> {
  fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
    if self.remaining == 0 {
      let mut probe = [0u8; 1];
      return match self.inner.read(&mut probe)? {
        0 => Ok(0),
        _ => Err(io::Error::new(io::ErrorKind::InvalidData, "file grew while being archived")),
      };
    }

    let limit = buf.len().min(usize::try_from(self.remaining).unwrap_or(usize::MAX));
    let n = self.inner.read(&mut buf[..limit])?;
    if n == 0 {
      return Err(io::Error::new(
        io::ErrorKind::UnexpectedEof,
        "file shrank while being archived",
      ));
    }
    self.remaining -= n as u64;
    Ok(n)
  }
}
