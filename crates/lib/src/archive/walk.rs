//! Deterministic traversal of a [`TreeSource`].

use std::collections::VecDeque;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::source::{EntryKind, SourceEntry, TreeSource};

/// A normalized archive member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
  /// Location relative to the walked root.
  pub source_path: PathBuf,
  /// Location inside the archive (prefixed when a prefix was given).
  pub path: PathBuf,
  pub kind: EntryKind,
  /// Normalized permission bits, see [`normalize_mode`].
  pub mode: u32,
}

/// Normalize permission bits.
///
/// Owner and group always get read/write; group execute mirrors owner
/// execute. Other bits and setuid/setgid/sticky pass through.
pub fn normalize_mode(mode: u32) -> u32 {
  let mode = mode | 0o660;
  if mode & 0o100 != 0 { mode | 0o010 } else { mode & !0o010 }
}

struct Frame {
  emit: VecDeque<ArchiveEntry>,
  descend: VecDeque<PathBuf>,
}

/// Lazy iterator over a tree in archive order.
///
/// For every directory: its child directories (sorted), then its other
/// children (sorted), then each child directory's subtree in sorted order.
/// A fresh call to [`walk`] restarts from the root.
pub struct TreeWalk<'a, S: ?Sized> {
  source: &'a S,
  prefix: Option<PathBuf>,
  stack: Vec<Frame>,
  started: bool,
  failed: bool,
}

/// Walk `source`, placing every entry under `prefix` when given.
pub fn walk<'a, S: TreeSource + ?Sized>(source: &'a S, prefix: Option<&Path>) -> TreeWalk<'a, S> {
  TreeWalk {
    source,
    prefix: prefix.map(Path::to_path_buf),
    stack: Vec::new(),
    started: false,
    failed: false,
  }
}

/// Error produced while listing a directory during a walk.
#[derive(Debug, Error)]
#[error("failed to list '{}': {source}", path.display())]
pub struct WalkError {
  pub path: PathBuf,
  #[source]
  pub source: io::Error,
}

impl<S: TreeSource + ?Sized> TreeWalk<'_, S> {
  fn frame_for(&self, dir: &Path) -> Result<Frame, WalkError> {
    let children = self.source.list_dir(dir).map_err(|source| WalkError {
      path: dir.to_path_buf(),
      source,
    })?;

    let (mut dirs, mut others): (Vec<SourceEntry>, Vec<SourceEntry>) =
      children.into_iter().partition(SourceEntry::is_dir_like);
    dirs.sort_by(|a, b| a.name.cmp(&b.name));
    others.sort_by(|a, b| a.name.cmp(&b.name));

    let descend = dirs
      .iter()
      .filter(|e| e.kind == EntryKind::Directory)
      .map(|e| dir.join(&e.name))
      .collect();

    let emit = dirs
      .into_iter()
      .chain(others)
      .map(|e| {
        let source_path = dir.join(&e.name);
        let path = match &self.prefix {
          Some(prefix) => prefix.join(&source_path),
          None => source_path.clone(),
        };
        ArchiveEntry {
          source_path,
          path,
          kind: e.kind,
          mode: normalize_mode(e.mode),
        }
      })
      .collect();

    Ok(Frame { emit, descend })
  }
}

impl<S: TreeSource + ?Sized> Iterator for TreeWalk<'_, S> {
  type Item = Result<ArchiveEntry, WalkError>;

  fn next(&mut self) -> Option<Self::Item> {
    if self.failed {
      return None;
    }

    if !self.started {
      self.started = true;
      match self.frame_for(Path::new("")) {
        Ok(frame) => self.stack.push(frame),
        Err(e) => {
          self.failed = true;
          return Some(Err(e));
        }
      }
    }

    loop {
      let top = self.stack.last_mut()?;

      if let Some(entry) = top.emit.pop_front() {
        return Some(Ok(entry));
      }

      match top.descend.pop_front() {
        Some(dir) => match self.frame_for(&dir) {
          Ok(frame) => self.stack.push(frame),
          Err(e) => {
            self.failed = true;
            return Some(Err(e));
          }
        },
        None => {
          self.stack.pop();
        }
      }
    }
  }
}
