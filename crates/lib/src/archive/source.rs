//! Directory listing abstraction for archive assembly.
//!
//! The archive builder never touches the filesystem directly; it asks a
//! [`TreeSource`] for directory children and file contents. [`FsSource`] reads
//! a real directory, [`MemoryTree`] serves an in-memory fixture.

use std::ffi::OsString;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

/// What a directory child is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryKind {
  Directory,
  File { size: u64 },
  /// `to_dir` is true when the link resolves to a directory.
  Symlink { target: PathBuf, to_dir: bool },
  Fifo,
  /// Sockets, devices and anything else without a portable representation.
  Other,
}

/// One child of a listed directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceEntry {
  pub name: OsString,
  pub kind: EntryKind,
  /// Permission bits including setuid/setgid/sticky (`0o7777` mask).
  pub mode: u32,
}

impl SourceEntry {
  /// Whether the entry sorts with directories during traversal.
  ///
  /// Symlinks to directories count, but are never descended into.
  pub fn is_dir_like(&self) -> bool {
    matches!(
      self.kind,
      EntryKind::Directory | EntryKind::Symlink { to_dir: true, .. }
    )
  }
}

/// A readable directory tree.
pub trait TreeSource {
  /// Children of the directory at `rel` (empty path for the root), in any order.
  fn list_dir(&self, rel: &Path) -> io::Result<Vec<SourceEntry>>;

  /// Contents of the regular file at `rel`.
  fn open_file(&self, rel: &Path) -> io::Result<Box<dyn Read + '_>>;
}

/// A directory on disk. Symlinks are reported, not followed.
#[derive(Debug, Clone)]
pub struct FsSource {
  root: PathBuf,
}

impl FsSource {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }
}

impl TreeSource for FsSource {
  fn list_dir(&self, rel: &Path) -> io::Result<Vec<SourceEntry>> {
    let dir = self.root.join(rel);
    let mut entries = Vec::new();

    for dirent in fs::read_dir(&dir)? {
      let dirent = dirent?;
      let path = dirent.path();
      let metadata = fs::symlink_metadata(&path)?;
      let file_type = metadata.file_type();

      let kind = if file_type.is_dir() {
        EntryKind::Directory
      } else if file_type.is_file() {
        EntryKind::File { size: metadata.len() }
      } else if file_type.is_symlink() {
        EntryKind::Symlink {
          target: fs::read_link(&path)?,
          to_dir: fs::metadata(&path).map(|m| m.is_dir()).unwrap_or(false),
        }
      } else if is_fifo(&file_type) {
        EntryKind::Fifo
      } else {
        EntryKind::Other
      };

      entries.push(SourceEntry {
        name: dirent.file_name(),
        mode: mode_of(&metadata, &kind),
        kind,
      });
    }

    Ok(entries)
  }

  fn open_file(&self, rel: &Path) -> io::Result<Box<dyn Read + '_>> {
    Ok(Box::new(fs::File::open(self.root.join(rel))?))
  }
}

#[cfg(unix)]
fn mode_of(metadata: &fs::Metadata, _kind: &EntryKind) -> u32 {
  use std::os::unix::fs::PermissionsExt;
  metadata.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn mode_of(metadata: &fs::Metadata, kind: &EntryKind) -> u32 {
  let base = match kind {
    EntryKind::Directory | EntryKind::Symlink { .. } => 0o755,
    _ => 0o644,
  };
  if metadata.permissions().readonly() { base & !0o222 } else { base }
}

#[cfg(unix)]
fn is_fifo(file_type: &fs::FileType) -> bool {
  use std::os::unix::fs::FileTypeExt;
  file_type.is_fifo()
}

#[cfg(not(unix))]
fn is_fifo(_file_type: &fs::FileType) -> bool {
  false
}

#[derive(Debug, Clone)]
enum MemoryNode {
  Dir { mode: u32 },
  File { mode: u32, content: Vec<u8> },
  Symlink { target: PathBuf, to_dir: bool },
}

/// In-memory directory tree.
///
/// Children are listed in reverse insertion order, so anything that relies
/// on listing order instead of sorting shows up in tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryTree {
  nodes: Vec<(PathBuf, MemoryNode)>,
}

impl MemoryTree {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn dir(mut self, path: impl Into<PathBuf>, mode: u32) -> Self {
    self.nodes.push((path.into(), MemoryNode::Dir { mode }));
    self
  }

  pub fn file(mut self, path: impl Into<PathBuf>, content: impl Into<Vec<u8>>, mode: u32) -> Self {
    self.nodes.push((
      path.into(),
      MemoryNode::File {
        mode,
        content: content.into(),
      },
    ));
    self
  }

  pub fn symlink(mut self, path: impl Into<PathBuf>, target: impl Into<PathBuf>) -> Self {
    self.nodes.push((
      path.into(),
      MemoryNode::Symlink {
        target: target.into(),
        to_dir: false,
      },
    ));
    self
  }

  pub fn dir_symlink(mut self, path: impl Into<PathBuf>, target: impl Into<PathBuf>) -> Self {
    self.nodes.push((
      path.into(),
      MemoryNode::Symlink {
        target: target.into(),
        to_dir: true,
      },
    ));
    self
  }

  fn node(&self, rel: &Path) -> Option<&MemoryNode> {
    self.nodes.iter().find(|(path, _)| path == rel).map(|(_, node)| node)
  }
}

impl TreeSource for MemoryTree {
  fn list_dir(&self, rel: &Path) -> io::Result<Vec<SourceEntry>> {
    let is_root = rel.as_os_str().is_empty();
    if !is_root && !matches!(self.node(rel), Some(MemoryNode::Dir { .. })) {
      return Err(io::Error::new(
        io::ErrorKind::NotFound,
        format!("no directory at {}", rel.display()),
      ));
    }

    let entries = self
      .nodes
      .iter()
      .rev()
      .filter(|(path, _)| path.parent() == Some(rel))
      .filter_map(|(path, node)| {
        let name = path.file_name()?.to_os_string();
        let (kind, mode) = match node {
          MemoryNode::Dir { mode } => (EntryKind::Directory, *mode),
          MemoryNode::File { mode, content } => (
            EntryKind::File {
              size: content.len() as u64,
            },
            *mode,
          ),
          MemoryNode::Symlink { target, to_dir } => (
            EntryKind::Symlink {
              target: target.clone(),
              to_dir: *to_dir,
            },
            0o777,
          ),
        };
        Some(SourceEntry { name, kind, mode })
      })
      .collect();

    Ok(entries)
  }

  fn open_file(&self, rel: &Path) -> io::Result<Box<dyn Read + '_>> {
    match self.node(rel) {
      Some(MemoryNode::File { content, .. }) => Ok(Box::new(content.as_slice())),
      _ => Err(io::Error::new(
        io::ErrorKind::NotFound,
        format!("no file at {}", rel.display()),
      )),
    }
  }
}
