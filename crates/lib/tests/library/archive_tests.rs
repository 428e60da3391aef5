//! Deterministic archives built from real directories.

use std::fs;
use std::path::Path;

use tempfile::TempDir;
use toolchain_bootstrap::archive::{EntryKind, FsSource, MemoryTree, build_archive, walk};
use toolchain_bootstrap::consts::DEFAULT_MTIME;

fn populate(root: &Path, names: &[&str]) {
  for name in names {
    let path = root.join(name);
    if name.ends_with('/') {
      fs::create_dir_all(&path).unwrap();
    } else {
      fs::create_dir_all(path.parent().unwrap()).unwrap();
      fs::write(&path, format!("contents of {name}")).unwrap();
    }
  }
}

#[test]
fn disk_and_memory_trees_agree() {
  let temp = TempDir::new().unwrap();
  populate(temp.path(), &["include/", "include/llvm-c/Core.h", "lib/libLTO.dylib", "NOTICE"]);

  #[cfg(unix)]
  {
    use std::os::unix::fs::PermissionsExt;
    for (path, mode) in [
      ("include", 0o755),
      ("include/llvm-c", 0o755),
      ("lib", 0o755),
      ("include/llvm-c/Core.h", 0o644),
      ("lib/libLTO.dylib", 0o755),
      ("NOTICE", 0o644),
    ] {
      fs::set_permissions(temp.path().join(path), fs::Permissions::from_mode(mode)).unwrap();
    }
  }

  let memory = MemoryTree::new()
    .file("NOTICE", "contents of NOTICE", 0o644)
    .dir("lib", 0o755)
    .file("lib/libLTO.dylib", "contents of lib/libLTO.dylib", 0o755)
    .dir("include", 0o755)
    .dir("include/llvm-c", 0o755)
    .file("include/llvm-c/Core.h", "contents of include/llvm-c/Core.h", 0o644);

  let disk = FsSource::new(temp.path());

  let disk_paths: Vec<_> = walk(&disk, None).map(|e| e.unwrap().path).collect();
  let memory_paths: Vec<_> = walk(&memory, None).map(|e| e.unwrap().path).collect();
  assert_eq!(disk_paths, memory_paths);

  #[cfg(unix)]
  {
    let (disk_bytes, _) = build_archive(&disk, Some(Path::new("llvm")), Vec::new()).unwrap();
    let (memory_bytes, _) = build_archive(&memory, Some(Path::new("llvm")), Vec::new()).unwrap();
    assert_eq!(disk_bytes, memory_bytes);
  }
}

#[test]
fn every_entry_has_fixed_metadata() {
  let temp = TempDir::new().unwrap();
  populate(temp.path(), &["bin/clang", "share/man/", "share/man/clang.1"]);

  let (bytes, stats) = build_archive(&FsSource::new(temp.path()), Some(Path::new("llvm")), Vec::new()).unwrap();
  assert_eq!(stats.files, 2);

  let mut archive = tar::Archive::new(bytes.as_slice());
  for entry in archive.entries().unwrap() {
    let entry = entry.unwrap();
    let header = entry.header();
    assert!(entry.path().unwrap().starts_with("llvm"));
    assert_eq!(header.mtime().unwrap(), DEFAULT_MTIME);
    assert_eq!((header.uid().unwrap(), header.gid().unwrap()), (0, 0));
    assert_eq!(header.username().unwrap(), Some("root"));
    assert_eq!(header.groupname().unwrap(), Some("root"));
  }
}

#[cfg(unix)]
#[test]
fn symlinks_are_not_followed() {
  let temp = TempDir::new().unwrap();
  populate(temp.path(), &["lib/clang/17/include/stddef.h"]);
  std::os::unix::fs::symlink("17", temp.path().join("lib/clang/current")).unwrap();

  let entries: Vec<_> = walk(&FsSource::new(temp.path()), None).map(|e| e.unwrap()).collect();
  let current = entries
    .iter()
    .find(|e| e.path == Path::new("lib/clang/current"))
    .unwrap();

  assert!(matches!(&current.kind, EntryKind::Symlink { target, to_dir: true } if target == Path::new("17")));
  assert_eq!(entries.iter().filter(|e| e.path.starts_with("lib/clang/current")).count(), 1);
}
