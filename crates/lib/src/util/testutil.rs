//! Test utilities for toolchain-bootstrap.

use std::path::{Path, PathBuf};

use crate::manifest::ArtifactSpec;
use crate::util::hash::hash_bytes;

/// Write an executable `/bin/sh` script into `dir`.
#[cfg(unix)]
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
  use std::os::unix::fs::PermissionsExt;

  let path = dir.join(name);
  std::fs::write(&path, format!("#!/bin/sh\nset -e\n{body}\n")).unwrap();
  std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
  path
}

/// Artifact spec whose digest matches `content`.
pub fn spec_for(name: &str, url: &str, content: &[u8]) -> ArtifactSpec {
  ArtifactSpec {
    name: name.to_string(),
    url: url.to_string(),
    sha256: hash_bytes(content),
    version: "1.0.0".to_string(),
  }
}
