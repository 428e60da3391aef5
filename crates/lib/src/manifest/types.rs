//! Manifest types for toolchain-bootstrap.
//!
//! A manifest is the declarative, versioned description of one toolchain
//! build: which artifacts to pin, which driver program to run, and how to
//! name and lay out the resulting archive.
//!
//! # Example
//!
//! ```toml
//! schema = 1
//! tool = "llvm"
//! driver = "clang-macos.sh"
//! platform = "apple-darwin"
//! deployment_target = "11.0"
//! output_dir = "out/toolchain"
//! path_prefix = "llvm"
//!
//! [[artifacts]]
//! name = "ninja"
//! version = "1.10.2"
//! url = "https://github.com/ninja-build/ninja/releases/download/v1.10.2/ninja-mac.zip"
//! sha256 = "6fa359f491fac7e5185273c6421a000eea6a2f0febf0ac03ac900bd4d80ed2a5"
//! ```

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::fetch::url_to_filename;
use crate::platform::Arch;
use crate::util::hash::ContentHash;

/// A pinned, hash-identified build input.
///
/// The digest covers the exact bytes served at `url` once any transport
/// level compression has been undone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactSpec {
  pub name: String,
  pub url: String,
  pub sha256: ContentHash,
  pub version: String,
}

impl ArtifactSpec {
  /// File name the artifact is stored under locally.
  pub fn file_name(&self) -> String {
    url_to_filename(&self.url)
  }

  /// Name of the environment variable carrying this artifact's version.
  pub fn version_var(&self) -> String {
    format!("{}_VERSION", self.name.to_uppercase())
  }
}

/// A manifest entry, optionally restricted to one architecture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactEntry {
  #[serde(flatten)]
  pub spec: ArtifactSpec,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub arch: Option<Arch>,
}

impl ArtifactEntry {
  pub fn applies_to(&self, arch: Arch) -> bool {
    self.arch.is_none_or(|a| a == arch)
  }
}

/// The complete description of one toolchain build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
  /// Manifest format version.
  pub schema: u32,

  /// Tool identifier; the first component of the archive name.
  pub tool: String,

  /// File name of the build driver program.
  pub driver: String,

  /// Vendor/OS part of the target triple (e.g. `apple-darwin`).
  pub platform: String,

  /// Exported to the driver as `MACOSX_DEPLOYMENT_TARGET`.
  pub deployment_target: String,

  /// Directory, relative to the workspace, the driver leaves its output in.
  pub output_dir: PathBuf,

  /// Top-level directory name inside the archive.
  pub path_prefix: String,

  /// Export `HOST_TRIPLE` to the driver.
  #[serde(default)]
  pub export_host_triple: bool,

  /// Ordered artifact list.
  #[serde(default)]
  pub artifacts: Vec<ArtifactEntry>,
}

impl Manifest {
  /// The artifacts to fetch on `arch`, in manifest order.
  pub fn artifacts_for(&self, arch: Arch) -> Vec<&ArtifactSpec> {
    self
      .artifacts
      .iter()
      .filter(|entry| entry.applies_to(arch))
      .map(|entry| &entry.spec)
      .collect()
  }

  /// File name of the final archive for `arch`.
  pub fn archive_name(&self, arch: Arch) -> String {
    format!("{}-{}-{}.tar.zst", self.tool, arch, self.platform)
  }
}

/// Tools that ship with a built-in manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tool {
  Llvm,
}

impl Tool {
  pub const ALL: &'static [Tool] = &[Tool::Llvm];

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Llvm => "llvm",
    }
  }
}

impl fmt::Display for Tool {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

impl FromStr for Tool {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Tool::ALL
      .iter()
      .copied()
      .find(|tool| tool.as_str() == s)
      .ok_or_else(|| format!("unknown tool: {s}"))
  }
}
