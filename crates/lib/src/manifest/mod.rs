//! Artifact manifests.
//!
//! Manifests are static TOML documents. Every tool selector has one built
//! into the binary; a file on disk can replace it.

mod types;

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::consts::MANIFEST_SCHEMA;
use crate::platform::Arch;

pub use types::*;

const LLVM_MANIFEST: &str = include_str!("../../manifests/llvm.toml");

/// Errors raised while loading or validating a manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
  #[error("failed to read manifest '{path}': {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse manifest: {0}")]
  Parse(#[from] toml::de::Error),

  #[error("unsupported manifest schema {found} (expected {expected})")]
  Schema { found: u32, expected: u32 },

  #[error("manifest is for tool '{found}', expected '{expected}'")]
  ToolMismatch { found: String, expected: String },

  #[error("invalid manifest: {0}")]
  Invalid(String),
}

impl Manifest {
  /// Parse and validate a manifest from TOML text.
  pub fn from_toml(text: &str) -> Result<Self, ManifestError> {
    let manifest: Manifest = toml::from_str(text)?;
    manifest.validate()?;
    Ok(manifest)
  }

  /// Read, parse and validate a manifest file.
  pub fn load(path: &Path) -> Result<Self, ManifestError> {
    debug!(path = %path.display(), "loading manifest");
    let text = std::fs::read_to_string(path).map_err(|source| ManifestError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    Self::from_toml(&text)
  }

  /// The manifest shipped for `tool`.
  pub fn builtin(tool: Tool) -> Result<Self, ManifestError> {
    let text = match tool {
      Tool::Llvm => LLVM_MANIFEST,
    };
    Self::from_toml(text)
  }

  /// Check that this manifest describes `tool`.
  pub fn ensure_tool(&self, tool: Tool) -> Result<(), ManifestError> {
    if self.tool != tool.as_str() {
      return Err(ManifestError::ToolMismatch {
        found: self.tool.clone(),
        expected: tool.as_str().to_string(),
      });
    }
    Ok(())
  }

  fn validate(&self) -> Result<(), ManifestError> {
    if self.schema != MANIFEST_SCHEMA {
      return Err(ManifestError::Schema {
        found: self.schema,
        expected: MANIFEST_SCHEMA,
      });
    }

    for (field, value) in [
      ("tool", &self.tool),
      ("driver", &self.driver),
      ("platform", &self.platform),
      ("path_prefix", &self.path_prefix),
    ] {
      if value.trim().is_empty() {
        return Err(ManifestError::Invalid(format!("`{field}` must not be empty")));
      }
    }

    // These end up in the archive file name, so they must not add directories.
    for (field, value) in [("tool", &self.tool), ("driver", &self.driver), ("platform", &self.platform)] {
      if !is_bare_name(value) {
        return Err(ManifestError::Invalid(format!(
          "{field} '{value}' must be a bare file name"
        )));
      }
    }

    for (field, path) in [("output_dir", self.output_dir.as_path()), ("path_prefix", Path::new(&self.path_prefix))] {
      if !is_relative_inside(path) {
        return Err(ManifestError::Invalid(format!(
          "{field} '{}' must be a relative path without `..`",
          path.display()
        )));
      }
    }

    for entry in &self.artifacts {
      let spec = &entry.spec;
      if spec.name.trim().is_empty() {
        return Err(ManifestError::Invalid(format!("artifact for {} has no name", spec.url)));
      }
      if !spec.url.starts_with("http://") && !spec.url.starts_with("https://") {
        return Err(ManifestError::Invalid(format!(
          "artifact '{}' has unsupported url '{}'",
          spec.name, spec.url
        )));
      }
    }

    // Names must be unique within each architecture's view, and so must the
    // local file names since inputs and the driver land in one directory.
    for arch in [Arch::X86_64, Arch::Aarch64] {
      let mut names = HashSet::new();
      let mut files = HashSet::from([self.driver.clone()]);
      for spec in self.artifacts_for(arch) {
        if !names.insert(spec.name.as_str()) {
          return Err(ManifestError::Invalid(format!(
            "artifact '{}' listed twice for {arch}",
            spec.name
          )));
        }
        if !files.insert(spec.file_name()) {
          return Err(ManifestError::Invalid(format!(
            "artifact '{}' collides with another staged file named '{}'",
            spec.name,
            spec.file_name()
          )));
        }
      }
    }

    Ok(())
  }
}

fn is_bare_name(value: &str) -> bool {
  matches!(
    Path::new(value).components().collect::<Vec<_>>().as_slice(),
    [Component::Normal(name)] if *name == std::ffi::OsStr::new(value)
  )
}

fn is_relative_inside(path: &Path) -> bool {
  !path.as_os_str().is_empty() && path.components().all(|c| matches!(c, Component::Normal(_)))
}
