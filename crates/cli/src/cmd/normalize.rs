//! Implementation of the `toolchain-bootstrap normalize-json` command.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};

use toolchain_bootstrap::tablegen::normalize_json;

/// Normalize one tblgen JSON dump, writing to `output` or stdout.
pub fn cmd_normalize_json(input: &Path, output: Option<&Path>) -> Result<()> {
  let data = std::fs::read(input).with_context(|| format!("Failed to read {}", input.display()))?;
  let normalized = normalize_json(&data).with_context(|| format!("Failed to normalize {}", input.display()))?;

  match output {
    Some(path) => {
      std::fs::write(path, normalized).with_context(|| format!("Failed to write {}", path.display()))?;
    }
    None => {
      let mut stdout = std::io::stdout().lock();
      stdout
        .write_all(normalized.as_bytes())
        .context("Failed to write to stdout")?;
    }
  }

  Ok(())
}
