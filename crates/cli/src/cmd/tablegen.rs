//! Implementation of the `toolchain-bootstrap tablegen` command.

use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};

use toolchain_bootstrap::tablegen::update_tablegen;

use crate::output::{Facts, Status, format_elapsed, status};

/// Regenerate option table dumps for an LLVM checkout.
pub fn cmd_tablegen(llvm_dir: &Path, out_dir: &Path, tblgen: &str) -> Result<()> {
  let start = Instant::now();
  let written = update_tablegen(llvm_dir, out_dir, tblgen)
    .with_context(|| format!("Failed to update tablegen output from {}", llvm_dir.display()))?;

  status(
    Status::Done,
    &format!("Wrote {} file(s) to {}", written.len(), out_dir.display()),
  );
  let facts = written
    .iter()
    .filter_map(|path| path.file_name())
    .fold(Facts::new(), |facts, name| facts.add("file", name.to_string_lossy()));
  facts.add("time", format_elapsed(start.elapsed())).print();

  Ok(())
}
