//! Normalization of `llvm-tblgen --dump-json` output.
//!
//! LLVM's option tables (`Options.td` and friends) are dumped to JSON and
//! checked in. The raw dumps are noisy and unordered, so they are rewritten
//! into a stable form before being written out.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::process::Command;

use serde::Serialize;
use serde_json::ser::{Formatter, PrettyFormatter};
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Key that tblgen adds to every dump and that carries no useful data.
const INSTANCEOF_KEY: &str = "!instanceof";

/// File names that hold option tables.
const OPTION_FILES: [&str; 3] = ["Options.td", "Opts.td", "DarwinLdOptions.td"];

/// Directory name skipped entirely while walking a source tree.
const SKIPPED_DIR: &str = "unittests";

/// Default tblgen executable.
pub const DEFAULT_TBLGEN: &str = "llvm-tblgen-13";

/// Errors from [`normalize_json`].
#[derive(Debug, Error)]
pub enum NormalizeError {
  #[error("invalid JSON: {0}")]
  Json(#[from] serde_json::Error),

  #[error("JSON document is not an object")]
  NotObject,

  #[error("JSON object has no `{INSTANCEOF_KEY}` key")]
  MissingInstanceof,
}

/// Errors from [`update_tablegen`].
#[derive(Debug, Error)]
pub enum TablegenError {
  #[error("failed to walk {}: {source}", path.display())]
  Walk {
    path: PathBuf,
    #[source]
    source: walkdir::Error,
  },

  #[error("failed to run {tblgen}: {source}")]
  Spawn {
    tblgen: String,
    #[source]
    source: io::Error,
  },

  #[error("unusable tblgen output for {}: {source}", path.display())]
  Normalize {
    path: PathBuf,
    #[source]
    source: NormalizeError,
  },

  #[error("i/o error on {}: {source}", path.display())]
  Io {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

/// Rewrite a tblgen JSON dump into its checked-in form.
///
/// Drops the `!instanceof` key, sorts keys at every level, indents by two
/// spaces, escapes everything outside printable ASCII, and ends with a newline.
pub fn normalize_json(data: &[u8]) -> Result<String, NormalizeError> {
  let mut value: serde_json::Value = serde_json::from_slice(data)?;
  let object = value.as_object_mut().ok_or(NormalizeError::NotObject)?;
  object.remove(INSTANCEOF_KEY).ok_or(NormalizeError::MissingInstanceof)?;

  let mut out = Vec::with_capacity(data.len());
  let mut ser = serde_json::Serializer::with_formatter(&mut out, AsciiFormatter::default());
  value.serialize(&mut ser)?;
  out.push(b'\n');

  Ok(String::from_utf8_lossy(&out).into_owned())
}

/// Pretty printer that escapes non-printable and non-ASCII characters as
/// `\uXXXX` (UTF-16 code units).
#[derive(Default)]
struct AsciiFormatter {
  pretty: PrettyFormatter<'static>,
}

impl Formatter for AsciiFormatter {
  fn write_string_fragment<W: ?Sized + io::Write>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()> {
    let mut start = 0;
    for (i, c) in fragment.char_indices() {
      if (' '..='~').contains(&c) {
        continue;
      }
      writer.write_all(&fragment.as_bytes()[start..i])?;
      let mut units = [0u16; 2];
      for unit in c.encode_utf16(&mut units) {
        write!(writer, "\\u{unit:04x}")?;
      }
      start = i + c.len_utf8();
    }
    writer.write_all(&fragment.as_bytes()[start..])
  }

  fn begin_array<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
    self.pretty.begin_array(writer)
  }

  fn end_array<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
    self.pretty.end_array(writer)
  }

  fn begin_array_value<W: ?Sized + io::Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
    self.pretty.begin_array_value(writer, first)
  }

  fn end_array_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
    self.pretty.end_array_value(writer)
  }

  fn begin_object<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
    self.pretty.begin_object(writer)
  }

  fn end_object<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
    self.pretty.end_object(writer)
  }

  fn begin_object_key<W: ?Sized + io::Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
    self.pretty.begin_object_key(writer, first)
  }

  fn begin_object_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
    self.pretty.begin_object_value(writer)
  }

  fn end_object_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
    self.pretty.end_object_value(writer)
  }
}

/// What to do with a file found in an LLVM source tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TdFile {
  /// Not an option table.
  NotOptions,
  /// Dump it to `<name>.json`.
  Output(String),
  /// An option table we deliberately leave alone.
  Ignored,
  /// An option table in a location we have no name for.
  Unhandled,
}

/// Decide where the option table `file_name` in `rel_dir` (relative to the
/// source root) should be written.
pub fn classify_options_file(rel_dir: &Path, file_name: &str) -> TdFile {
  if !OPTION_FILES.contains(&file_name) {
    return TdFile::NotOptions;
  }

  let mut parts = Vec::new();
  for component in rel_dir.components() {
    match component {
      Component::Normal(part) => match part.to_str() {
        Some(part) => parts.push(part),
        None => return TdFile::Unhandled,
      },
      Component::CurDir => {}
      _ => return TdFile::Unhandled,
    }
  }

  match parts.as_slice() {
    ["clang", "include", "clang", "Driver"] => TdFile::Output("clang".to_string()),
    ["lld", "lib", "Driver"] => TdFile::Output("lld-darwin-ld".to_string()),
    ["lld", flavor, ..] => TdFile::Output(format!("lld-{}", flavor.to_lowercase())),
    ["lldb", ..] => TdFile::Ignored,
    ["llvm", "lib", "ToolDrivers", driver, ..] => TdFile::Output(driver.to_string()),
    ["llvm", "tools", "dsymutil", ..] => TdFile::Output("dsymutil".to_string()),
    ["llvm", "tools", tool, ..] => TdFile::Output(tool.to_string()),
    _ => TdFile::Unhandled,
  }
}

/// Regenerate the JSON dumps for every option table under `llvm_dir`.
///
/// Directories are visited depth first with each directory's files handled
/// before its subdirectories, all in name order, so when two tables map to the
/// same output name the last one in that order wins. A tblgen run that exits
/// non-zero is reported and skipped. Returns the files written.
pub fn update_tablegen(llvm_dir: &Path, out_dir: &Path, tblgen: &str) -> Result<Vec<PathBuf>, TablegenError> {
  fs::create_dir_all(out_dir).map_err(|source| TablegenError::Io {
    path: out_dir.to_path_buf(),
    source,
  })?;

  let walker = WalkDir::new(llvm_dir)
    .sort_by(|a, b| {
      a.file_type()
        .is_dir()
        .cmp(&b.file_type().is_dir())
        .then_with(|| a.file_name().cmp(b.file_name()))
    })
    .into_iter()
    .filter_entry(|e| !(e.file_type().is_dir() && e.depth() > 0 && e.file_name() == SKIPPED_DIR));

  let mut written = Vec::new();
  for entry in walker {
    let entry = entry.map_err(|source| TablegenError::Walk {
      path: llvm_dir.to_path_buf(),
      source,
    })?;
    if !entry.file_type().is_file() {
      continue;
    }

    let Ok(rel) = entry.path().strip_prefix(llvm_dir) else {
      continue;
    };
    let rel_dir = rel.parent().unwrap_or(Path::new(""));
    let file_name = entry.file_name().to_string_lossy();

    let out_name = match classify_options_file(rel_dir, &file_name) {
      TdFile::Output(name) => name,
      TdFile::NotOptions | TdFile::Ignored => continue,
      TdFile::Unhandled => {
        warn!(path = %rel.display(), "unhandled td file");
        continue;
      }
    };

    let dest = out_dir.join(format!("{out_name}.json"));
    if let Some(path) = dump_one(llvm_dir, rel, &dest, tblgen)? {
      written.push(path);
    }
  }

  Ok(written)
}

/// Dump a single table. Returns `None` when tblgen rejected it.
fn dump_one(llvm_dir: &Path, rel: &Path, dest: &Path, tblgen: &str) -> Result<Option<PathBuf>, TablegenError> {
  info!(tblgen, source = %rel.display(), dest = %dest.display(), "running tblgen");

  let output = Command::new(tblgen)
    .args(["--dump-json", "-I", "llvm/include"])
    .arg(rel)
    .current_dir(llvm_dir)
    .output()
    .map_err(|source| TablegenError::Spawn {
      tblgen: tblgen.to_string(),
      source,
    })?;

  if !output.status.success() {
    warn!(
      source = %rel.display(),
      code = ?output.status.code(),
      stderr = %String::from_utf8_lossy(&output.stderr).trim(),
      "tblgen failed; skipping"
    );
    return Ok(None);
  }

  let data = normalize_json(&output.stdout).map_err(|source| TablegenError::Normalize {
    path: rel.to_path_buf(),
    source,
  })?;
  fs::write(dest, data).map_err(|source| TablegenError::Io {
    path: dest.to_path_buf(),
    source,
  })?;
  debug!(dest = %dest.display(), "wrote tablegen json");

  Ok(Some(dest.to_path_buf()))
}
