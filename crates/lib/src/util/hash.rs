//! Hashing utilities for integrity verification.
//!
//! This module provides:
//! - `ContentHash`: a full 64-character SHA-256 hex digest
//! - `hash_file()`: streaming single file hashing
//! - `hash_bytes()`: arbitrary byte hashing
//! - `HashingWriter`: a writer adapter that hashes everything passing through it

use std::fmt;
use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::consts::CHUNK_SIZE;

/// A full 64-character SHA-256 hash, lowercase hexadecimal.
///
/// Construction through [`FromStr`] or deserialization rejects anything that
/// is not exactly 64 lowercase hex characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentHash(String);

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid sha256 digest '{0}': expected 64 lowercase hex characters")]
pub struct InvalidDigest(pub String);

impl ContentHash {
  pub fn as_str(&self) -> &str {
    &self.0
  }

  fn from_digest(digest: impl AsRef<[u8]>) -> Self {
    Self(hex::encode(digest))
  }
}

impl fmt::Display for ContentHash {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

impl FromStr for ContentHash {
  type Err = InvalidDigest;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let valid = s.len() == 64 && s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
    if valid {
      Ok(Self(s.to_string()))
    } else {
      Err(InvalidDigest(s.to_string()))
    }
  }
}

impl TryFrom<String> for ContentHash {
  type Error = InvalidDigest;

  fn try_from(value: String) -> Result<Self, Self::Error> {
    value.parse()
  }
}

impl From<ContentHash> for String {
  fn from(value: ContentHash) -> Self {
    value.0
  }
}

/// Hash a file's contents.
pub fn hash_file(path: &Path) -> io::Result<ContentHash> {
  let mut file = fs::File::open(path)?;
  hash_reader(&mut file)
}

/// Hash everything a reader yields until EOF.
pub fn hash_reader(reader: &mut impl Read) -> io::Result<ContentHash> {
  let mut hasher = Sha256::new();
  let mut buffer = vec![0u8; CHUNK_SIZE];

  loop {
    let bytes_read = reader.read(&mut buffer)?;
    if bytes_read == 0 {
      break;
    }
    hasher.update(&buffer[..bytes_read]);
  }

  Ok(ContentHash::from_digest(hasher.finalize()))
}

/// Hash arbitrary bytes.
pub fn hash_bytes(data: &[u8]) -> ContentHash {
  ContentHash::from_digest(Sha256::digest(data))
}

/// Writer adapter computing the SHA-256 of all bytes written through it.
pub struct HashingWriter<W> {
  inner: W,
  hasher: Sha256,
  bytes_written: u64,
}

impl<W> HashingWriter<W> {
  pub fn new(inner: W) -> Self {
    Self {
      inner,
      hasher: Sha256::new(),
      bytes_written: 0,
    }
  }

  pub fn bytes_written(&self) -> u64 {
    self.bytes_written
  }

  /// Consume the adapter, returning the inner writer and the digest.
  pub fn finish(self) -> (W, ContentHash) {
    (self.inner, ContentHash::from_digest(self.hasher.finalize()))
  }
}

impl<W: Write> Write for HashingWriter<W> {
  fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
    let written = self.inner.write(buf)?;
    self.hasher.update(&buf[..written]);
    self.bytes_written += written as u64;
    Ok(written)
  }

  fn flush(&mut self) -> io::Result<()> {
    self.inner.flush()
  }
}
