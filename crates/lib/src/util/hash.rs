//! Digest provider for build artifacts and cache keys.
//!
//! This module provides:
//! - `ContentHash`: a full 64-character sha256 for artifact verification
//! - `hash_file()`: streaming file digest
//! - `hash_bytes()`: arbitrary byte digest
//! - `compound_id()`: a stable, path-safe identifier for any serializable value

use std::fs;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::consts::COMPOUND_ID_LEN;

/// A full 64-character SHA256 hash of some content.
///
/// # Format
///
/// The hash is a lowercase hexadecimal string (64 characters).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash(pub String);

impl std::fmt::Display for ContentHash {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// Error while digesting a file.
#[derive(Debug, thiserror::Error)]
pub enum DigestError {
  #[error("failed to read file {path}: {message}")]
  ReadFile { path: String, message: String },
}

/// Hash a file's contents.
///
/// Returns the full 64-character SHA256 hash of the file.
pub fn hash_file(path: &Path) -> Result<ContentHash, DigestError> {
  let read_err = |e: std::io::Error| DigestError::ReadFile {
    path: path.display().to_string(),
    message: e.to_string(),
  };

  let mut file = fs::File::open(path).map_err(read_err)?;
  let mut hasher = Sha256::new();
  let mut buffer = [0u8; 8192];

  loop {
    let bytes_read = file.read(&mut buffer).map_err(read_err)?;
    if bytes_read == 0 {
      break;
    }
    hasher.update(&buffer[..bytes_read]);
  }

  Ok(ContentHash(format!("{:x}", hasher.finalize())))
}

/// Hash arbitrary bytes.
pub fn hash_bytes(data: &[u8]) -> ContentHash {
  let mut hasher = Sha256::new();
  hasher.update(data);
  ContentHash(format!("{:x}", hasher.finalize()))
}

/// Derive a stable identifier from any serializable value.
///
/// The value is serialized to JSON, hashed, and truncated to
/// [`COMPOUND_ID_LEN`] hex characters so it can be used as a single path
/// segment. Struct field order is fixed by the type definition, so equal
/// values always yield equal IDs.
pub fn compound_id<T: Serialize + ?Sized>(value: &T) -> String {
  // Plain data structs with string keys cannot fail to serialize.
  let serialized = serde_json::to_string(value).expect("failed to serialize compound id input");
  let full = hash_bytes(serialized.as_bytes());
  full.0[..COMPOUND_ID_LEN].to_string()
}
