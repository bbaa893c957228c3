//! Error types for build execution, settings, and the result cache.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::archive::ArchiveError;
use crate::util::hash::DigestError;

/// Errors a single build step can fail with.
#[derive(Debug, Error)]
pub enum BuildError {
  /// The product's revision timestamp is missing or not RFC3339.
  #[error("invalid revision timestamp {value:?}: {message}")]
  InvalidRevisionTime { value: String, message: String },

  /// The product's version is not a semantic version.
  #[error("invalid product version {value:?}: {message}")]
  InvalidVersion { value: String, message: String },

  /// The zip name override is not a single file name.
  #[error("invalid zip name {value:?}: must be a single file name")]
  InvalidZipName { value: String },

  /// The instructions ran but did not produce the executable.
  #[error("no file written to BIN_PATH {}", .path.display())]
  ExecutableMissing { path: PathBuf },

  /// The instruction script exited unsuccessfully; `code` is unset when it
  /// was killed by a signal.
  #[error("build instructions {}", exit_description(.code))]
  CmdFailed { code: Option<i32> },

  /// The instruction script was killed through its cancellation handle.
  #[error("build instructions cancelled")]
  Cancelled,

  /// The instruction script outran its timeout and was killed.
  #[error("build instructions timed out after {}", human_duration(.0))]
  TimedOut(Duration),

  #[error("digest error: {0}")]
  Digest(#[from] DigestError),

  #[error("archive error: {0}")]
  Archive(#[from] ArchiveError),

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}

fn exit_description(code: &Option<i32>) -> String {
  match code {
    Some(code) => format!("failed with exit code {}", code),
    None => "terminated by signal".to_string(),
  }
}

fn human_duration(d: &Duration) -> String {
  humantime::format_duration(*d).to_string()
}

/// A step failure, carrying the description of the step that failed.
#[derive(Debug, Error)]
#[error("{description} failed: {source}")]
pub struct StepError {
  pub description: String,
  #[source]
  pub source: BuildError,
}

impl StepError {
  pub fn new(description: impl Into<String>, source: BuildError) -> Self {
    Self {
      description: description.into(),
      source,
    }
  }
}

/// Errors resolving build settings.
#[derive(Debug, Error)]
pub enum SettingsError {
  #[error("shell {name:?} not found")]
  ShellNotFound { name: String },
}

/// Errors reading or writing cached build results.
///
/// A missing cache entry is not an error; see `Build::cached_result`.
#[derive(Debug, Error)]
pub enum CacheError {
  #[error("failed to read cached result {}: {source}", .path.display())]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse cached result {}: {source}", .path.display())]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },

  #[error("failed to serialize result: {0}")]
  Serialize(#[source] serde_json::Error),

  #[error("failed to write cached result {}: {source}", .path.display())]
  Write {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
}
