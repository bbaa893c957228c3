//! Build results.
//!
//! A [`BuildResult`] is created when a run starts, filled in by the
//! [`Runner`](crate::build::Runner) as steps complete, finalized once, and
//! then persisted as JSON at the config's build result cache path:
//!
//! ```text
//! {meta_dir}/buildresult-{source_hash}.json
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::build::config::Config;
use crate::build::types::{BuildError, CacheError};
use crate::util::fs::write_atomic;
use crate::util::hash::hash_file;

/// Name, location, size and digest of a produced file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDetails {
  pub name: String,
  pub original_path: PathBuf,
  pub size: u64,
  /// Lowercase hex sha256 of the file's bytes.
  pub sha256sum: String,
}

impl FileDetails {
  /// Stat and digest the file at `path`.
  pub fn of(path: &Path) -> Result<Self, BuildError> {
    let meta = fs::metadata(path)?;
    let digest = hash_file(path)?;
    Ok(Self {
      name: path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default(),
      original_path: path.to_path_buf(),
      size: meta.len(),
      sha256sum: digest.0,
    })
  }
}

/// Timing of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultMeta {
  pub start: DateTime<Utc>,
  /// Unset until the run is finalized.
  pub finish: Option<DateTime<Utc>>,
  /// `finish - start`, human readable (e.g. "1s 250ms").
  pub duration: String,
}

/// The outcome of one build run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildResult {
  pub config: Config,
  /// The environment overlay the instructions ran with.
  pub env: Vec<String>,
  pub meta: ResultMeta,
  pub successful: bool,
  pub error_message: Option<String>,
  pub executable: Option<FileDetails>,
  pub zip: Option<FileDetails>,
}

impl BuildResult {
  pub(crate) fn new(config: Config, env: Vec<String>, start: DateTime<Utc>) -> Self {
    Self {
      config,
      env,
      meta: ResultMeta {
        start,
        finish: None,
        duration: String::new(),
      },
      successful: false,
      error_message: None,
      executable: None,
      zip: None,
    }
  }

  /// The first step failure of the run, if any.
  pub fn error(&self) -> Option<&str> {
    self.error_message.as_deref()
  }

  /// Persist this result at its config's build result cache path.
  ///
  /// # Panics
  ///
  /// Panics if the config's product has no source hash.
  pub fn save(&self) -> Result<PathBuf, CacheError> {
    let path = self.config.build_result_cache_path();
    let content = serde_json::to_string_pretty(self).map_err(CacheError::Serialize)?;
    write_atomic(&path, content.as_bytes()).map_err(|source| CacheError::Write {
      path: path.clone(),
      source,
    })?;
    debug!(path = ?path, "build result cached");
    Ok(path)
  }

  /// Read a result written by [`BuildResult::save`].
  pub fn load(path: &Path) -> Result<Self, CacheError> {
    let content = fs::read_to_string(path).map_err(|source| CacheError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    serde_json::from_str(&content).map_err(|source| CacheError::Parse {
      path: path.to_path_buf(),
      source,
    })
  }
}

/// Read a cached result if one exists.
///
/// Returns `Ok(None)` when nothing is cached at `path`; a file that exists
/// but cannot be parsed is an error, never a miss.
pub fn read_cached(path: &Path) -> Result<Option<BuildResult>, CacheError> {
  match fs::metadata(path) {
    Ok(_) => BuildResult::load(path).map(Some),
    Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
    Err(source) => Err(CacheError::Read {
      path: path.to_path_buf(),
      source,
    }),
  }
}

/// Digest comparison of a primary and a verification result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reproducibility {
  pub executable_matches: bool,
  pub zip_matches: bool,
}

impl Reproducibility {
  pub fn is_reproducible(&self) -> bool {
    self.executable_matches && self.zip_matches
  }
}

/// Compare the executable and archive digests of two results.
///
/// Nothing else is compared: timestamps, paths and environments are
/// expected to differ. A side with no recorded file never matches.
pub fn compare(primary: &BuildResult, verification: &BuildResult) -> Reproducibility {
  fn same(a: &Option<FileDetails>, b: &Option<FileDetails>) -> bool {
    match (a, b) {
      (Some(a), Some(b)) => a.sha256sum == b.sha256sum,
      _ => false,
    }
  }

  Reproducibility {
    executable_matches: same(&primary.executable, &verification.executable),
    zip_matches: same(&primary.zip, &verification.zip),
  }
}
