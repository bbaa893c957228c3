//! Build configuration.
//!
//! A [`Config`] is everything needed to run one build on one machine:
//! - [`Product`]: what is being built
//! - [`Parameters`]: the invariant instructions that must reproduce it
//! - [`Paths`]: where this particular run reads and writes
//! - [`Tool`]: who is building it
//!
//! Only the first three plus the tool identity form the cache key; paths are
//! local to a run and never influence where cached results live in the
//! shared temp directory.

use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::build::tempdirs::CacheKey;
use crate::build::types::BuildError;
use crate::platform::{host_arch, host_os};

/// The logical product being built.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Product {
  pub repository: String,
  pub name: String,
  pub version: String,
  pub revision: String,
  /// Commit time of `revision`, RFC3339.
  pub revision_time: String,
  /// Content hash of the source tree at `revision`.
  pub source_hash: String,
}

impl Product {
  /// Returns true if no field has been set.
  pub fn is_empty(&self) -> bool {
    *self == Product::default()
  }

  /// Parse the revision time.
  pub fn revision_timestamp(&self) -> Result<DateTime<Utc>, BuildError> {
    DateTime::parse_from_rfc3339(&self.revision_time)
      .map(|ts| ts.with_timezone(&Utc))
      .map_err(|e| BuildError::InvalidRevisionTime {
        value: self.revision_time.clone(),
        message: e.to_string(),
      })
  }

  /// Parse the version as a semantic version.
  pub fn semver(&self) -> Result<semver::Version, BuildError> {
    semver::Version::parse(&self.version).map_err(|e| BuildError::InvalidVersion {
      value: self.version.clone(),
      message: e.to_string(),
    })
  }
}

/// Identity of the tool performing the build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tool {
  pub name: String,
  pub version: String,
  pub revision: String,
}

/// The invariant inputs needed to reproduce a build.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Parameters {
  /// Shell script that must write the executable to `$BIN_PATH`.
  pub instructions: String,
  pub os: String,
  pub arch: String,
  /// Overrides the default archive name when set.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub zip_name: Option<String>,
}

impl Parameters {
  /// Parameters targeting the host platform.
  pub fn new(instructions: &str) -> Self {
    Self {
      instructions: instructions.to_string(),
      os: host_os(),
      arch: host_arch(),
      zip_name: None,
    }
  }

  pub fn with_target(mut self, os: &str, arch: &str) -> Self {
    self.os = os.to_string();
    self.arch = arch.to_string();
    self
  }

  pub fn with_zip_name(mut self, zip_name: &str) -> Self {
    self.zip_name = Some(zip_name.to_string());
    self
  }

  /// Check that the zip name override, if any, is a single file name, so
  /// the archive stays inside the zip dir.
  pub fn validate_zip_name(&self) -> Result<(), BuildError> {
    let Some(name) = self.zip_name.as_deref().filter(|n| !n.is_empty()) else {
      return Ok(());
    };
    let mut components = Path::new(name).components();
    let single = matches!(
      (components.next(), components.next()),
      (Some(Component::Normal(_)), None)
    );
    if single && !name.contains(['/', '\\']) {
      return Ok(());
    }
    Err(BuildError::InvalidZipName {
      value: name.to_string(),
    })
  }

  /// The archive file name for `product`: the override if set, otherwise
  /// `{name}_{version}_{os}_{arch}.zip`.
  pub fn zip_name_for(&self, product: &Product) -> String {
    match &self.zip_name {
      Some(name) if !name.is_empty() => name.clone(),
      _ => format!("{}_{}_{}_{}.zip", product.name, product.version, self.os, self.arch),
    }
  }
}

/// Filesystem locations for one build run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Paths {
  pub work_dir: PathBuf,
  pub target_dir: PathBuf,
  pub bin_path: PathBuf,
  pub zip_path: PathBuf,
  pub meta_dir: PathBuf,
}

impl Paths {
  /// Derive every path from `root`. Pure: nothing is created on disk.
  pub fn for_root(root: &Path, product: &Product, parameters: &Parameters) -> Self {
    let target_dir = root.join("dist");
    let zip_dir = root.join("out");
    Self {
      work_dir: root.to_path_buf(),
      bin_path: target_dir.join(&product.name),
      target_dir,
      zip_path: zip_dir.join(parameters.zip_name_for(product)),
      meta_dir: root.join("meta"),
    }
  }

  /// The directory the archive is written to.
  pub fn zip_dir(&self) -> PathBuf {
    self
      .zip_path
      .parent()
      .map(Path::to_path_buf)
      .unwrap_or_else(|| self.work_dir.clone())
  }

  /// Output directories relative to the work dir, for those that live
  /// inside it.
  pub fn relative_outputs(&self) -> Vec<PathBuf> {
    [self.target_dir.clone(), self.zip_dir(), self.meta_dir.clone()]
      .iter()
      .filter_map(|p| p.strip_prefix(&self.work_dir).ok())
      .filter(|p| !p.as_os_str().is_empty())
      .map(Path::to_path_buf)
      .collect()
  }
}

/// The complete configuration to build a single binary on a specific host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
  pub product: Product,
  pub parameters: Parameters,
  pub paths: Paths,
  pub tool: Tool,
}

impl Config {
  /// Assemble a config from fully initialized parts.
  pub fn new(product: Product, parameters: Parameters, paths: Paths, tool: Tool) -> Self {
    Self {
      product,
      parameters,
      paths,
      tool,
    }
  }

  /// Assemble a config whose paths are all derived from `root`.
  pub fn rooted_at(root: &Path, product: Product, parameters: Parameters, tool: Tool) -> Self {
    let paths = Paths::for_root(root, &product, &parameters);
    Self::new(product, parameters, paths, tool)
  }

  /// The same build, re-rooted at another directory.
  pub fn with_root(&self, root: &Path) -> Self {
    Self::rooted_at(root, self.product.clone(), self.parameters.clone(), self.tool.clone())
  }

  /// The path-independent identity of this build.
  pub fn cache_key(&self) -> CacheKey {
    CacheKey::new(self.product.clone(), self.parameters.clone(), self.tool.clone())
  }

  /// Where this build's result is cached: `{meta_dir}/buildresult-{source_hash}.json`.
  ///
  /// # Panics
  ///
  /// Panics if the product has no source hash. Writing a result without
  /// one would land it under a name no later lookup can find.
  pub fn build_result_cache_path(&self) -> PathBuf {
    if self.product.source_hash.is_empty() {
      panic!("SourceHash is empty; Config looks like this: {:#?}", self);
    }
    self
      .paths
      .meta_dir
      .join(format!("buildresult-{}.json", self.product.source_hash))
  }
}
