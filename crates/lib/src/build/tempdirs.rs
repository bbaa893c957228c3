//! Content-addressed temp and cache directories.
//!
//! Every location is namespaced by the tool identity, the build kind and a
//! compound ID of (product, parameters, tool):
//!
//! ```text
//! {temp_root}/{tool}/{tool_version}/{tool_revision}/{kind}/{compound_id}/
//! └── cache/{category}/{repository}/{product}/{source_hash}/...
//! ```
//!
//! The kind segment keeps primary and verification runs of the same build
//! from ever sharing a directory, so they can run concurrently without
//! locking.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::build::config::{Config, Parameters, Product, Tool};
use crate::util::hash::compound_id;

/// Which side of the reproducibility check a build is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildKind {
  Primary,
  Verification,
}

impl BuildKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      BuildKind::Primary => "primary",
      BuildKind::Verification => "verification",
    }
  }
}

impl std::fmt::Display for BuildKind {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

/// The path-independent identity of a build.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct CacheKey {
  pub product: Product,
  pub parameters: Parameters,
  pub tool: Tool,
}

impl CacheKey {
  pub fn new(product: Product, parameters: Parameters, tool: Tool) -> Self {
    Self {
      product,
      parameters,
      tool,
    }
  }

  /// The default compound ID: a truncated sha256 of the key's JSON form.
  pub fn compound_id(&self) -> String {
    compound_id(&(&self.product, &self.parameters, &self.tool))
  }
}

/// Where the temp root comes from and how keys become path segments.
///
/// Defaults to the system temp dir and [`CacheKey::compound_id`]; tests
/// swap in fixed functions to get platform-independent paths.
#[derive(Debug, Clone, Copy)]
pub struct DirStrategy {
  pub temp_root: fn() -> PathBuf,
  pub compound_id: fn(&CacheKey) -> String,
}

impl Default for DirStrategy {
  fn default() -> Self {
    Self {
      temp_root: std::env::temp_dir,
      compound_id: CacheKey::compound_id,
    }
  }
}

/// Resolved temp and cache locations for one (build, kind) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TempDirs {
  kind: BuildKind,
  key: CacheKey,
  /// `{temp_root}/{tool}/{tool_version}/{tool_revision}/{kind}/{compound_id}`
  base: PathBuf,
}

impl TempDirs {
  /// # Panics
  ///
  /// Panics if `product` has no source hash.
  pub fn new(kind: BuildKind, product: Product, parameters: Parameters, tool: Tool) -> Self {
    Self::with_strategy(kind, product, parameters, tool, DirStrategy::default())
  }

  /// # Panics
  ///
  /// Panics if `product` has no source hash.
  pub fn with_strategy(
    kind: BuildKind,
    product: Product,
    parameters: Parameters,
    tool: Tool,
    strategy: DirStrategy,
  ) -> Self {
    assert_source_hash(&product);
    let key = CacheKey::new(product, parameters, tool);
    let base = (strategy.temp_root)()
      .join(&key.tool.name)
      .join(&key.tool.version)
      .join(&key.tool.revision)
      .join(kind.as_str())
      .join((strategy.compound_id)(&key));
    Self { kind, key, base }
  }

  pub fn primary(product: Product, parameters: Parameters, tool: Tool) -> Self {
    Self::new(BuildKind::Primary, product, parameters, tool)
  }

  pub fn verification(product: Product, parameters: Parameters, tool: Tool) -> Self {
    Self::new(BuildKind::Verification, product, parameters, tool)
  }

  pub fn from_config(config: &Config, kind: BuildKind) -> Self {
    Self::new(
      kind,
      config.product.clone(),
      config.parameters.clone(),
      config.tool.clone(),
    )
  }

  pub fn kind(&self) -> BuildKind {
    self.kind
  }

  pub fn key(&self) -> &CacheKey {
    &self.key
  }

  /// Staging root for a build run away from the caller's checkout.
  pub fn remote_build_root(&self, extension: &[&str]) -> PathBuf {
    self.cache_dir("source", extension)
  }

  /// Where source archives are downloaded before unpacking.
  pub fn source_download_dir(&self) -> PathBuf {
    self.cache_dir("sourcearchive", &[])
  }

  pub fn build_result_cache_dir(&self, extension: &[&str]) -> PathBuf {
    self.cache_dir("buildresult", extension)
  }

  pub fn verification_result_cache_path(&self, config_id: &str, zip_name: &str) -> PathBuf {
    let file_name = format!("{}.json", zip_name);
    self.cache_dir("verificationresult", &[config_id, &file_name])
  }

  fn cache_dir(&self, category: &str, extension: &[&str]) -> PathBuf {
    let product = &self.key.product;
    let mut path = self
      .base
      .join("cache")
      .join(category)
      .join(&product.repository)
      .join(&product.name)
      .join(&product.source_hash);
    for segment in extension {
      path.push(segment);
    }
    path
  }
}

fn assert_source_hash(product: &Product) {
  if !product.source_hash.is_empty() {
    return;
  }
  if product.is_empty() {
    panic!("SourceHash is empty; Product is empty.");
  }
  panic!("SourceHash is empty; Product is nonempty: {:#?}", product);
}
