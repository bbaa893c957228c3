//! Shared helpers for reproducibility integration tests.

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use twinbuild_lib::build::{Config, Options, Parameters, Product, Sink, Tool};

pub const REVISION_TIME: &str = "2022-07-04T11:33:33Z";

pub fn product() -> Product {
  Product {
    repository: "dadgarcorp/lockbox".to_string(),
    name: "lockbox".to_string(),
    version: "1.2.3".to_string(),
    revision: "cabba9e".to_string(),
    revision_time: REVISION_TIME.to_string(),
    source_hash: "0123456789abcdef".to_string(),
  }
}

pub fn tool() -> Tool {
  Tool {
    name: "twinbuild".to_string(),
    version: "0.1.0".to_string(),
    revision: "deadbeef".to_string(),
  }
}

pub fn config(root: &Path, instructions: &str) -> Config {
  Config::rooted_at(
    root,
    product(),
    Parameters::new(instructions).with_target("linux", "amd64"),
    tool(),
  )
}

pub fn options() -> Options {
  Options::default()
    .with_shell("sh")
    .with_stdout(Sink::Null)
    .with_stderr(Sink::Null)
}

/// A source tree and an empty directory for its verification build.
pub struct TestEnv {
  pub primary: TempDir,
  pub verification: TempDir,
}

impl TestEnv {
  pub fn new() -> Self {
    Self {
      primary: TempDir::new().unwrap(),
      verification: TempDir::new().unwrap(),
    }
  }

  pub fn primary_root(&self) -> &Path {
    self.primary.path()
  }

  /// Where verification builds root themselves; not created up front.
  pub fn verification_root(&self) -> PathBuf {
    self.verification.path().join("root")
  }

  /// Write a source file relative to the primary root.
  pub fn write_source(&self, relative_path: &str, content: &str) {
    let path = self.primary.path().join(relative_path);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
  }
}
