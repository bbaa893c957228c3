//! The local verification build.
//!
//! Runs in a fresh copy of the primary build's root directory, after a
//! caller-chosen instant. Starting later than the primary forces
//! time-dependent output (embedded build timestamps and the like) to show up
//! as a digest mismatch instead of hiding behind near-simultaneous runs.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::build::config::Config;
use crate::build::primary::PrimaryBuild;
use crate::build::runner::Step;
use crate::build::settings::{Options, Settings};
use crate::build::tempdirs::BuildKind;
use crate::build::types::{BuildError, SettingsError};
use crate::build::{Build, BuildResult, run};
use crate::util::fs::copy_tree;

/// A verification build in a temporary copy of the primary root.
#[derive(Debug, Clone)]
pub struct LocalVerification {
  primary_root: PathBuf,
  start_after: DateTime<Utc>,
  inner: PrimaryBuild,
}

impl LocalVerification {
  /// `config` must be rooted at the verification directory, not at
  /// `primary_root`.
  pub fn new(
    primary_root: &Path,
    start_after: DateTime<Utc>,
    config: Config,
    options: Options,
  ) -> Result<Self, SettingsError> {
    Ok(Self {
      primary_root: primary_root.to_path_buf(),
      start_after,
      inner: PrimaryBuild::named(BuildKind::Verification.as_str(), config, options)?,
    })
  }

  pub fn primary_root(&self) -> &Path {
    &self.primary_root
  }

  pub fn start_after(&self) -> DateTime<Utc> {
    self.start_after
  }

  /// Run every step and return the finalized result.
  pub async fn run(&self) -> BuildResult {
    run(self).await
  }

  /// Copy the primary tree, leaving out this build's own output directories
  /// so nothing the primary produced can satisfy the verification.
  fn copy_primary_root(&self) -> Result<(), BuildError> {
    let work_dir = &self.config().paths.work_dir;
    self.settings().log(&format!(
      "Copying {:?} to {:?}",
      self.primary_root, work_dir
    ));
    copy_tree(&self.primary_root, work_dir, &self.config().paths.relative_outputs())?;
    Ok(())
  }

  async fn wait_for_stagger(&self) -> Result<(), BuildError> {
    let wait = (self.start_after - Utc::now()).to_std().unwrap_or_default();
    if !wait.is_zero() {
      self.settings().log(&format!(
        "Waiting {} until {}",
        humantime::format_duration(wait),
        self.start_after
      ));
    }
    tokio::time::sleep(wait).await;
    Ok(())
  }
}

impl Build for LocalVerification {
  fn kind(&self) -> BuildKind {
    BuildKind::Verification
  }

  fn config(&self) -> &Config {
    self.inner.config()
  }

  fn settings(&self) -> &Settings {
    self.inner.settings()
  }

  fn env(&self) -> Vec<String> {
    self.inner.env()
  }

  fn steps(&self) -> Vec<Step<'_>> {
    let mut steps = vec![
      Step::blocking("copying primary build root dir to temp dir", move || {
        self.copy_primary_root()
      }),
      Step::new("waiting until the stagger time has elapsed", move || {
        self.wait_for_stagger()
      }),
    ];
    steps.extend(self.inner.steps());
    steps
  }
}
