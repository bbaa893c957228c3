//! The primary build.
//!
//! Runs the instructions in the caller's own tree. Its step sequence is also
//! the tail of every verification build.

use std::path::Path;

use tracing::info;

use crate::build::config::Config;
use crate::build::exec::run_instructions;
use crate::build::result::FileDetails;
use crate::build::runner::{Artifact, Step};
use crate::build::settings::{Options, Settings};
use crate::build::tempdirs::BuildKind;
use crate::build::types::{BuildError, SettingsError};
use crate::build::{Build, BuildResult, run};
use crate::consts::{BIN_DIGEST_FILENAME, ZIP_DIGEST_FILENAME};
use crate::util::fs::{file_exists, set_mtimes, write_file};

/// The authoritative build, rooted at the config's work dir.
#[derive(Debug, Clone)]
pub struct PrimaryBuild {
  config: Config,
  settings: Settings,
}

impl PrimaryBuild {
  pub fn new(config: Config, options: Options) -> Result<Self, SettingsError> {
    Self::named(BuildKind::Primary.as_str(), config, options)
  }

  pub(crate) fn named(name: &str, config: Config, options: Options) -> Result<Self, SettingsError> {
    Ok(Self {
      config,
      settings: Settings::new(name, options)?,
    })
  }

  /// Run every step and return the finalized result.
  pub async fn run(&self) -> BuildResult {
    run(self).await
  }

  /// The instruction environment overlay as key/value pairs.
  pub fn env_pairs(&self) -> Vec<(String, String)> {
    env_overlay(&self.config)
  }

  async fn create_directories(&self) -> Result<(), BuildError> {
    let paths = &self.config.paths;
    self.settings.log("Creating output directories.");
    for dir in [&paths.target_dir, &paths.zip_dir(), &paths.meta_dir] {
      tokio::fs::create_dir_all(dir).await?;
    }
    Ok(())
  }

  async fn run_instructions(&self) -> Result<(), BuildError> {
    let instructions = &self.config.parameters.instructions;
    self.settings.log("Writing build instructions to temp file.");
    self.settings.log("Listing build instructions...");
    self.settings.log(instructions);

    let env = self.env_pairs();
    self.settings.log("Running build instructions with environment:");
    for (key, value) in &env {
      self.settings.log(&format!("{}={}", key, value));
    }

    info!(build = %self.settings.name(), work_dir = ?self.config.paths.work_dir, "running build instructions");
    run_instructions(instructions, &self.config.paths.work_dir, &env, &self.settings).await
  }

  fn assert_executable_written(&self) -> Result<(), BuildError> {
    let bin_path = &self.config.paths.bin_path;
    if file_exists(bin_path)? {
      return Ok(());
    }
    Err(BuildError::ExecutableMissing {
      path: bin_path.clone(),
    })
  }

  /// Digest `of`, write the digest to `{meta_dir}/{named}`, and return the
  /// file's details.
  fn write_digest(&self, of: &Path, named: &str) -> Result<FileDetails, BuildError> {
    let details = FileDetails::of(of)?;
    write_file(&self.config.paths.meta_dir.join(named), details.sha256sum.as_bytes())?;
    Ok(details)
  }

  fn set_mtimes(&self) -> Result<(), BuildError> {
    let ts = self.config.product.revision_timestamp()?;
    self.settings.debug(&format!("Setting mtimes under {:?} to {}", self.config.paths.target_dir, ts));
    set_mtimes(&self.config.paths.target_dir, ts)?;
    Ok(())
  }

  fn create_zip(&self) -> Result<(), BuildError> {
    let paths = &self.config.paths;
    let log = self.settings.logger();
    self.settings.archiver.archive(&paths.target_dir, &paths.zip_path, &log)?;
    Ok(())
  }
}

impl Build for PrimaryBuild {
  fn kind(&self) -> BuildKind {
    BuildKind::Primary
  }

  fn config(&self) -> &Config {
    &self.config
  }

  fn settings(&self) -> &Settings {
    &self.settings
  }

  fn env(&self) -> Vec<String> {
    self
      .env_pairs()
      .into_iter()
      .map(|(k, v)| format!("{}={}", k, v))
      .collect()
  }

  fn steps(&self) -> Vec<Step<'_>> {
    let c = &self.config;
    vec![
      Step::blocking("validating inputs", move || {
        c.product.revision_timestamp()?;
        c.product.semver()?;
        c.parameters.validate_zip_name()?;
        Ok(())
      }),
      Step::new("creating output directories", move || self.create_directories()),
      Step::new("running build instructions", move || self.run_instructions()),
      Step::blocking("asserting executable written", move || self.assert_executable_written()),
      Step::recording("writing executable digest", move || {
        self
          .write_digest(&c.paths.bin_path, BIN_DIGEST_FILENAME)
          .map(Artifact::Executable)
      }),
      Step::blocking("setting mtimes", move || self.set_mtimes()),
      Step::blocking("creating zip file", move || self.create_zip()),
      Step::recording("writing zip digest", move || {
        self
          .write_digest(&c.paths.zip_path, ZIP_DIGEST_FILENAME)
          .map(Artifact::Zip)
      }),
    ]
  }
}

/// Build facts exposed to the instructions as environment variables.
pub fn env_overlay(config: &Config) -> Vec<(String, String)> {
  let product = &config.product;
  let params = &config.parameters;
  let paths = &config.paths;
  let path = |p: &Path| p.to_string_lossy().to_string();

  let mut env = vec![
    ("PRODUCT_REPOSITORY", product.repository.clone()),
    ("PRODUCT_NAME", product.name.clone()),
    ("PRODUCT_VERSION", product.version.clone()),
    ("PRODUCT_REVISION", product.revision.clone()),
    ("PRODUCT_REVISION_TIME", product.revision_time.clone()),
    ("OS", params.os.clone()),
    ("ARCH", params.arch.clone()),
    ("GOOS", params.os.clone()),
    ("GOARCH", params.arch.clone()),
    ("WORKDIR", path(&paths.work_dir)),
    ("TARGET_DIR", path(&paths.target_dir)),
    ("BIN_PATH", path(&paths.bin_path)),
    ("ZIP_NAME", params.zip_name_for(product)),
    ("ZIP_PATH", path(&paths.zip_path)),
    ("META_DIR", path(&paths.meta_dir)),
  ];
  if let Ok(ts) = product.revision_timestamp() {
    env.push(("SOURCE_DATE_EPOCH", ts.timestamp().to_string()));
  }

  env.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}
