//! Build definition and execution.
//!
//! A build runs untrusted shell instructions that must write a single
//! executable, then packages the target directory into an archive and
//! records digests of both. Running the same build twice, once as the
//! [`PrimaryBuild`] and once as a [`LocalVerification`] in an isolated copy
//! of the tree, and comparing the digests tells whether it is reproducible.
//!
//! # Submodules
//!
//! - [`config`] - what to build, with what, and where
//! - [`tempdirs`] - content-addressed cache and staging locations
//! - [`settings`] - run-specific shell, sinks, logging and cancellation
//! - [`runner`] - sequential step execution
//! - [`result`] - the persisted outcome of a run

pub mod config;
pub mod exec;
pub mod primary;
pub mod result;
pub mod runner;
pub mod settings;
pub mod tempdirs;
mod types;
pub mod verification;

pub use config::{Config, Parameters, Paths, Product, Tool};
pub use primary::PrimaryBuild;
pub use result::{BuildResult, FileDetails, Reproducibility, ResultMeta, compare, read_cached};
pub use runner::{Artifact, Runner, Step, StepFuture};
pub use settings::{Canceller, Cancellation, LogFn, Options, Settings, Sink, cancellation};
pub use tempdirs::{BuildKind, CacheKey, DirStrategy, TempDirs};
pub use types::*;
pub use verification::LocalVerification;

/// A single build of a single binary.
///
/// Implemented by both the primary and the verification build; the runner
/// does not need to know which one it is driving.
pub trait Build: Send + Sync {
  fn kind(&self) -> BuildKind;

  fn config(&self) -> &Config;

  fn settings(&self) -> &Settings;

  /// The environment overlay, as `KEY=VALUE` strings, that the instructions
  /// run with on top of the host environment.
  fn env(&self) -> Vec<String>;

  /// The ordered steps of this build.
  fn steps(&self) -> Vec<Step<'_>>;

  /// The result cached by an earlier run of this build, if any.
  ///
  /// A missing cache entry is `Ok(None)`; an unreadable one is an error.
  ///
  /// # Panics
  ///
  /// Panics if the config's product has no source hash.
  fn cached_result(&self) -> Result<Option<BuildResult>, CacheError> {
    read_cached(&self.config().build_result_cache_path())
  }
}

/// Run `build` to completion and return its finalized result.
///
/// Step failures never escape as errors; they are recorded on the result.
pub async fn run(build: &dyn Build) -> BuildResult {
  let log = build.settings().logger();
  Runner::new(build, log).run().await
}
