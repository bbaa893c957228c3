//! Sequential step execution.
//!
//! The [`Runner`] executes a build's steps strictly in order against a
//! single [`BuildResult`]. The first failing step ends the run: its error is
//! wrapped with the step description and recorded, and no later step is
//! attempted. Steps that digest the executable or archive hand the details
//! back as an [`Artifact`], so a later failure keeps what was captured. When
//! every step succeeds the runner records both details again from disk,
//! under the same short-circuit rule.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::build::Build;
use crate::build::result::{BuildResult, FileDetails};
use crate::build::settings::LogFn;
use crate::build::types::{BuildError, StepError};

/// The future a step's action returns.
pub type StepFuture<'a> = Pin<Box<dyn Future<Output = Result<Option<Artifact>, BuildError>> + Send + 'a>>;

/// File details a step captured for the result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Artifact {
  Executable(FileDetails),
  Zip(FileDetails),
}

/// Source of the current time. Overridable in tests.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// A named, fallible unit of work.
pub struct Step<'a> {
  desc: String,
  action: Box<dyn FnOnce() -> StepFuture<'a> + Send + 'a>,
}

impl<'a> Step<'a> {
  /// A step whose action is async.
  pub fn new<F, Fut>(desc: impl Into<String>, action: F) -> Self
  where
    F: FnOnce() -> Fut + Send + 'a,
    Fut: Future<Output = Result<(), BuildError>> + Send + 'a,
  {
    Self {
      desc: desc.into(),
      action: Box::new(move || Box::pin(async move { action().await.map(|()| None) })),
    }
  }

  /// A synchronous step that captures an executable or archive.
  pub fn recording<F>(desc: impl Into<String>, action: F) -> Self
  where
    F: FnOnce() -> Result<Artifact, BuildError> + Send + 'a,
  {
    Self {
      desc: desc.into(),
      action: Box::new(move || Box::pin(async move { action().map(Some) })),
    }
  }

  /// A step whose action is plain synchronous code.
  pub fn blocking<F>(desc: impl Into<String>, action: F) -> Self
  where
    F: FnOnce() -> Result<(), BuildError> + Send + 'a,
  {
    Self::new(desc, move || async move { action() })
  }

  pub fn desc(&self) -> &str {
    &self.desc
  }
}

impl std::fmt::Debug for Step<'_> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Step").field("desc", &self.desc).finish_non_exhaustive()
  }
}

/// Executes and logs build steps and constructs the build result.
pub struct Runner<'a> {
  build: &'a dyn Build,
  result: BuildResult,
  error: Option<StepError>,
  log: LogFn,
  now: Clock,
}

impl<'a> Runner<'a> {
  pub fn new(build: &'a dyn Build, log: LogFn) -> Self {
    Self::with_clock(build, log, Arc::new(Utc::now))
  }

  pub fn with_clock(build: &'a dyn Build, log: LogFn, now: Clock) -> Self {
    let result = BuildResult::new(build.config().clone(), build.env(), now());
    Self {
      build,
      result,
      error: None,
      log,
      now,
    }
  }

  /// Run every step, then finalize and return the result.
  pub async fn run(mut self) -> BuildResult {
    (self.log)(&format!(
      "Beginning build, rooted at {:?}",
      self.result.config.paths.work_dir
    ));
    self.start();

    for step in self.build.steps() {
      let Step { desc, action } = step;
      let outcome = action().await.map(|artifact| {
        if let Some(artifact) = artifact {
          self.capture(artifact);
        }
      });
      self.record(&desc, outcome);
      if self.failed() {
        break;
      }
    }

    if !self.failed() {
      let outcome = FileDetails::of(&self.result.config.paths.bin_path).map(|f| {
        self.result.executable = Some(f);
      });
      self.record("recording executable file details", outcome);
    }

    if !self.failed() {
      let outcome = FileDetails::of(&self.result.config.paths.zip_path).map(|f| {
        self.result.zip = Some(f);
      });
      self.record("recording zip file details", outcome);
    }

    self.into_result()
  }

  pub fn failed(&self) -> bool {
    self.error.is_some()
  }

  /// The first step failure, if any.
  pub fn error(&self) -> Option<&StepError> {
    self.error.as_ref()
  }

  fn capture(&mut self, artifact: Artifact) {
    match artifact {
      Artifact::Executable(details) => self.result.executable = Some(details),
      Artifact::Zip(details) => self.result.zip = Some(details),
    }
  }

  fn start(&mut self) {
    self.result.meta.start = (self.now)();
  }

  fn is_finished(&self) -> bool {
    self.result.meta.finish.is_some()
  }

  /// Fix the finish time, duration and success flag. Only the first call
  /// has any effect.
  fn finish(&mut self) {
    if self.is_finished() {
      return;
    }
    let finish = (self.now)();
    let elapsed = (finish - self.result.meta.start).to_std().unwrap_or_default();
    self.result.meta.finish = Some(finish);
    self.result.meta.duration = humantime::format_duration(elapsed).to_string();
    self.result.successful = self.error.is_none();
  }

  fn into_result(mut self) -> BuildResult {
    self.finish();
    self.result
  }

  fn record(&mut self, desc: &str, outcome: Result<(), BuildError>) {
    match outcome {
      Ok(()) => (self.log)(&format!("SUCCESS: {}", desc)),
      Err(e) => {
        let err = StepError::new(desc, e);
        (self.log)(&format!("ERROR: {}", err));
        if self.error.is_none() {
          self.result.error_message = Some(err.to_string());
          self.error = Some(err);
        }
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::build::config::Config;
  use crate::build::settings::{Options, Settings};
  use crate::build::tempdirs::BuildKind;
  use crate::util::testutil::{quiet_options, standard_config};
  use std::path::{Path, PathBuf};
  use std::sync::Mutex;
  use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
  use tempfile::TempDir;

  /// A build whose steps are supplied by the test.
  struct ScriptedBuild {
    config: Config,
    settings: Settings,
    fail_at: Option<usize>,
    /// Step that captures the executable's details instead of doing nothing.
    capture_at: Option<usize>,
    step_count: usize,
    executed: Arc<AtomicUsize>,
  }

  impl ScriptedBuild {
    fn new(root: &Path, step_count: usize, fail_at: Option<usize>) -> Self {
      Self {
        config: standard_config(root, "true"),
        settings: Settings::new("scripted", quiet_options()).unwrap(),
        fail_at,
        capture_at: None,
        step_count,
        executed: Arc::new(AtomicUsize::new(0)),
      }
    }
  }

  impl Build for ScriptedBuild {
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
      vec!["PRODUCT_NAME=lockbox".to_string()]
    }

    fn steps(&self) -> Vec<Step<'_>> {
      (0..self.step_count)
        .map(|i| {
          let executed = Arc::clone(&self.executed);
          let fail = self.fail_at == Some(i);
          if self.capture_at == Some(i) {
            let bin_path = self.config.paths.bin_path.clone();
            return Step::recording(format!("step {}", i), move || {
              executed.fetch_add(1, Ordering::SeqCst);
              Ok(Artifact::Executable(FileDetails::of(&bin_path)?))
            });
          }
          Step::blocking(format!("step {}", i), move || {
            executed.fetch_add(1, Ordering::SeqCst);
            if fail {
              return Err(BuildError::CmdFailed { code: Some(2) });
            }
            Ok(())
          })
        })
        .collect()
    }
  }

  fn collecting_log() -> (LogFn, Arc<Mutex<Vec<String>>>) {
    let lines = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&lines);
    let log: LogFn = Arc::new(move |m: &str| sink.lock().unwrap().push(m.to_string()));
    (log, lines)
  }

  fn write_outputs(config: &Config) {
    std::fs::create_dir_all(&config.paths.target_dir).unwrap();
    std::fs::create_dir_all(config.paths.zip_dir()).unwrap();
    std::fs::write(&config.paths.bin_path, "binary").unwrap();
    std::fs::write(&config.paths.zip_path, "archive").unwrap();
  }

  #[tokio::test]
  async fn stops_at_first_failure() {
    let temp = TempDir::new().unwrap();
    let build = ScriptedBuild::new(temp.path(), 5, Some(2));
    let (log, lines) = collecting_log();

    let result = Runner::new(&build, log).run().await;

    assert_eq!(build.executed.load(Ordering::SeqCst), 3);
    assert!(!result.successful);
    let message = result.error().unwrap();
    assert!(message.contains("step 2"), "{}", message);
    assert!(message.contains("exit code 2"), "{}", message);
    assert!(result.executable.is_none());
    assert!(result.zip.is_none());

    let lines = lines.lock().unwrap();
    assert_eq!(lines.iter().filter(|l| l.starts_with("SUCCESS")).count(), 2);
    assert_eq!(lines.iter().filter(|l| l.starts_with("ERROR")).count(), 1);
    assert!(!lines.iter().any(|l| l.contains("step 3")));
  }

  #[tokio::test]
  async fn all_steps_succeeding_records_file_details() {
    let temp = TempDir::new().unwrap();
    let build = ScriptedBuild::new(temp.path(), 3, None);
    write_outputs(&build.config);
    let (log, _) = collecting_log();

    let result = Runner::new(&build, log).run().await;

    assert_eq!(build.executed.load(Ordering::SeqCst), 3);
    assert!(result.successful, "{:?}", result.error());
    assert!(result.error().is_none());
    assert_eq!(result.executable.as_ref().unwrap().size, 6);
    assert_eq!(result.zip.as_ref().unwrap().name, build.config.paths.zip_path.file_name().unwrap().to_string_lossy());
    assert_eq!(result.env, vec!["PRODUCT_NAME=lockbox"]);

    let finish = result.meta.finish.unwrap();
    let elapsed = (finish - result.meta.start).to_std().unwrap();
    assert_eq!(result.meta.duration, humantime::format_duration(elapsed).to_string());
  }

  #[tokio::test]
  async fn details_captured_before_a_failure_are_kept() {
    let temp = TempDir::new().unwrap();
    let mut build = ScriptedBuild::new(temp.path(), 4, Some(2));
    build.capture_at = Some(1);
    write_outputs(&build.config);
    let (log, _) = collecting_log();

    let result = Runner::new(&build, log).run().await;

    assert!(!result.successful);
    assert!(result.error().unwrap().starts_with("step 2 failed"));
    assert_eq!(result.executable.as_ref().unwrap().size, 6);
    assert!(result.zip.is_none());
  }

  #[tokio::test]
  async fn missing_executable_after_steps_is_recorded() {
    let temp = TempDir::new().unwrap();
    let build = ScriptedBuild::new(temp.path(), 1, None);
    let (log, _) = collecting_log();

    let result = Runner::new(&build, log).run().await;

    assert!(!result.successful);
    assert!(
      result
        .error()
        .unwrap()
        .starts_with("recording executable file details failed:")
    );
    assert!(result.zip.is_none());
  }

  #[tokio::test]
  async fn finish_is_idempotent() {
    let temp = TempDir::new().unwrap();
    let build = ScriptedBuild::new(temp.path(), 0, None);
    let (log, _) = collecting_log();

    let ticks = Arc::new(AtomicI64::new(1_656_934_413));
    let clock_ticks = Arc::clone(&ticks);
    let clock: Clock = Arc::new(move || {
      let secs = clock_ticks.fetch_add(10, Ordering::SeqCst);
      DateTime::from_timestamp(secs, 0).unwrap()
    });

    let mut runner = Runner::with_clock(&build, log, clock);
    runner.start();
    runner.finish();
    let first = runner.result.meta.clone();
    runner.finish();

    assert_eq!(runner.result.meta, first);
    assert_eq!(first.duration, "10s");
  }

  #[tokio::test]
  async fn async_steps_run_in_order() {
    let order = Arc::new(Mutex::new(Vec::new()));
    let steps: Vec<Step<'_>> = (0..3)
      .map(|i| {
        let order = Arc::clone(&order);
        Step::new(format!("async {}", i), move || async move {
          tokio::task::yield_now().await;
          order.lock().unwrap().push(i);
          Ok(())
        })
      })
      .collect();

    for step in steps {
      let Step { action, .. } = step;
      action().await.unwrap();
    }

    assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
  }

  #[test]
  fn step_debug_shows_description() {
    let step = Step::blocking("creating output directories", || Ok(()));
    assert_eq!(step.desc(), "creating output directories");
    assert!(format!("{:?}", step).contains("creating output directories"));
  }

  #[test]
  fn runner_starts_with_build_identity() {
    let build = ScriptedBuild::new(&PathBuf::from("/nowhere"), 0, None);
    let runner = Runner::new(&build, Arc::new(|_: &str| {}));

    assert!(!runner.failed());
    assert_eq!(runner.result.config, build.config);
    assert!(runner.result.meta.finish.is_none());
  }

  #[test]
  fn options_are_reusable_for_multiple_builds() {
    let options = Options::default().with_shell("sh");
    assert!(Settings::new("a", options.clone()).is_ok());
    assert!(Settings::new("b", options).is_ok());
  }
}
