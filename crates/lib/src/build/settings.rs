//! Run-specific build settings.
//!
//! These are not part of a build's definition: two runs of the same
//! [`Config`](crate::build::Config) may use different shells, sinks, or log
//! functions and must still produce identical output. Construct them with
//! [`Options`] and let the build call [`Settings::new`].

use std::fs::OpenOptions;
use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info};

use crate::archive::{Archiver, ZipArchiver};
use crate::build::exec::resolve_shell;
use crate::build::types::SettingsError;

/// A log function. Receives fully formatted lines.
pub type LogFn = Arc<dyn Fn(&str) + Send + Sync>;

/// Where the instruction script's stdout or stderr goes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Sink {
  #[default]
  Inherit,
  Null,
  /// Appended to the file, which is created if missing.
  File(PathBuf),
}

impl Sink {
  pub(crate) fn stdio(&self) -> io::Result<Stdio> {
    match self {
      Sink::Inherit => Ok(Stdio::inherit()),
      Sink::Null => Ok(Stdio::null()),
      Sink::File(path) => {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Stdio::from(file))
      }
    }
  }
}

/// Sending half of a cancellation pair.
#[derive(Debug)]
pub struct Canceller(watch::Sender<bool>);

impl Canceller {
  /// Cancel every build holding the paired [`Cancellation`].
  pub fn cancel(&self) {
    self.0.send_replace(true);
  }
}

/// Receiving half of a cancellation pair, handed to builds via
/// [`Options::with_cancellation`].
#[derive(Debug, Clone)]
pub struct Cancellation(watch::Receiver<bool>);

impl Cancellation {
  pub fn is_cancelled(&self) -> bool {
    *self.0.borrow()
  }

  /// Resolves once cancelled. Never resolves if the canceller is dropped
  /// without cancelling.
  pub async fn cancelled(&mut self) {
    loop {
      if *self.0.borrow_and_update() {
        return;
      }
      if self.0.changed().await.is_err() {
        std::future::pending::<()>().await;
      }
    }
  }
}

/// Create a linked canceller/cancellation pair.
pub fn cancellation() -> (Canceller, Cancellation) {
  let (tx, rx) = watch::channel(false);
  (Canceller(tx), Cancellation(rx))
}

/// Caller-supplied overrides for [`Settings`].
#[derive(Default, Clone)]
pub struct Options {
  shell: Option<String>,
  cancellation: Option<Cancellation>,
  timeout: Option<Duration>,
  log: Option<LogFn>,
  debug: Option<LogFn>,
  stdout: Option<Sink>,
  stderr: Option<Sink>,
  archiver: Option<Arc<dyn Archiver>>,
}

impl Options {
  /// Shell used to run instructions: a bare name searched on `PATH`, or a
  /// path. Defaults to `bash`.
  pub fn with_shell(mut self, shell: &str) -> Self {
    self.shell = Some(shell.to_string());
    self
  }

  pub fn with_cancellation(mut self, cancellation: Cancellation) -> Self {
    self.cancellation = Some(cancellation);
    self
  }

  pub fn with_timeout(mut self, timeout: Duration) -> Self {
    self.timeout = Some(timeout);
    self
  }

  pub fn with_log(mut self, log: LogFn) -> Self {
    self.log = Some(log);
    self
  }

  pub fn with_debug(mut self, debug: LogFn) -> Self {
    self.debug = Some(debug);
    self
  }

  pub fn with_stdout(mut self, sink: Sink) -> Self {
    self.stdout = Some(sink);
    self
  }

  pub fn with_stderr(mut self, sink: Sink) -> Self {
    self.stderr = Some(sink);
    self
  }

  pub fn with_archiver(mut self, archiver: Arc<dyn Archiver>) -> Self {
    self.archiver = Some(archiver);
    self
  }
}

/// Resolved settings for one build run.
#[derive(Clone)]
pub struct Settings {
  name: String,
  pub(crate) shell: PathBuf,
  pub(crate) cancellation: Option<Cancellation>,
  pub(crate) timeout: Option<Duration>,
  log: LogFn,
  debug: LogFn,
  pub(crate) stdout: Sink,
  pub(crate) stderr: Sink,
  pub(crate) archiver: Arc<dyn Archiver>,
}

impl Settings {
  /// Resolve `options` for a build called `name`, filling in defaults.
  pub fn new(name: &str, options: Options) -> Result<Self, SettingsError> {
    let shell = resolve_shell(options.shell.as_deref())?;
    Ok(Self {
      name: name.to_string(),
      shell,
      cancellation: options.cancellation,
      timeout: options.timeout,
      log: options.log.unwrap_or_else(default_log),
      debug: options.debug.unwrap_or_else(default_debug),
      stdout: options.stdout.unwrap_or_default(),
      stderr: options.stderr.unwrap_or_default(),
      archiver: options.archiver.unwrap_or_else(|| Arc::new(ZipArchiver)),
    })
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn shell(&self) -> &PathBuf {
    &self.shell
  }

  pub fn log(&self, msg: &str) {
    (self.log)(&format!("{}: {}", self.name, msg))
  }

  pub fn debug(&self, msg: &str) {
    (self.debug)(&format!("{}: {}", self.name, msg))
  }

  /// A log function that prefixes lines with this build's name.
  pub fn logger(&self) -> LogFn {
    let name = self.name.clone();
    let log = Arc::clone(&self.log);
    Arc::new(move |msg: &str| log(&format!("{}: {}", name, msg)))
  }
}

impl std::fmt::Debug for Settings {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Settings")
      .field("name", &self.name)
      .field("shell", &self.shell)
      .field("timeout", &self.timeout)
      .field("stdout", &self.stdout)
      .field("stderr", &self.stderr)
      .finish_non_exhaustive()
  }
}

fn default_log() -> LogFn {
  Arc::new(|msg: &str| info!("{}", msg))
}

fn default_debug() -> LogFn {
  Arc::new(|msg: &str| debug!("{}", msg))
}
