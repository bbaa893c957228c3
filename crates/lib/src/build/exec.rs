//! Instruction execution.
//!
//! Build instructions are untrusted shell text. They are written to a temp
//! file and run by the configured shell with:
//! - working directory = the build's work dir
//! - environment = the host environment plus the build's overlay
//! - stdout/stderr routed to the configured sinks
//!
//! A running script is killed when its cancellation fires or its timeout
//! elapses; neither affects steps that already completed.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::process::Command;
use tracing::debug;

use crate::build::settings::{Cancellation, Settings};
use crate::build::types::{BuildError, SettingsError};
use crate::consts::INSTRUCTIONS_FILE_PREFIX;

/// Locate the shell used to run instructions.
///
/// `None` means `bash`. A name containing a path separator is used as-is if
/// it exists; a bare name is searched for on `PATH`.
pub fn resolve_shell(shell: Option<&str>) -> Result<PathBuf, SettingsError> {
  let name = shell.filter(|s| !s.is_empty()).unwrap_or("bash");
  let not_found = || SettingsError::ShellNotFound { name: name.to_string() };

  let candidate = Path::new(name);
  if candidate.components().count() > 1 {
    return if candidate.is_file() {
      Ok(candidate.to_path_buf())
    } else {
      Err(not_found())
    };
  }

  let path_var = std::env::var_os("PATH").ok_or_else(not_found)?;
  std::env::split_paths(&path_var)
    .flat_map(|dir| executable_names(name).into_iter().map(move |n| dir.join(n)))
    .find(|p| is_executable(p))
    .ok_or_else(not_found)
}

#[cfg(windows)]
fn executable_names(name: &str) -> Vec<String> {
  vec![name.to_string(), format!("{}.exe", name)]
}

#[cfg(not(windows))]
fn executable_names(name: &str) -> Vec<String> {
  vec![name.to_string()]
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
  use std::os::unix::fs::PermissionsExt;
  std::fs::metadata(path)
    .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
    .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
  path.is_file()
}

/// How a spawned script stopped.
enum Outcome {
  Exited(std::io::Result<std::process::ExitStatus>),
  Cancelled,
  TimedOut(Duration),
}

/// Write `instructions` to a temp file and run them with the settings' shell.
///
/// `env` is layered over the host environment.
pub async fn run_instructions(
  instructions: &str,
  work_dir: &Path,
  env: &[(String, String)],
  settings: &Settings,
) -> Result<(), BuildError> {
  let script = write_instructions(instructions)?;
  debug!(script = ?script.path(), shell = ?settings.shell, "running instructions");

  let mut command = Command::new(&settings.shell);
  command
    .arg(script.path())
    .current_dir(work_dir)
    .envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
    .stdin(std::process::Stdio::null())
    .stdout(settings.stdout.stdio()?)
    .stderr(settings.stderr.stdio()?)
    .kill_on_drop(true);

  let mut child = command.spawn()?;

  let outcome = tokio::select! {
    status = child.wait() => Outcome::Exited(status),
    _ = wait_cancelled(settings.cancellation.clone()) => Outcome::Cancelled,
    _ = wait_timeout(settings.timeout) => Outcome::TimedOut(settings.timeout.unwrap_or_default()),
  };

  match outcome {
    Outcome::Exited(status) => {
      let status = status?;
      if status.success() {
        Ok(())
      } else {
        Err(BuildError::CmdFailed { code: status.code() })
      }
    }
    Outcome::Cancelled => {
      child.kill().await?;
      Err(BuildError::Cancelled)
    }
    Outcome::TimedOut(after) => {
      child.kill().await?;
      Err(BuildError::TimedOut(after))
    }
  }
}

/// The temp file is removed when the returned handle drops.
fn write_instructions(instructions: &str) -> std::io::Result<tempfile::NamedTempFile> {
  let mut file = tempfile::Builder::new().prefix(INSTRUCTIONS_FILE_PREFIX).tempfile()?;
  file.write_all(instructions.as_bytes())?;
  file.flush()?;
  Ok(file)
}

async fn wait_cancelled(cancellation: Option<Cancellation>) {
  match cancellation {
    Some(mut c) => c.cancelled().await,
    None => std::future::pending().await,
  }
}

async fn wait_timeout(timeout: Option<Duration>) {
  match timeout {
    Some(t) => tokio::time::sleep(t).await,
    None => std::future::pending().await,
  }
}
