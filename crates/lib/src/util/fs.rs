//! Filesystem helpers for build steps.
//!
//! Tree copies for verification staging, mtime normalization ahead of
//! packaging, and atomic writes for cache documents.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use filetime::FileTime;
use tracing::debug;
use walkdir::WalkDir;

/// Returns whether a regular file (or a symlink to one) exists at `path`.
///
/// A missing path is `Ok(false)`; any other stat failure is an error.
pub fn file_exists(path: &Path) -> io::Result<bool> {
  match fs::metadata(path) {
    Ok(meta) => Ok(meta.is_file()),
    Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
    Err(e) => Err(e),
  }
}

/// Write `contents` to `path`, creating parent directories.
pub fn write_file(path: &Path, contents: &[u8]) -> io::Result<()> {
  if let Some(parent) = path.parent() {
    fs::create_dir_all(parent)?;
  }
  fs::write(path, contents)
}

/// Write `contents` to `path` via a sibling temp file and rename.
///
/// Readers never observe a partially written file.
pub fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
  let parent = path.parent().unwrap_or_else(|| Path::new("."));
  fs::create_dir_all(parent)?;

  let mut temp_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
  temp_name.push(".tmp");
  let temp_path = parent.join(temp_name);

  fs::write(&temp_path, contents)?;
  fs::rename(&temp_path, path)
}

/// Recursively copy `src` into `dst`, merging with whatever `dst` holds.
///
/// Regular files keep their permissions, symlinks are recreated rather than
/// followed. Entries whose path relative to `src` is listed in `exclude`
/// are skipped along with everything beneath them.
pub fn copy_tree(src: &Path, dst: &Path, exclude: &[PathBuf]) -> io::Result<()> {
  debug!(src = ?src, dst = ?dst, "copying tree");
  fs::create_dir_all(dst)?;

  let walker = WalkDir::new(src)
    .follow_links(false)
    .sort_by_file_name()
    .into_iter()
    .filter_entry(|e| {
      let rel = e.path().strip_prefix(src).unwrap_or(e.path());
      !exclude.iter().any(|x| x.as_path() == rel)
    });

  for entry in walker {
    let entry = entry.map_err(io::Error::other)?;
    let rel = entry.path().strip_prefix(src).map_err(io::Error::other)?;
    if rel.as_os_str().is_empty() {
      continue;
    }

    let target = dst.join(rel);
    let file_type = entry.file_type();

    if file_type.is_dir() {
      fs::create_dir_all(&target)?;
    } else if file_type.is_symlink() {
      let link = fs::read_link(entry.path())?;
      if fs::symlink_metadata(&target).is_ok() {
        fs::remove_file(&target)?;
      }
      create_symlink(&link, &target)?;
    } else if file_type.is_file() {
      fs::copy(entry.path(), &target)?;
    }
  }

  Ok(())
}

#[cfg(unix)]
fn create_symlink(target: &Path, link: &Path) -> io::Result<()> {
  std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn create_symlink(target: &Path, link: &Path) -> io::Result<()> {
  if target.is_dir() {
    std::os::windows::fs::symlink_dir(target, link)
  } else {
    std::os::windows::fs::symlink_file(target, link)
  }
}

/// Set the access and modification time of every entry under `dir`
/// (including `dir` itself) to `ts`.
///
/// Symlinks get their own times set without touching their targets.
pub fn set_mtimes(dir: &Path, ts: DateTime<Utc>) -> io::Result<()> {
  let time = FileTime::from_unix_time(ts.timestamp(), ts.timestamp_subsec_nanos());

  for entry in WalkDir::new(dir).follow_links(false).contents_first(true) {
    let entry = entry.map_err(io::Error::other)?;
    if entry.file_type().is_symlink() {
      filetime::set_symlink_file_times(entry.path(), time, time)?;
    } else {
      filetime::set_file_times(entry.path(), time, time)?;
    }
  }

  Ok(())
}
