//! Packaging a build's target directory.
//!
//! The archive must be a pure function of the tree: entry order, names,
//! timestamps and permissions all come from the files themselves, never from
//! the clock or the walk order of the host filesystem.

use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::Path;

use chrono::{DateTime, Datelike, Timelike, Utc};
use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::build::LogFn;

#[derive(Debug, Error)]
pub enum ArchiveError {
  #[error("walking archive source failed: {0}")]
  Walk(#[from] walkdir::Error),

  #[error("writing zip failed: {0}")]
  Zip(#[from] zip::result::ZipError),

  #[error(transparent)]
  Io(#[from] io::Error),
}

/// Packs a directory into a single file.
pub trait Archiver: Send + Sync {
  /// Archive everything beneath `src_dir` (not the directory itself) to
  /// `dest`, creating parent directories of `dest` as needed.
  fn archive(&self, src_dir: &Path, dest: &Path, log: &LogFn) -> Result<(), ArchiveError>;
}

/// Deflate-compressed zip with entries sorted by name.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZipArchiver;

impl Archiver for ZipArchiver {
  fn archive(&self, src_dir: &Path, dest: &Path, log: &LogFn) -> Result<(), ArchiveError> {
    log(&format!("Zipping contents of {:?} into {:?}", src_dir, dest));
    if let Some(parent) = dest.parent() {
      fs::create_dir_all(parent)?;
    }

    let mut zip = ZipWriter::new(BufWriter::new(File::create(dest)?));

    for entry in WalkDir::new(src_dir).min_depth(1).follow_links(false).sort_by_file_name() {
      let entry = entry?;
      let name = entry_name(src_dir, entry.path());
      let meta = entry.path().symlink_metadata()?;
      let options = entry_options(&meta);
      debug!(name = %name, "adding zip entry");

      let file_type = entry.file_type();
      if file_type.is_dir() {
        zip.add_directory(format!("{}/", name), options)?;
      } else if file_type.is_symlink() {
        let target = fs::read_link(entry.path())?;
        zip.add_symlink(name, target.to_string_lossy(), options)?;
      } else {
        zip.start_file(name, options)?;
        io::copy(&mut File::open(entry.path())?, &mut zip)?;
      }
    }

    zip.finish()?;
    Ok(())
  }
}

/// Forward-slash path of `path` relative to `root`.
fn entry_name(root: &Path, path: &Path) -> String {
  let rel = path.strip_prefix(root).unwrap_or(path);
  rel
    .components()
    .map(|c| c.as_os_str().to_string_lossy())
    .collect::<Vec<_>>()
    .join("/")
}

fn entry_options(meta: &fs::Metadata) -> SimpleFileOptions {
  let options = SimpleFileOptions::default()
    .compression_method(CompressionMethod::Deflated)
    .last_modified_time(zip_time(meta));

  #[cfg(unix)]
  let options = {
    use std::os::unix::fs::PermissionsExt;
    options.unix_permissions(meta.permissions().mode() & 0o777)
  };

  options
}

/// The entry's mtime, truncated to what the zip format can hold.
fn zip_time(meta: &fs::Metadata) -> zip::DateTime {
  let Ok(modified) = meta.modified() else {
    return zip::DateTime::default();
  };
  let ts: DateTime<Utc> = modified.into();
  let (Ok(year), Ok(month), Ok(day), Ok(hour), Ok(minute), Ok(second)) = (
    u16::try_from(ts.year()),
    u8::try_from(ts.month()),
    u8::try_from(ts.day()),
    u8::try_from(ts.hour()),
    u8::try_from(ts.minute()),
    u8::try_from(ts.second()),
  ) else {
    return zip::DateTime::default();
  };
  zip::DateTime::from_date_and_time(year, month, day, hour, minute, second).unwrap_or_default()
}
