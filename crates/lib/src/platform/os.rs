use std::fmt;

/// Target operating systems, named the way release archives name them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Os {
  Linux,
  Darwin,
  Windows,
  FreeBsd,
}

impl Os {
  /// Detect the current operating system at runtime
  pub fn current() -> Option<Self> {
    Self::from_rust(std::env::consts::OS)
  }

  /// Map a `std::env::consts::OS` value to its archive identifier
  pub fn from_rust(os: &str) -> Option<Self> {
    match os {
      "linux" => Some(Self::Linux),
      "macos" => Some(Self::Darwin),
      "windows" => Some(Self::Windows),
      "freebsd" => Some(Self::FreeBsd),
      _ => None,
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Linux => "linux",
      Self::Darwin => "darwin",
      Self::Windows => "windows",
      Self::FreeBsd => "freebsd",
    }
  }
}

impl fmt::Display for Os {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

/// Returns the archive identifier of the host OS.
///
/// Unknown systems fall through with their Rust name unchanged.
pub fn host_os() -> String {
  Os::current()
    .map(|os| os.as_str().to_string())
    .unwrap_or_else(|| std::env::consts::OS.to_string())
}
