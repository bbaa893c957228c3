use std::fmt;

/// CPU architectures, named the way release archives name them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arch {
  Amd64,
  Arm64,
  I386,
  Arm,
}

impl Arch {
  /// Detect the current CPU architecture at runtime
  pub fn current() -> Option<Self> {
    Self::from_rust(std::env::consts::ARCH)
  }

  /// Map a `std::env::consts::ARCH` value to its archive identifier
  pub fn from_rust(arch: &str) -> Option<Self> {
    match arch {
      "x86_64" => Some(Self::Amd64),
      "aarch64" => Some(Self::Arm64),
      "x86" => Some(Self::I386),
      "arm" => Some(Self::Arm),
      _ => None,
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Amd64 => "amd64",
      Self::Arm64 => "arm64",
      Self::I386 => "386",
      Self::Arm => "arm",
    }
  }
}

impl fmt::Display for Arch {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

/// Returns the archive identifier of the host architecture.
pub fn host_arch() -> String {
  Arch::current()
    .map(|arch| arch.as_str().to_string())
    .unwrap_or_else(|| std::env::consts::ARCH.to_string())
}
