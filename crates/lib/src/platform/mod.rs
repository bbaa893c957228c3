//! Host operating system and architecture, named the way release archives
//! and `GOOS`/`GOARCH` name them.

pub mod arch;
pub mod os;

pub use arch::{Arch, host_arch};
pub use os::{Os, host_os};
