//! twinbuild-lib: build execution and reproducibility verification
//!
//! This crate runs a build twice and produces the evidence needed to decide
//! whether the two runs are byte-for-byte identical:
//! - `build::PrimaryBuild`: the authoritative build in the original tree
//! - `build::LocalVerification`: an isolated rebuild in a copy of that tree
//! - `build::Runner`: sequential step execution that records a `BuildResult`
//! - `build::TempDirs`: content-addressed cache and staging directories

pub mod archive;
pub mod build;
pub mod consts;
pub mod platform;
pub mod util;
