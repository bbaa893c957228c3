//! Shared utilities.
//!
//! Hashing, filesystem helpers used by build steps, and test helpers.

pub mod fs;
pub mod hash;

#[cfg(test)]
pub mod testutil;
