//! End-to-end primary and verification builds.

#![cfg(unix)]

mod cancellation_tests;
mod common;
mod dual_build_tests;
