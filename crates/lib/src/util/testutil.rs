//! Test utilities for twinbuild-lib.
//!
//! Fixtures shared by unit tests across the build modules.

use std::path::Path;

use crate::build::{Config, Options, Parameters, Product, Tool};
use crate::consts::APP_NAME;

pub const STANDARD_REVISION_TIME: &str = "2022-07-04T11:33:33Z";

/// The product every unit test builds.
pub fn standard_product() -> Product {
  Product {
    repository: "dadgarcorp/lockbox".to_string(),
    name: "lockbox".to_string(),
    version: "1.2.3".to_string(),
    revision: "cabba9e".to_string(),
    revision_time: STANDARD_REVISION_TIME.to_string(),
    source_hash: "0123456789abcdef".to_string(),
  }
}

pub fn standard_parameters(instructions: &str) -> Parameters {
  Parameters::new(instructions).with_target("linux", "amd64")
}

pub fn standard_tool() -> Tool {
  Tool {
    name: APP_NAME.to_string(),
    version: "0.1.0".to_string(),
    revision: "deadbeef".to_string(),
  }
}

/// A config rooted at `root` whose instructions are `instructions`.
pub fn standard_config(root: &Path, instructions: &str) -> Config {
  Config::rooted_at(
    root,
    standard_product(),
    standard_parameters(instructions),
    standard_tool(),
  )
}

/// Build options that run instructions with `sh` and discard their output.
pub fn quiet_options() -> Options {
  Options::default()
    .with_shell("sh")
    .with_stdout(crate::build::Sink::Null)
    .with_stderr(crate::build::Sink::Null)
}

/// Instructions that write a fixed executable to `$BIN_PATH`.
pub const FIXED_OUTPUT_INSTRUCTIONS: &str = r#"printf 'hello, world\n' > "$BIN_PATH""#;
