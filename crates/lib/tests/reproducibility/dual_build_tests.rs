//! Primary build followed by a local verification of the same tree.

use chrono::{Duration, Utc};
use twinbuild_lib::build::{Build, BuildResult, LocalVerification, PrimaryBuild, compare};

use super::common::{TestEnv, config, options};

/// Copies a source file into place and, when `STAMP` is set, appends bytes
/// that differ on every run.
const INSTRUCTIONS: &str = r#"
cp src/main.txt "$BIN_PATH"
if [ -n "$STAMP" ]; then od -An -N8 /dev/urandom >> "$BIN_PATH"; fi
"#;

async fn primary(env: &TestEnv, instructions: &str) -> BuildResult {
  PrimaryBuild::new(config(env.primary_root(), instructions), options())
    .unwrap()
    .run()
    .await
}

async fn verify(env: &TestEnv, instructions: &str, delay_ms: i64) -> BuildResult {
  LocalVerification::new(
    env.primary_root(),
    Utc::now() + Duration::milliseconds(delay_ms),
    config(&env.verification_root(), instructions),
    options(),
  )
  .unwrap()
  .run()
  .await
}

#[tokio::test]
async fn deterministic_build_is_reproducible() {
  let env = TestEnv::new();
  env.write_source("src/main.txt", "lockbox v1.2.3\n");

  let primary = primary(&env, INSTRUCTIONS).await;
  assert!(primary.successful, "{:?}", primary.error());

  let verification = verify(&env, INSTRUCTIONS, 0).await;
  assert!(verification.successful, "{:?}", verification.error());

  let outcome = compare(&primary, &verification);
  assert!(outcome.executable_matches);
  assert!(outcome.zip_matches);
  assert!(outcome.is_reproducible());
}

#[tokio::test]
async fn time_dependent_build_is_not_reproducible() {
  let env = TestEnv::new();
  env.write_source("src/main.txt", "lockbox v1.2.3\n");
  let instructions = format!("STAMP=1\n{}", INSTRUCTIONS);

  let primary = primary(&env, &instructions).await;
  let verification = verify(&env, &instructions, 50).await;

  assert!(primary.successful && verification.successful);
  assert!(!compare(&primary, &verification).is_reproducible());
}

#[tokio::test]
async fn verification_does_not_touch_primary_tree() {
  let env = TestEnv::new();
  env.write_source("src/main.txt", "lockbox v1.2.3\n");

  let primary = primary(&env, INSTRUCTIONS).await;
  let before = std::fs::read(&primary.executable.as_ref().unwrap().original_path).unwrap();

  let verification = verify(&env, INSTRUCTIONS, 0).await;
  assert!(verification.successful);

  let verified_bin = &verification.executable.as_ref().unwrap().original_path;
  assert!(verified_bin.starts_with(env.verification_root()));
  assert_eq!(before, std::fs::read(&primary.executable.unwrap().original_path).unwrap());
}

#[tokio::test]
async fn saved_results_are_served_from_cache() {
  let env = TestEnv::new();
  env.write_source("src/main.txt", "lockbox v1.2.3\n");

  let build = PrimaryBuild::new(config(env.primary_root(), INSTRUCTIONS), options()).unwrap();
  assert!(build.cached_result().unwrap().is_none());

  let result = build.run().await;
  let path = result.save().unwrap();
  assert_eq!(path, build.config().build_result_cache_path());

  let cached = build.cached_result().unwrap().unwrap();
  assert_eq!(cached, result);
}

#[tokio::test]
async fn failed_primary_reports_first_error_only() {
  let env = TestEnv::new();

  let result = primary(&env, "echo nothing here").await;

  assert!(!result.successful);
  assert!(result.executable.is_none());
  assert!(result.zip.is_none());
  assert!(
    result
      .error()
      .unwrap()
      .starts_with("asserting executable written failed: no file written to BIN_PATH")
  );
  assert!(result.meta.finish.is_some());
}
