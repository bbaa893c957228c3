//! Cancelling and timing out long-running instructions.

use std::time::{Duration, Instant};

use twinbuild_lib::build::{PrimaryBuild, cancellation};

use super::common::{TestEnv, config, options};

#[tokio::test]
async fn cancelled_build_stops_promptly() {
  let env = TestEnv::new();
  let (canceller, token) = cancellation();
  let build = PrimaryBuild::new(
    config(env.primary_root(), "sleep 30"),
    options().with_cancellation(token),
  )
  .unwrap();

  let begun = Instant::now();
  let (result, _) = tokio::join!(build.run(), async {
    tokio::time::sleep(Duration::from_millis(200)).await;
    canceller.cancel();
  });

  assert!(!result.successful);
  assert_eq!(
    result.error(),
    Some("running build instructions failed: build instructions cancelled")
  );
  assert!(begun.elapsed() < Duration::from_secs(10));
}

#[tokio::test]
async fn timed_out_build_fails() {
  let env = TestEnv::new();
  let build = PrimaryBuild::new(
    config(env.primary_root(), "sleep 30"),
    options().with_timeout(Duration::from_millis(200)),
  )
  .unwrap();

  let result = build.run().await;

  assert!(!result.successful);
  assert!(
    result
      .error()
      .unwrap()
      .starts_with("running build instructions failed: build instructions timed out after")
  );
}
