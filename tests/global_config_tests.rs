//! Exercises the process-wide configuration. Kept in its own test binary with a
//! single test, since the global factories can only be set once per process.

use scoped_parallel::{config, submit_with_timeout, with_pool, Pool, PoolError, PoolState, TaskContext};
use std::time::Duration;

fn setup_tracing_for_test() {
  use std::sync::Once;
  use tracing_subscriber::{fmt, EnvFilter};
  static TRACING_INIT: Once = Once::new();

  TRACING_INIT.call_once(|| {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,scoped_parallel=trace"));

    fmt::Subscriber::builder()
      .with_env_filter(filter)
      .with_test_writer()
      .try_init()
      .ok();
  });
}

#[test]
fn test_global_configuration_lifecycle() {
  setup_tracing_for_test();

  config::set_pool_factory(|| Pool::new(2, "test_global_default_pool")).unwrap();
  assert_eq!(
    config::set_pool_factory(|| Pool::new(3, "test_global_other_pool")),
    Err(PoolError::AlreadySet("set_pool_factory"))
  );

  let pool = config::retrieve_default_pool().unwrap();
  assert_eq!(pool.name(), "test_global_default_pool");
  assert_eq!(pool.parallelism(), 2);

  // Brings up the process-wide timeout timer.
  let handle = with_pool(&pool, || submit_with_timeout(|_: &TaskContext| "done", Duration::from_secs(5))).unwrap();
  assert_eq!(handle.join(), Ok("done"));
  assert!(config::global().registered_timer_count() >= 1);

  config::shutdown();
  assert_eq!(pool.state(), PoolState::ShutDown);
  config::shutdown();

  let replacement = Pool::new(1, "test_global_after_shutdown").unwrap();
  let rejected = with_pool(&replacement, || {
    submit_with_timeout(|_: &TaskContext| "late", Duration::from_secs(5))
  });
  match rejected {
    Err(PoolError::TimerShutDown(name)) => assert_eq!(name, "ParallelTimeoutTimer"),
    other => panic!("Expected TimerShutDown, got {:?}", other.map(|_| ())),
  }
  replacement.shutdown(scoped_parallel::ShutdownMode::Graceful);
}
