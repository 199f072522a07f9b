use scoped_parallel::{collect_parallel, scope, with_pool, Callback, Pool, PoolError, ShutdownMode};
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{info, warn};

fn main() -> Result<(), PoolError> {
  tracing_subscriber::fmt()
    .with_max_level(tracing::Level::INFO)
    .with_target(false)
    .init();

  info!("--- Nested Scopes Example ---");
  let io_pool = Pool::new(4, "io_pool")?;
  let cpu_pool = Pool::new(2, "cpu_pool")?;

  with_pool(&io_pool, || -> Result<(), PoolError> {
    info!("Current pool: {}", scope::current()?.name());

    with_pool(&cpu_pool, || -> Result<(), PoolError> {
      info!("Current pool: {}", scope::current()?.name());
      // Callbacks run on cpu_pool workers, which see cpu_pool as current.
      let owners = collect_parallel(
        vec![1, 2, 3],
        Callback::unary(|_: &i32| scope::try_current().map(|pool| pool.name().to_string())),
      )?;
      info!("Callbacks ran on: {:?}", owners);
      Ok(())
    })?;

    // A failing inner block still restores the outer pool.
    let failed = catch_unwind(AssertUnwindSafe(|| with_pool(&cpu_pool, || panic!("inner block failed"))));
    if failed.is_err() {
      warn!("Inner block panicked.");
    }
    info!("Back on: {}", scope::current()?.name());
    Ok(())
  })?;

  info!("Stack empty again: {}", scope::is_empty());
  io_pool.shutdown(ShutdownMode::Graceful);
  cpu_pool.shutdown(ShutdownMode::Graceful);
  info!("--- Nested Scopes Example End ---");
  Ok(())
}
