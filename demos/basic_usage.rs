use scoped_parallel::{
  collect_parallel, find_parallel, group_by_parallel, inject_parallel_with_seed, with_new_pool, Callback, Pool,
  PoolError,
};
use std::thread;
use std::time::Duration;
use tracing::info;

fn slow_square(x: &u64) -> u64 {
  info!("Squaring {}", x);
  thread::sleep(Duration::from_millis(100 + x % 3 * 50));
  x * x
}

fn main() -> Result<(), PoolError> {
  tracing_subscriber::fmt()
    .with_max_level(tracing::Level::DEBUG)
    .with_target(false) // Disable module paths for cleaner example output
    .init();

  info!("--- Basic Usage Example ---");

  let outcome = with_new_pool(Pool::builder().name("basic_pool").parallelism(4), |pool| {
    info!("Running with {} workers on pool '{}'", pool.parallelism(), pool.name());

    let squares = collect_parallel((1..=8u64).collect::<Vec<_>>(), Callback::unary(slow_square))?;
    info!("Squares: {:?}", squares);

    let first_big = find_parallel(squares.clone(), Callback::unary(|x: &u64| *x > 20))?;
    info!("First square above 20: {:?}", first_big);

    let by_parity = group_by_parallel(squares.clone(), Callback::unary(|x: &u64| x % 2 == 0))?;
    info!("Even squares: {:?}, odd squares: {:?}", by_parity.get(&true), by_parity.get(&false));

    let total = inject_parallel_with_seed(squares, 0, |a: u64, b: u64| a + b)?;
    info!("Sum of squares: {}", total);
    Ok::<_, PoolError>(())
  })?;
  outcome?;

  info!("Pool shutdown complete.");
  info!("--- Basic Usage Example End ---");
  Ok(())
}
