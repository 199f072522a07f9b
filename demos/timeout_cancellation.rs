use scoped_parallel::{submit, submit_with_timeout, with_pool, Pool, PoolError, ShutdownMode, TaskContext};
use std::thread;
use std::time::{Duration, Instant};
use tracing::info;

// Works in small steps for up to `total`, giving up as soon as it is cancelled.
fn patient_work(id: usize, total: Duration) -> impl FnOnce(&TaskContext) -> String + Send + 'static {
  move |context| {
    let started = Instant::now();
    while started.elapsed() < total {
      if context.is_cancelled() {
        info!("Task {} (id {}) noticed cancellation, stopping early.", id, context.task_id());
        return format!("task {} stopped", id);
      }
      thread::sleep(Duration::from_millis(20));
    }
    format!("task {} finished", id)
  }
}

fn main() -> Result<(), PoolError> {
  tracing_subscriber::fmt()
    .with_max_level(tracing::Level::DEBUG)
    .with_target(false)
    .init();

  info!("--- Timeout Cancellation Example ---");
  let pool = Pool::new(2, "timeout_pool")?;

  let (quick, slow, manual) = with_pool(&pool, || -> Result<_, PoolError> {
    let quick = submit_with_timeout(patient_work(1, Duration::from_millis(100)), Duration::from_secs(2))?;
    let slow = submit_with_timeout(patient_work(2, Duration::from_secs(10)), Duration::from_millis(300))?;
    let manual = submit(patient_work(3, Duration::from_secs(10)))?;
    Ok((quick, slow, manual))
  })?;

  thread::sleep(Duration::from_millis(100));
  info!("Cancelling task {} by hand.", manual.id());
  manual.cancel();

  info!("Quick task: {:?}", quick.join());
  info!("Slow task: {:?}", slow.join());
  info!("Manually cancelled task: {:?}", manual.join());

  pool.shutdown(ShutdownMode::Graceful);
  scoped_parallel::config::shutdown();
  info!("--- Timeout Cancellation Example End ---");
  Ok(())
}
