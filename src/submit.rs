use crate::config::{self, ParallelConfig};
use crate::error::PoolError;
use crate::handle::TaskHandle;
use crate::scope;
use crate::task::{Cancellable, TaskContext};
use crate::timer::GeneralTimer;

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::debug;

lazy_static::lazy_static! {
  static ref TIMEOUT_CANCELLER: Result<TimeoutCanceller, PoolError> = TimeoutCanceller::new(config::global());
}

/// Submits `work` to the calling thread's current pool.
///
/// Fails with [`PoolError::NoPoolAvailable`] outside of a pool scope; a pool is
/// never created implicitly.
pub fn submit<F, R>(work: F) -> Result<TaskHandle<R>, PoolError>
where
  F: FnOnce(&TaskContext) -> R + Send + 'static,
  R: Send + 'static,
{
  scope::current()?.submit(work)
}

/// Submits `f(args)` to the current pool.
pub fn call_async<A, F, R>(f: F, args: A) -> Result<TaskHandle<R>, PoolError>
where
  A: Send + 'static,
  F: FnOnce(A) -> R + Send + 'static,
  R: Send + 'static,
{
  submit(move |_: &TaskContext| f(args))
}

/// Turns `f` into a function that runs each call asynchronously.
///
/// Every call submits `f(args)` to the pool that is current on the calling
/// thread at call time and returns the handle of that submission.
///
/// ```no_run
/// use scoped_parallel::{asynchronous, with_pool, Pool, PoolError};
///
/// let pool = Pool::new(2, "squares").unwrap();
/// let square = asynchronous(|x: u64| x * x);
/// let total = with_pool(&pool, || -> Result<u64, PoolError> {
///   let handles = (1..=3).map(&square).collect::<Result<Vec<_>, _>>()?;
///   Ok(scoped_parallel::join_all(handles)?.into_iter().sum())
/// });
/// assert_eq!(total, Ok(14));
/// ```
pub fn asynchronous<A, F, R>(f: F) -> impl Fn(A) -> Result<TaskHandle<R>, PoolError> + Clone + Send + Sync
where
  A: Send + 'static,
  F: Fn(A) -> R + Send + Sync + 'static,
  R: Send + 'static,
{
  let f = Arc::new(f);
  move |args| {
    let f = f.clone();
    submit(move |_: &TaskContext| f(args))
  }
}

/// Submits `work` to the current pool and requests its cancellation once
/// `timeout` elapses, using the process-wide timeout timer.
pub fn submit_with_timeout<F, R>(work: F, timeout: Duration) -> Result<TaskHandle<R>, PoolError>
where
  F: FnOnce(&TaskContext) -> R + Send + 'static,
  R: Send + 'static,
{
  match &*TIMEOUT_CANCELLER {
    Ok(canceller) => canceller.submit_with_timeout(work, timeout),
    Err(timer_error) => Err(timer_error.clone()),
  }
}

/// Schedules cancellation requests against submitted tasks on a shared timer.
///
/// Cancellation is advisory: the task only stops if it checks its
/// [`TaskContext`] after the deadline.
#[derive(Clone)]
pub struct TimeoutCanceller {
  timer: Arc<dyn GeneralTimer>,
}

/// Target of a timeout scheduled before its task was submitted.
enum PendingTimeout {
  Unarmed,
  Armed(Arc<dyn Cancellable>),
  Expired,
}

impl TimeoutCanceller {
  pub const TIMER_NAME: &'static str = "ParallelTimeoutTimer";

  /// Uses the daemon timer retrieved from `config`.
  pub fn new(config: &ParallelConfig) -> Result<Self, PoolError> {
    Ok(Self::with_timer(config.retrieve_default_timer(Self::TIMER_NAME, true)?))
  }

  pub fn with_timer(timer: Arc<dyn GeneralTimer>) -> Self {
    Self { timer }
  }

  pub fn timer_name(&self) -> &str {
    self.timer.name()
  }

  /// Submits `work` to the current pool with a timeout.
  ///
  /// The timeout is scheduled before the work is submitted, so a timer that
  /// cannot take it leaves nothing running.
  pub fn submit_with_timeout<F, R>(&self, work: F, timeout: Duration) -> Result<TaskHandle<R>, PoolError>
  where
    F: FnOnce(&TaskContext) -> R + Send + 'static,
    R: Send + 'static,
  {
    let pool = scope::current()?;
    let pending = Arc::new(Mutex::new(PendingTimeout::Unarmed));
    let expiry = pending.clone();
    debug!(timeout_ms = timeout.as_millis() as u64, "Scheduling timeout ahead of submission.");
    self.timer.schedule(
      timeout,
      Box::new(move || {
        if let PendingTimeout::Armed(target) = std::mem::replace(&mut *expiry.lock(), PendingTimeout::Expired) {
          if target.cancel() {
            debug!(task_id = %target.task_id(), "Timeout elapsed, task cancelled.");
          }
        }
      }),
    )?;

    let handle = match pool.submit(work) {
      Ok(handle) => handle,
      Err(submit_error) => {
        *pending.lock() = PendingTimeout::Expired;
        return Err(submit_error);
      }
    };
    let expired = {
      let mut pending = pending.lock();
      match *pending {
        PendingTimeout::Expired => true,
        _ => {
          *pending = PendingTimeout::Armed(handle.canceller());
          false
        }
      }
    };
    if expired && handle.cancel() {
      debug!(task_id = %handle.id(), "Timeout elapsed during submission, task cancelled.");
    }
    Ok(handle)
  }

  /// Requests cancellation of `handle` after `timeout`. A no-op if the task
  /// finished by then.
  pub fn cancel_after<R: Send + 'static>(&self, handle: &TaskHandle<R>, timeout: Duration) -> Result<(), PoolError> {
    let target = handle.canceller();
    let task_id = handle.id();
    debug!(%task_id, timeout_ms = timeout.as_millis() as u64, "Scheduling timeout cancellation.");
    self.timer.schedule(
      timeout,
      Box::new(move || {
        if target.cancel() {
          debug!(%task_id, "Timeout elapsed, task cancelled.");
        }
      }),
    )
  }
}
