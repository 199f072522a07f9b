use crate::error::PoolError;

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::{Cell, RefCell};
use std::panic;
use std::sync::{Arc, Once};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tokio::runtime::{Handle as TokioHandle, RuntimeFlavor};
use tokio_util::sync::CancellationToken;

/// Observable state of a submitted unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
  Pending,
  Completed,
  Failed,
  Cancelled,
}

impl<R> From<&Result<R, PoolError>> for TaskStatus {
  fn from(result: &Result<R, PoolError>) -> Self {
    match result {
      Ok(_) => TaskStatus::Completed,
      Err(PoolError::TaskCancelled(_)) => TaskStatus::Cancelled,
      Err(_) => TaskStatus::Failed,
    }
  }
}

/// Handed to every unit of work so it can cooperate with cancellation.
#[derive(Debug, Clone)]
pub struct TaskContext {
  task_id: u64,
  pool_name: Arc<String>,
  token: CancellationToken,
}

impl TaskContext {
  pub(crate) fn new(task_id: u64, pool_name: Arc<String>, token: CancellationToken) -> Self {
    Self {
      task_id,
      pool_name,
      token,
    }
  }

  pub fn task_id(&self) -> u64 {
    self.task_id
  }

  pub fn pool_name(&self) -> &str {
    &self.pool_name
  }

  /// True once cancellation was requested for this task. Long-running work
  /// should check this regularly and stop.
  pub fn is_cancelled(&self) -> bool {
    self.token.is_cancelled()
  }

  pub fn cancellation_token(&self) -> &CancellationToken {
    &self.token
  }
}

/// Type-erased cancellation target, used by timers and pool shutdown.
pub(crate) trait Cancellable: Send + Sync {
  fn task_id(&self) -> u64;
  fn cancel(&self) -> bool;
}

enum Slot<R> {
  Pending,
  Ready(Result<R, PoolError>),
  Taken(TaskStatus),
}

/// Internal completion cell shared by a worker and every handle of one task.
/// The slot leaves `Pending` exactly once.
pub(crate) struct TaskCell<R: Send + 'static> {
  task_id: u64,
  token: CancellationToken,
  slot: Mutex<Slot<R>>,
  done: Condvar,
}

impl<R: Send + 'static> TaskCell<R> {
  pub(crate) fn new(task_id: u64) -> Arc<Self> {
    Arc::new(Self {
      task_id,
      token: CancellationToken::new(),
      slot: Mutex::new(Slot::Pending),
      done: Condvar::new(),
    })
  }

  pub(crate) fn id(&self) -> u64 {
    self.task_id
  }

  pub(crate) fn token(&self) -> &CancellationToken {
    &self.token
  }

  /// Stores the outcome. Returns false when the task was already resolved,
  /// in which case the outcome is dropped.
  pub(crate) fn complete(&self, outcome: Result<R, PoolError>) -> bool {
    let mut slot = self.slot.lock();
    if !matches!(*slot, Slot::Pending) {
      return false;
    }
    *slot = Slot::Ready(outcome);
    drop(slot);
    self.done.notify_all();
    true
  }

  pub(crate) fn status(&self) -> TaskStatus {
    match &*self.slot.lock() {
      Slot::Pending => TaskStatus::Pending,
      Slot::Ready(outcome) => TaskStatus::from(outcome),
      Slot::Taken(status) => *status,
    }
  }

  pub(crate) fn wait(&self) {
    blocking(|| {
      let mut slot = self.slot.lock();
      while matches!(*slot, Slot::Pending) {
        self.done.wait(&mut slot);
      }
    })
  }

  /// Returns false if the task was still pending when `timeout` elapsed.
  /// A timeout too large to express as a deadline waits without limit.
  pub(crate) fn wait_for(&self, timeout: Duration) -> bool {
    let Some(deadline) = Instant::now().checked_add(timeout) else {
      self.wait();
      return true;
    };
    blocking(|| {
      let mut slot = self.slot.lock();
      while matches!(*slot, Slot::Pending) {
        if self.done.wait_until(&mut slot, deadline).timed_out() {
          return !matches!(*slot, Slot::Pending);
        }
      }
      true
    })
  }

  /// Takes the stored outcome. Must only be called after a successful wait.
  pub(crate) fn take(&self) -> Result<R, PoolError> {
    let mut slot = self.slot.lock();
    match std::mem::replace(&mut *slot, Slot::Pending) {
      Slot::Ready(outcome) => {
        *slot = Slot::Taken(TaskStatus::from(&outcome));
        outcome
      }
      Slot::Taken(status) => {
        *slot = Slot::Taken(status);
        Err(PoolError::ResultUnavailable)
      }
      Slot::Pending => Err(PoolError::ResultUnavailable),
    }
  }
}

impl<R: Send + 'static> Cancellable for TaskCell<R> {
  fn task_id(&self) -> u64 {
    self.task_id
  }

  fn cancel(&self) -> bool {
    let mut slot = self.slot.lock();
    if !matches!(*slot, Slot::Pending) {
      return false;
    }
    *slot = Slot::Ready(Err(PoolError::TaskCancelled(self.task_id)));
    drop(slot);
    self.token.cancel();
    self.done.notify_all();
    true
  }
}

/// Runs a blocking wait. On a multi-threaded runtime worker the scheduler slot
/// is handed to another thread for the duration of the wait.
pub(crate) fn blocking<T>(wait: impl FnOnce() -> T) -> T {
  match TokioHandle::try_current() {
    Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => tokio::task::block_in_place(wait),
    _ => wait(),
  }
}

thread_local! {
  static IN_UNIT_OF_WORK: Cell<bool> = const { Cell::new(false) };
  static PANIC_TRACE: RefCell<Option<String>> = const { RefCell::new(None) };
}

static TRACE_HOOK: Once = Once::new();

/// Chains a panic hook that records a backtrace for panics raised inside a
/// unit of work. Other panics only reach the previously installed hook.
pub(crate) fn install_trace_hook() {
  TRACE_HOOK.call_once(|| {
    let previous = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
      if IN_UNIT_OF_WORK.with(Cell::get) {
        let trace = Backtrace::force_capture().to_string();
        PANIC_TRACE.with(|slot| *slot.borrow_mut() = Some(trace));
      }
      previous(info);
    }));
  });
}

/// Marks the current thread as running a unit of work until dropped.
pub(crate) struct TracedSection {
  outer: bool,
}

impl TracedSection {
  pub(crate) fn enter() -> Self {
    PANIC_TRACE.with(|slot| slot.borrow_mut().take());
    Self {
      outer: IN_UNIT_OF_WORK.with(|flag| flag.replace(true)),
    }
  }
}

impl Drop for TracedSection {
  fn drop(&mut self) {
    IN_UNIT_OF_WORK.with(|flag| flag.set(self.outer));
  }
}

/// Builds the failure reported for a caught panic, with the backtrace recorded
/// by the hook when there is one.
pub(crate) fn panic_failure(task_id: u64, payload: &(dyn Any + Send)) -> PoolError {
  PoolError::TaskPanicked {
    task_id,
    message: panic_message(payload),
    trace: PANIC_TRACE.with(|slot| slot.borrow_mut().take()),
  }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
  if let Some(message) = payload.downcast_ref::<&'static str>() {
    (*message).to_string()
  } else if let Some(message) = payload.downcast_ref::<String>() {
    message.clone()
  } else {
    "unit of work panicked with a non-string payload".to_string()
  }
}
