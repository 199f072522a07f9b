use crate::error::PoolError;
use crate::task::{Cancellable, TaskCell, TaskStatus};

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing;

/// A handle to a unit of work submitted to a [`Pool`](crate::Pool).
///
/// Allows for requesting cancellation of the task and blocking until its
/// result is available. Handles are cheap to clone; every clone observes the
/// same task, but only the first `join` receives the result.
pub struct TaskHandle<R: Send + 'static> {
  cell: Arc<TaskCell<R>>,
}

impl<R: Send + 'static> Clone for TaskHandle<R> {
  fn clone(&self) -> Self {
    Self {
      cell: self.cell.clone(),
    }
  }
}

impl<R: Send + 'static> fmt::Debug for TaskHandle<R> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("TaskHandle")
      .field("task_id", &self.cell.id())
      .field("status", &self.cell.status())
      .finish()
  }
}

impl<R: Send + 'static> TaskHandle<R> {
  pub(crate) fn new(cell: Arc<TaskCell<R>>) -> Self {
    Self { cell }
  }

  /// Returns the unique ID of this task.
  pub fn id(&self) -> u64 {
    self.cell.id()
  }

  pub fn status(&self) -> TaskStatus {
    self.cell.status()
  }

  /// True once the task completed, failed or was cancelled.
  pub fn is_done(&self) -> bool {
    self.status() != TaskStatus::Pending
  }

  pub fn is_cancelled(&self) -> bool {
    self.status() == TaskStatus::Cancelled
  }

  /// Checks if cancellation has been requested for this task via its token.
  pub fn is_cancellation_requested(&self) -> bool {
    self.cell.token().is_cancelled()
  }

  /// Requests cancellation of this specific task.
  ///
  /// Waiters are released immediately with [`PoolError::TaskCancelled`]. The
  /// running unit of work must cooperatively check its
  /// [`TaskContext`](crate::TaskContext) to actually stop. Returns `false` if
  /// the task had already finished, in which case nothing changes.
  pub fn cancel(&self) -> bool {
    let cancelled = self.cell.cancel();
    if cancelled {
      tracing::debug!(task_id = %self.cell.id(), "TaskHandle: Cancellation requested.");
    } else {
      tracing::trace!(task_id = %self.cell.id(), "TaskHandle: Cancellation ignored, task already finished.");
    }
    cancelled
  }

  /// Blocks until the task finished, without taking its result.
  pub fn wait(&self) {
    self.cell.wait();
  }

  /// Blocks until the task finished and returns its result.
  ///
  /// # Errors
  /// Returns `PoolError::TaskPanicked` if the unit of work panicked.
  /// Returns `PoolError::TaskCancelled` if the task was cancelled.
  /// Returns `PoolError::PoolShuttingDown` if the pool was shut down before the task ran.
  /// Returns `PoolError::ResultUnavailable` if another clone already took the result.
  pub fn join(self) -> Result<R, PoolError> {
    self.cell.wait();
    self.cell.take()
  }

  /// Like [`join`](Self::join), but gives up after `timeout`, returning `Ok(None)`.
  /// The task keeps running and can be joined again later.
  pub fn join_timeout(&self, timeout: Duration) -> Result<Option<R>, PoolError> {
    if self.cell.wait_for(timeout) {
      self.cell.take().map(Some)
    } else {
      Ok(None)
    }
  }

  pub(crate) fn canceller(&self) -> Arc<dyn Cancellable> {
    self.cell.clone()
  }
}
