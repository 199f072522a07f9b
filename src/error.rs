use std::fmt;

use thiserror::Error;

/// Errors that can occur within the `scoped_parallel` pools and parallel operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PoolError {
  #[error("Configuration error: {0} has already been called, the value can only be set once")]
  AlreadySet(&'static str),

  #[error("No pool available for the current thread")]
  NoPoolAvailable,

  #[error("Failed to build pool '{name}': {reason}")]
  PoolBuildFailed { name: String, reason: String },

  #[error("Timer '{0}' has been shut down and cannot schedule new actions")]
  TimerShutDown(String),

  #[error("Pool '{0}' is shutting down or already shut down, cannot accept new tasks")]
  PoolShuttingDown(String),

  /// `trace` holds the backtrace captured where the unit of work panicked.
  #[error("Task {task_id} panicked: {message}")]
  TaskPanicked {
    task_id: u64,
    message: String,
    trace: Option<String>,
  },

  #[error("Task {0} was cancelled")]
  TaskCancelled(u64),

  #[error("Task result already taken")]
  ResultUnavailable,

  #[error("A callback accepting {max_parameters} parameter(s) cannot be used for {operation}")]
  UnsupportedArity {
    operation: &'static str,
    max_parameters: usize,
  },

  #[error("Adding {0} values overflowed")]
  Overflow(&'static str),

  #[error("Callback expects a (key, value) pair but the element is not a pair")]
  NotAPair,

  #[error(transparent)]
  Composite(#[from] CompositeFailure),
}

impl PoolError {
  /// True for the cancellation signal, as opposed to a genuine failure.
  pub fn is_cancellation(&self) -> bool {
    matches!(self, PoolError::TaskCancelled(_))
  }
}

/// Several failures raised by concurrently running units of work, in the order
/// their sub-tasks were submitted.
#[derive(Error, Debug, Clone, PartialEq)]
pub struct CompositeFailure {
  failures: Vec<PoolError>,
}

impl CompositeFailure {
  pub(crate) fn new(failures: Vec<PoolError>) -> Self {
    Self { failures }
  }

  pub fn failures(&self) -> &[PoolError] {
    &self.failures
  }

  pub fn len(&self) -> usize {
    self.failures.len()
  }

  pub fn is_empty(&self) -> bool {
    self.failures.is_empty()
  }

  pub fn into_failures(self) -> Vec<PoolError> {
    self.failures
  }
}

impl fmt::Display for CompositeFailure {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} concurrent failures:", self.failures.len())?;
    for (position, failure) in self.failures.iter().enumerate() {
      write!(f, "\n  [{}] {}", position, failure)?;
    }
    Ok(())
  }
}
