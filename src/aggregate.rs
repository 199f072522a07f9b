//! Joining many handles at once without hiding partial failures.

use crate::error::{CompositeFailure, PoolError};
use crate::handle::TaskHandle;

use tracing::debug;

/// Waits for every handle, in submission order, and returns all results.
///
/// Every handle is joined even after a failure. A single failure is returned
/// as-is; two or more are wrapped into [`PoolError::Composite`] in the order
/// their tasks were submitted.
pub fn join_all<R: Send + 'static>(handles: Vec<TaskHandle<R>>) -> Result<Vec<R>, PoolError> {
  collect_outcomes(handles.into_iter().map(TaskHandle::join))
}

/// Same as [`join_all`] for units of work that report their own failures.
pub(crate) fn join_all_fallible<R: Send + 'static>(
  handles: Vec<TaskHandle<Result<R, PoolError>>>,
) -> Result<Vec<R>, PoolError> {
  collect_outcomes(handles.into_iter().map(|handle| handle.join().and_then(|outcome| outcome)))
}

/// Folds a list of failures into the error reported to the caller.
pub fn combine_failures(mut failures: Vec<PoolError>) -> Option<PoolError> {
  match failures.len() {
    0 => None,
    1 => failures.pop(),
    count => {
      debug!(count, "Aggregating concurrent failures.");
      Some(PoolError::Composite(CompositeFailure::new(failures)))
    }
  }
}

fn collect_outcomes<R>(outcomes: impl Iterator<Item = Result<R, PoolError>>) -> Result<Vec<R>, PoolError> {
  let mut values = Vec::new();
  let mut failures = Vec::new();
  for outcome in outcomes {
    match outcome {
      Ok(value) => values.push(value),
      Err(failure) => failures.push(failure),
    }
  }
  match combine_failures(failures) {
    Some(failure) => Err(failure),
    None => Ok(values),
  }
}
