//! Parallel collection operations.
//!
//! Every operation normalizes its input with [`IntoSequence`], takes the
//! calling thread's current pool (failing with
//! [`PoolError::NoPoolAvailable`] outside of a pool scope), fans one unit of
//! work per element out to that pool and blocks until the result is known.
//! Failures of several elements are reported together as a
//! [`PoolError::Composite`].

mod collect;
mod each;
mod filter;
mod group;
mod reduce;
mod search;

pub use collect::{collect_many_parallel, collect_parallel};
pub use each::{each_parallel, each_with_index_parallel};
pub use filter::{count_parallel, count_parallel_by, find_all_parallel, grep_parallel, split_parallel};
pub use group::group_by_parallel;
pub use reduce::{
  fold_parallel, fold_parallel_with_seed, inject_parallel, inject_parallel_with_seed, max_parallel, max_parallel_by,
  min_parallel, min_parallel_by, sum_parallel,
};
pub use search::{any_parallel, every_parallel, find_any_parallel, find_parallel};

use crate::aggregate;
use crate::callback::Element;
use crate::coerce::IntoSequence;
use crate::error::PoolError;
use crate::handle::TaskHandle;
use crate::pool::Pool;
use crate::scope;
use crate::task::TaskContext;

use std::sync::Arc;

use tracing::trace;

/// The elements of one parallel operation, shared with its sub-tasks.
pub(crate) struct FanOut<T: Element> {
  pool: Pool,
  items: Arc<Vec<T>>,
  operation: &'static str,
}

impl<T: Element> FanOut<T> {
  pub(crate) fn prepare<C>(items: C, operation: &'static str) -> Result<Self, PoolError>
  where
    C: IntoSequence<Item = T>,
  {
    let pool = scope::current()?;
    let items = Arc::new(items.into_sequence());
    trace!(operation, pool_name = %pool.name(), elements = items.len(), "Fanning out.");
    Ok(Self { pool, items, operation })
  }

  pub(crate) fn pool(&self) -> &Pool {
    &self.pool
  }

  pub(crate) fn len(&self) -> usize {
    self.items.len()
  }

  pub(crate) fn items(&self) -> &[T] {
    &self.items
  }

  pub(crate) fn shared_items(&self) -> Arc<Vec<T>> {
    self.items.clone()
  }

  /// Submits one unit of work per element, in element order.
  pub(crate) fn spawn_each<R, F>(&self, job: F) -> Result<Vec<TaskHandle<Result<R, PoolError>>>, PoolError>
  where
    F: Fn(&TaskContext, usize, &T) -> Result<R, PoolError> + Send + Sync + 'static,
    R: Send + 'static,
  {
    let job = Arc::new(job);
    let mut handles = Vec::with_capacity(self.items.len());
    for index in 0..self.items.len() {
      let items = self.items.clone();
      let job = job.clone();
      let submitted = self.pool.submit(move |context| job(context, index, &items[index]));
      match submitted {
        Ok(handle) => handles.push(handle),
        Err(submit_error) => {
          abandon(&handles);
          return Err(submit_error);
        }
      }
    }
    Ok(handles)
  }

  /// Runs `job` for every element and returns the results in element order.
  pub(crate) fn map_each<R, F>(&self, job: F) -> Result<Vec<R>, PoolError>
  where
    F: Fn(&TaskContext, usize, &T) -> Result<R, PoolError> + Send + Sync + 'static,
    R: Send + 'static,
  {
    aggregate::join_all_fallible(self.spawn_each(job)?)
  }

  /// Reduces the elements with `combine`, one chunk per worker. The grouping
  /// differs from a sequential left fold but the operand order does not.
  pub(crate) fn reduce<F>(&self, combine: F) -> Result<Option<T>, PoolError>
  where
    F: Fn(T, T) -> T + Send + Sync + 'static,
  {
    self.try_reduce(move |left, right| Ok(combine(left, right)))
  }

  /// Like `reduce`, stopping a chunk at the first failing combination.
  pub(crate) fn try_reduce<F>(&self, combine: F) -> Result<Option<T>, PoolError>
  where
    F: Fn(T, T) -> Result<T, PoolError> + Send + Sync + 'static,
  {
    if self.items.is_empty() {
      return Ok(None);
    }

    let combine = Arc::new(combine);
    let chunk_size = self.items.len().div_ceil(self.pool.parallelism());
    let mut handles = Vec::new();
    for start in (0..self.items.len()).step_by(chunk_size) {
      let end = (start + chunk_size).min(self.items.len());
      let items = self.items.clone();
      let combine = combine.clone();
      let submitted = self
        .pool
        .submit(move |_| combine_in_order(items[start..end].iter().cloned(), &*combine));
      match submitted {
        Ok(handle) => handles.push(handle),
        Err(submit_error) => {
          abandon(&handles);
          return Err(submit_error);
        }
      }
    }
    trace!(operation = self.operation, chunks = handles.len(), "Reducing chunks.");

    let partials = aggregate::join_all_fallible(handles)?;
    self
      .pool
      .submit(move |_| combine_in_order(partials.into_iter().flatten(), &*combine))?
      .join()
      .and_then(|outcome| outcome)
  }

  /// Runs one final step of an operation on the pool, so a panicking
  /// callback is reported like any other unit of work.
  pub(crate) fn finish<R, F>(&self, step: F) -> Result<R, PoolError>
  where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
  {
    self.pool.submit(move |_| step())?.join()
  }

  /// Gives the elements back, cloning only if a sub-task still shares them.
  pub(crate) fn into_items(self) -> Vec<T> {
    Arc::try_unwrap(self.items).unwrap_or_else(|shared| shared.as_ref().clone())
  }
}

pub(crate) fn abandon<R: Send + 'static>(handles: &[TaskHandle<R>]) {
  for handle in handles {
    handle.cancel();
  }
}

fn combine_in_order<T, F>(mut values: impl Iterator<Item = T>, combine: &F) -> Result<Option<T>, PoolError>
where
  F: Fn(T, T) -> Result<T, PoolError>,
{
  let Some(first) = values.next() else {
    return Ok(None);
  };
  values.try_fold(first, combine).map(Some)
}
