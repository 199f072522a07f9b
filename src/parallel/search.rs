use super::{abandon, FanOut};
use crate::aggregate;
use crate::callback::{Callback, Element};
use crate::coerce::IntoSequence;
use crate::error::PoolError;
use crate::task;
use crate::value::Truthy;

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, warn};

/// Returns the lowest-index element whose predicate result is true-ish.
///
/// Once a match is known, elements at higher indices are skipped. Failures of
/// elements below the match are reported; failures above it are discarded.
pub fn find_parallel<C, T, P>(items: C, predicate: Callback<T, P>) -> Result<Option<T>, PoolError>
where
  C: IntoSequence<Item = T>,
  T: Element,
  P: Truthy + 'static,
{
  predicate.require_element("find_parallel")?;
  let fan_out = FanOut::prepare(items, "find_parallel")?;

  let best = Arc::new(AtomicUsize::new(usize::MAX));
  let best_for_jobs = best.clone();
  let handles = fan_out.spawn_each(move |_, index, item| {
    if index > best_for_jobs.load(Ordering::Acquire) {
      return Ok(false);
    }
    let matched = predicate.invoke(item)?.is_truthy();
    if matched {
      best_for_jobs.fetch_min(index, Ordering::AcqRel);
    }
    Ok(matched)
  })?;

  let outcomes: Vec<Result<bool, PoolError>> = handles
    .into_iter()
    .map(|handle| handle.join().and_then(|outcome| outcome))
    .collect();
  let best = best.load(Ordering::Acquire);

  let mut failures = Vec::new();
  for (index, outcome) in outcomes.into_iter().enumerate() {
    if let Err(failure) = outcome {
      if index < best {
        failures.push(failure);
      } else {
        warn!(index, error = %failure, "Discarding failure past the first match.");
      }
    }
  }
  if let Some(failure) = aggregate::combine_failures(failures) {
    return Err(failure);
  }
  Ok(fan_out.items().get(best).cloned())
}

/// Returns some element whose predicate result is true-ish, not necessarily
/// the first one. Outstanding sub-tasks are cancelled as soon as a match is
/// known; evaluations that failed before then are still reported.
pub fn find_any_parallel<C, T, P>(items: C, predicate: Callback<T, P>) -> Result<Option<T>, PoolError>
where
  C: IntoSequence<Item = T>,
  T: Element,
  P: Truthy + 'static,
{
  predicate.require_element("find_any_parallel")?;
  let fan_out = FanOut::prepare(items, "find_any_parallel")?;
  let found = race(&fan_out, move |item| predicate.invoke(item).map(|verdict| verdict.is_truthy()))?;
  Ok(found.and_then(|index| fan_out.items().get(index).cloned()))
}

/// Whether any element's predicate result is true-ish. Stops at the first hit.
pub fn any_parallel<C, T, P>(items: C, predicate: Callback<T, P>) -> Result<bool, PoolError>
where
  C: IntoSequence<Item = T>,
  T: Element,
  P: Truthy + 'static,
{
  predicate.require_element("any_parallel")?;
  let fan_out = FanOut::prepare(items, "any_parallel")?;
  let found = race(&fan_out, move |item| predicate.invoke(item).map(|verdict| verdict.is_truthy()))?;
  Ok(found.is_some())
}

/// Whether every element's predicate result is true-ish. Stops at the first
/// counterexample; an empty input satisfies any predicate.
pub fn every_parallel<C, T, P>(items: C, predicate: Callback<T, P>) -> Result<bool, PoolError>
where
  C: IntoSequence<Item = T>,
  T: Element,
  P: Truthy + 'static,
{
  predicate.require_element("every_parallel")?;
  let fan_out = FanOut::prepare(items, "every_parallel")?;
  let counterexample = race(&fan_out, move |item| predicate.invoke(item).map(|verdict| !verdict.is_truthy()))?;
  Ok(counterexample.is_none())
}

/// Evaluates `hit` for every element until one reports a hit, and returns the
/// index of the first hit recorded.
///
/// Without a hit every failure is reported. With a hit, the failures recorded
/// before the latch released are reported instead of the hit.
fn race<T, F>(fan_out: &FanOut<T>, hit: F) -> Result<Option<usize>, PoolError>
where
  T: Element,
  F: Fn(&T) -> Result<bool, PoolError> + Send + Sync + 'static,
{
  let latch = Arc::new(MatchLatch::new(fan_out.len()));
  let hit = Arc::new(hit);
  let items = fan_out.shared_items();

  let mut handles = Vec::with_capacity(fan_out.len());
  for index in 0..fan_out.len() {
    // Moved into the unit of work so it arrives even if the work never runs.
    let arrival = Arrival(latch.clone());
    let items = items.clone();
    let hit = hit.clone();
    let submitted = fan_out.pool().submit(move |context| {
      let latch = &arrival.0;
      if context.is_cancelled() || latch.is_matched() {
        return Ok(());
      }
      let verdict = panic::catch_unwind(AssertUnwindSafe(|| hit(&items[index])))
        .unwrap_or_else(|payload| Err(task::panic_failure(context.task_id(), payload.as_ref())));
      match verdict {
        Ok(true) => latch.record_match(index),
        Ok(false) => {}
        Err(failure) => {
          latch.record_failure(index, failure.clone());
          return Err(failure);
        }
      }
      Ok(())
    });
    match submitted {
      Ok(handle) => handles.push(handle),
      Err(submit_error) => {
        abandon(&handles);
        return Err(submit_error);
      }
    }
  }

  match task::blocking(|| latch.wait()) {
    Some(index) => {
      let outstanding = handles.iter().filter(|handle| !handle.is_done()).count();
      debug!(index, outstanding, "Match found, cancelling the rest.");
      abandon(&handles);
      match aggregate::combine_failures(latch.take_failures()) {
        Some(failure) => {
          warn!(index, error = %failure, "Match found but earlier evaluations failed.");
          Err(failure)
        }
        None => Ok(Some(index)),
      }
    }
    None => aggregate::join_all_fallible(handles).map(|_| None),
  }
}

struct LatchState {
  remaining: usize,
  first_match: Option<usize>,
  failures: Vec<(usize, PoolError)>,
}

/// Released by the first match or once every unit of work has arrived.
struct MatchLatch {
  state: Mutex<LatchState>,
  released: Condvar,
  matched: AtomicBool,
}

impl MatchLatch {
  fn new(remaining: usize) -> Self {
    Self {
      state: Mutex::new(LatchState {
        remaining,
        first_match: None,
        failures: Vec::new(),
      }),
      released: Condvar::new(),
      matched: AtomicBool::new(false),
    }
  }

  fn is_matched(&self) -> bool {
    self.matched.load(Ordering::Acquire)
  }

  fn record_match(&self, index: usize) {
    let mut state = self.state.lock();
    if state.first_match.is_none() {
      state.first_match = Some(index);
      self.matched.store(true, Ordering::Release);
      self.released.notify_all();
    }
  }

  fn record_failure(&self, index: usize, failure: PoolError) {
    let mut state = self.state.lock();
    if state.first_match.is_none() {
      state.failures.push((index, failure));
    } else {
      warn!(index, error = %failure, "Discarding failure after the first match.");
    }
  }

  /// Failures recorded before the release, in element order.
  fn take_failures(&self) -> Vec<PoolError> {
    let mut failures = std::mem::take(&mut self.state.lock().failures);
    failures.sort_by_key(|(index, _)| *index);
    failures.into_iter().map(|(_, failure)| failure).collect()
  }

  fn arrive(&self) {
    let mut state = self.state.lock();
    state.remaining = state.remaining.saturating_sub(1);
    if state.remaining == 0 {
      self.released.notify_all();
    }
  }

  fn wait(&self) -> Option<usize> {
    let mut state = self.state.lock();
    while state.first_match.is_none() && state.remaining > 0 {
      self.released.wait(&mut state);
    }
    state.first_match
  }
}

/// Marks one unit of work as finished when dropped, whether it ran, panicked
/// or was discarded unrun.
struct Arrival(Arc<MatchLatch>);

impl Drop for Arrival {
  fn drop(&mut self) {
    self.0.arrive();
  }
}
