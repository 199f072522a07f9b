use super::FanOut;
use crate::callback::{Callback, Element};
use crate::coerce::IntoSequence;
use crate::error::PoolError;
use crate::value::{Grep, Truthy};

/// Evaluates `test` for every element; verdicts follow element order.
fn classify<T, F>(fan_out: &FanOut<T>, test: F) -> Result<Vec<bool>, PoolError>
where
  T: Element,
  F: Fn(&T) -> Result<bool, PoolError> + Send + Sync + 'static,
{
  fan_out.map_each(move |_, _, item| test(item))
}

fn truthy_test<T, P>(predicate: Callback<T, P>) -> impl Fn(&T) -> Result<bool, PoolError> + Send + Sync + 'static
where
  T: Element,
  P: Truthy + 'static,
{
  move |item| predicate.invoke(item).map(|verdict| verdict.is_truthy())
}

fn partition<T: Element>(fan_out: FanOut<T>, verdicts: Vec<bool>) -> (Vec<T>, Vec<T>) {
  let mut matching = Vec::new();
  let mut rest = Vec::new();
  for (item, verdict) in fan_out.into_items().into_iter().zip(verdicts) {
    if verdict {
      matching.push(item);
    } else {
      rest.push(item);
    }
  }
  (matching, rest)
}

/// Keeps the elements whose predicate result is true-ish, in input order.
pub fn find_all_parallel<C, T, P>(items: C, predicate: Callback<T, P>) -> Result<Vec<T>, PoolError>
where
  C: IntoSequence<Item = T>,
  T: Element,
  P: Truthy + 'static,
{
  predicate.require_element("find_all_parallel")?;
  let fan_out = FanOut::prepare(items, "find_all_parallel")?;
  let verdicts = classify(&fan_out, truthy_test(predicate))?;
  Ok(partition(fan_out, verdicts).0)
}

/// Keeps the elements matched by `filter`, in input order.
///
/// ```no_run
/// use scoped_parallel::{grep_parallel, with_new_pool, Pool};
///
/// let teens = with_new_pool(Pool::builder().parallelism(2), |_| grep_parallel(vec![9, 13, 17, 21], 13..20))
///   .and_then(|outcome| outcome);
/// assert_eq!(teens.ok(), Some(vec![13, 17]));
/// ```
pub fn grep_parallel<C, T, G>(items: C, filter: G) -> Result<Vec<T>, PoolError>
where
  C: IntoSequence<Item = T>,
  T: Element,
  G: Grep<T> + Send + Sync + 'static,
{
  let fan_out = FanOut::prepare(items, "grep_parallel")?;
  let verdicts = classify(&fan_out, move |item| filter.is_case(item))?;
  Ok(partition(fan_out, verdicts).0)
}

/// Splits the elements into those whose predicate result is true-ish and the
/// rest. Both groups keep the input order.
pub fn split_parallel<C, T, P>(items: C, predicate: Callback<T, P>) -> Result<(Vec<T>, Vec<T>), PoolError>
where
  C: IntoSequence<Item = T>,
  T: Element,
  P: Truthy + 'static,
{
  predicate.require_element("split_parallel")?;
  let fan_out = FanOut::prepare(items, "split_parallel")?;
  let verdicts = classify(&fan_out, truthy_test(predicate))?;
  Ok(partition(fan_out, verdicts))
}

/// Counts the elements equal to `value`.
pub fn count_parallel<C, T>(items: C, value: &T) -> Result<usize, PoolError>
where
  C: IntoSequence<Item = T>,
  T: Element + PartialEq,
{
  let expected = value.clone();
  let fan_out = FanOut::prepare(items, "count_parallel")?;
  let verdicts = classify(&fan_out, move |item| Ok(*item == expected))?;
  Ok(verdicts.into_iter().filter(|verdict| *verdict).count())
}

/// Counts the elements whose predicate result is true-ish.
pub fn count_parallel_by<C, T, P>(items: C, predicate: Callback<T, P>) -> Result<usize, PoolError>
where
  C: IntoSequence<Item = T>,
  T: Element,
  P: Truthy + 'static,
{
  predicate.require_element("count_parallel_by")?;
  let fan_out = FanOut::prepare(items, "count_parallel_by")?;
  let verdicts = classify(&fan_out, truthy_test(predicate))?;
  Ok(verdicts.into_iter().filter(|verdict| *verdict).count())
}
