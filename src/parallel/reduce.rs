use super::FanOut;
use crate::callback::{Element, Selector};
use crate::coerce::IntoSequence;
use crate::error::PoolError;
use crate::value::Additive;

use std::cmp::Ordering;
use std::sync::Arc;

/// Keeps `right` only if it compares strictly `preferred` to `left`, so ties
/// resolve to the lower index.
fn pick<T>(left: T, right: T, ordering: Ordering, preferred: Ordering) -> T {
  if ordering == preferred {
    right
  } else {
    left
  }
}

fn select<C, T>(items: C, preferred: Ordering, operation: &'static str) -> Result<Option<T>, PoolError>
where
  C: IntoSequence<Item = T>,
  T: Element + Ord,
{
  FanOut::prepare(items, operation)?.reduce(move |left, right| {
    let ordering = right.cmp(&left);
    pick(left, right, ordering, preferred)
  })
}

fn select_by<C, T, K>(
  items: C,
  selector: Selector<T, K>,
  preferred: Ordering,
  operation: &'static str,
) -> Result<Option<T>, PoolError>
where
  C: IntoSequence<Item = T>,
  T: Element,
  K: Ord + Send + 'static,
{
  let fan_out = FanOut::prepare(items, operation)?;
  match selector {
    Selector::Comparator(compare) => fan_out.reduce(move |left, right| {
      let ordering = compare(&right, &left);
      pick(left, right, ordering, preferred)
    }),
    Selector::Key(key) => {
      let keys = fan_out.map_each(move |_, _, item| Ok(key(item)))?;
      let mut best: Option<(usize, &K)> = None;
      for (index, candidate) in keys.iter().enumerate() {
        best = match best {
          Some((_, current)) if candidate.cmp(current) != preferred => best,
          _ => Some((index, candidate)),
        };
      }
      Ok(best.and_then(|(index, _)| fan_out.items().get(index).cloned()))
    }
  }
}

/// The smallest element by natural ordering; the first one on ties.
pub fn min_parallel<C, T>(items: C) -> Result<Option<T>, PoolError>
where
  C: IntoSequence<Item = T>,
  T: Element + Ord,
{
  select(items, Ordering::Less, "min_parallel")
}

/// The largest element by natural ordering; the first one on ties.
pub fn max_parallel<C, T>(items: C) -> Result<Option<T>, PoolError>
where
  C: IntoSequence<Item = T>,
  T: Element + Ord,
{
  select(items, Ordering::Greater, "max_parallel")
}

/// The smallest element as ordered by `selector`: a comparator is applied to
/// element pairs, a key function is applied to every element in parallel and
/// the keys are compared.
pub fn min_parallel_by<C, T, K>(items: C, selector: Selector<T, K>) -> Result<Option<T>, PoolError>
where
  C: IntoSequence<Item = T>,
  T: Element,
  K: Ord + Send + 'static,
{
  select_by(items, selector, Ordering::Less, "min_parallel_by")
}

/// The largest element as ordered by `selector`. See [`min_parallel_by`].
pub fn max_parallel_by<C, T, K>(items: C, selector: Selector<T, K>) -> Result<Option<T>, PoolError>
where
  C: IntoSequence<Item = T>,
  T: Element,
  K: Ord + Send + 'static,
{
  select_by(items, selector, Ordering::Greater, "max_parallel_by")
}

/// Adds all elements up with [`Additive::plus`]. `None` for empty input; an
/// overflowing integer sum fails with [`PoolError::Overflow`].
pub fn sum_parallel<C, T>(items: C) -> Result<Option<T>, PoolError>
where
  C: IntoSequence<Item = T>,
  T: Element + Additive,
{
  FanOut::prepare(items, "sum_parallel")?.try_reduce(T::plus)
}

/// Reduces the elements pairwise with `combine`. `None` for empty input.
///
/// The grouping of the operands is unspecified, so `combine` should be
/// associative.
pub fn inject_parallel<C, T, F>(items: C, combine: F) -> Result<Option<T>, PoolError>
where
  C: IntoSequence<Item = T>,
  T: Element,
  F: Fn(T, T) -> T + Send + Sync + 'static,
{
  FanOut::prepare(items, "inject_parallel")?.reduce(combine)
}

/// Reduces the elements with `combine`, then combines the reduction with
/// `seed` as `combine(reduction, seed)`. Returns `seed` for empty input.
///
/// ```no_run
/// use scoped_parallel::{inject_parallel_with_seed, with_new_pool, Pool};
///
/// let joined = with_new_pool(Pool::builder(), |_| {
///   inject_parallel_with_seed(vec!["a".to_string(), "b".to_string()], "s".to_string(), |left: String, right: String| {
///     left + &right
///   })
/// });
/// assert_eq!(joined.and_then(|outcome| outcome).ok().as_deref(), Some("abs"));
/// ```
pub fn inject_parallel_with_seed<C, T, F>(items: C, seed: T, combine: F) -> Result<T, PoolError>
where
  C: IntoSequence<Item = T>,
  T: Element,
  F: Fn(T, T) -> T + Send + Sync + 'static,
{
  let fan_out = FanOut::prepare(items, "inject_parallel_with_seed")?;
  let combine = Arc::new(combine);
  let reducer = combine.clone();
  match fan_out.reduce(move |left, right| reducer(left, right))? {
    Some(reduction) => fan_out.finish(move || combine(reduction, seed)),
    None => Ok(seed),
  }
}

/// Same as [`inject_parallel`].
pub fn fold_parallel<C, T, F>(items: C, combine: F) -> Result<Option<T>, PoolError>
where
  C: IntoSequence<Item = T>,
  T: Element,
  F: Fn(T, T) -> T + Send + Sync + 'static,
{
  inject_parallel(items, combine)
}

/// Same as [`inject_parallel_with_seed`].
pub fn fold_parallel_with_seed<C, T, F>(items: C, seed: T, combine: F) -> Result<T, PoolError>
where
  C: IntoSequence<Item = T>,
  T: Element,
  F: Fn(T, T) -> T + Send + Sync + 'static,
{
  inject_parallel_with_seed(items, seed, combine)
}
