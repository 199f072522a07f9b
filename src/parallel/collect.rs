use super::FanOut;
use crate::callback::{Callback, Element};
use crate::coerce::IntoSequence;
use crate::error::PoolError;

/// Maps every element through `callback`. Results keep the input order.
pub fn collect_parallel<C, T, R>(items: C, callback: Callback<T, R>) -> Result<Vec<R>, PoolError>
where
  C: IntoSequence<Item = T>,
  T: Element,
  R: Send + 'static,
{
  callback.require_element("collect_parallel")?;
  let fan_out = FanOut::prepare(items, "collect_parallel")?;
  fan_out.map_each(move |_, _, item| callback.invoke(item))
}

/// Maps every element to a sequence and concatenates the sequences in input
/// order.
pub fn collect_many_parallel<C, T, S>(items: C, projection: Callback<T, S>) -> Result<Vec<S::Item>, PoolError>
where
  C: IntoSequence<Item = T>,
  T: Element,
  S: IntoSequence + 'static,
  S::Item: Send + 'static,
{
  projection.require_element("collect_many_parallel")?;
  let fan_out = FanOut::prepare(items, "collect_many_parallel")?;
  let projected = fan_out.map_each(move |_, _, item| projection.invoke(item).map(IntoSequence::into_sequence))?;
  Ok(projected.into_iter().flatten().collect())
}
