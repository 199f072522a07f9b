use super::FanOut;
use crate::callback::{Callback, Element, IndexedCallback};
use crate::coerce::IntoSequence;
use crate::error::PoolError;

/// Invokes `callback` once per element and returns the elements unchanged.
///
/// Invocation order is unspecified. Any state the callback shares between
/// elements must be protected by the caller. Zero-argument callbacks are
/// accepted here since only their side effects matter.
pub fn each_parallel<C, T, R>(items: C, callback: Callback<T, R>) -> Result<Vec<T>, PoolError>
where
  C: IntoSequence<Item = T>,
  T: Element,
  R: 'static,
{
  let fan_out = FanOut::prepare(items, "each_parallel")?;
  fan_out.map_each(move |_, _, item| callback.invoke(item).map(drop))?;
  Ok(fan_out.into_items())
}

/// Like [`each_parallel`], additionally passing each element's zero-based
/// position in the original sequence.
pub fn each_with_index_parallel<C, T>(items: C, callback: IndexedCallback<T>) -> Result<Vec<T>, PoolError>
where
  C: IntoSequence<Item = T>,
  T: Element,
{
  let fan_out = FanOut::prepare(items, "each_with_index_parallel")?;
  fan_out.map_each(move |_, index, item| callback.invoke(item, index))?;
  Ok(fan_out.into_items())
}
