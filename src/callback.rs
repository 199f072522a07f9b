//! Fixed-arity callbacks used by the parallel collection operations.
//!
//! A callback declares how many parameters it accepts. When the element being
//! processed is a key/value pair (a `(K, V)` tuple, which is what maps coerce
//! to) and the callback accepts two or more parameters, it receives the key
//! and the value separately. Otherwise it receives the whole element.

use crate::error::PoolError;

use std::cmp::Ordering;
use std::convert::Infallible;
use std::fmt;
use std::sync::Arc;

/// A value that can flow through the parallel collection operations.
///
/// `(K, V)` tuples are key/value pairs. Use [`impl_element!`](crate::impl_element)
/// to opt other types in as plain elements.
pub trait Element: Clone + Send + Sync + 'static {
  type Key: Send + Sync + 'static;
  type Value: Send + Sync + 'static;

  fn as_pair(&self) -> Option<(&Self::Key, &Self::Value)> {
    None
  }
}

impl<K, V> Element for (K, V)
where
  K: Clone + Send + Sync + 'static,
  V: Clone + Send + Sync + 'static,
{
  type Key = K;
  type Value = V;

  fn as_pair(&self) -> Option<(&K, &V)> {
    Some((&self.0, &self.1))
  }
}

/// Implements [`Element`] for types that are never key/value pairs.
#[macro_export]
macro_rules! impl_element {
  ($($element:ty),* $(,)?) => {
    $(
      impl $crate::Element for $element {
        type Key = ::std::convert::Infallible;
        type Value = ::std::convert::Infallible;
      }
    )*
  };
}

impl_element!(
  i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64, bool, char, String, &'static str, ()
);

impl<T: Element> Element for Vec<T> {
  type Key = Infallible;
  type Value = Infallible;
}

impl<T: Element> Element for Option<T> {
  type Key = Infallible;
  type Value = Infallible;
}

impl<T: Element> Element for Box<T> {
  type Key = Infallible;
  type Value = Infallible;
}

/// A unit of work taking zero, one, or (key, value) parameters.
pub enum Callback<T: Element, R> {
  Nullary(Arc<dyn Fn() -> R + Send + Sync>),
  Unary(Arc<dyn Fn(&T) -> R + Send + Sync>),
  Pair(Arc<dyn Fn(&T::Key, &T::Value) -> R + Send + Sync>),
}

impl<T: Element, R> Clone for Callback<T, R> {
  fn clone(&self) -> Self {
    match self {
      Callback::Nullary(callback) => Callback::Nullary(callback.clone()),
      Callback::Unary(callback) => Callback::Unary(callback.clone()),
      Callback::Pair(callback) => Callback::Pair(callback.clone()),
    }
  }
}

impl<T: Element, R> fmt::Debug for Callback<T, R> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Callback")
      .field("max_parameters", &self.max_parameters())
      .finish()
  }
}

impl<T: Element, R> Callback<T, R> {
  pub fn nullary(callback: impl Fn() -> R + Send + Sync + 'static) -> Self {
    Callback::Nullary(Arc::new(callback))
  }

  pub fn unary(callback: impl Fn(&T) -> R + Send + Sync + 'static) -> Self {
    Callback::Unary(Arc::new(callback))
  }

  pub fn pair(callback: impl Fn(&T::Key, &T::Value) -> R + Send + Sync + 'static) -> Self {
    Callback::Pair(Arc::new(callback))
  }

  pub fn max_parameters(&self) -> usize {
    match self {
      Callback::Nullary(_) => 0,
      Callback::Unary(_) => 1,
      Callback::Pair(_) => 2,
    }
  }

  /// Calls the callback for one element following the pair dispatch rule.
  pub fn invoke(&self, element: &T) -> Result<R, PoolError> {
    match self {
      Callback::Nullary(callback) => Ok(callback()),
      Callback::Unary(callback) => Ok(callback(element)),
      Callback::Pair(callback) => match element.as_pair() {
        Some((key, value)) => Ok(callback(key, value)),
        None => Err(PoolError::NotAPair),
      },
    }
  }

  /// Rejects zero-argument callbacks for operations that need the element.
  pub(crate) fn require_element(&self, operation: &'static str) -> Result<(), PoolError> {
    match self {
      Callback::Nullary(_) => Err(PoolError::UnsupportedArity {
        operation,
        max_parameters: 0,
      }),
      _ => Ok(()),
    }
  }
}

/// A callback additionally receiving the element's zero-based position.
pub enum IndexedCallback<T: Element> {
  Element(Arc<dyn Fn(&T, usize) + Send + Sync>),
  Pair(Arc<dyn Fn(&T::Key, &T::Value, usize) + Send + Sync>),
}

impl<T: Element> Clone for IndexedCallback<T> {
  fn clone(&self) -> Self {
    match self {
      IndexedCallback::Element(callback) => IndexedCallback::Element(callback.clone()),
      IndexedCallback::Pair(callback) => IndexedCallback::Pair(callback.clone()),
    }
  }
}

impl<T: Element> IndexedCallback<T> {
  pub fn element(callback: impl Fn(&T, usize) + Send + Sync + 'static) -> Self {
    IndexedCallback::Element(Arc::new(callback))
  }

  pub fn pair(callback: impl Fn(&T::Key, &T::Value, usize) + Send + Sync + 'static) -> Self {
    IndexedCallback::Pair(Arc::new(callback))
  }

  pub fn max_parameters(&self) -> usize {
    match self {
      IndexedCallback::Element(_) => 2,
      IndexedCallback::Pair(_) => 3,
    }
  }

  pub fn invoke(&self, element: &T, index: usize) -> Result<(), PoolError> {
    match self {
      IndexedCallback::Element(callback) => {
        callback(element, index);
        Ok(())
      }
      IndexedCallback::Pair(callback) => match element.as_pair() {
        Some((key, value)) => {
          callback(key, value, index);
          Ok(())
        }
        None => Err(PoolError::NotAPair),
      },
    }
  }
}

/// How `min`/`max` order elements: a two-parameter comparator used directly,
/// or a one-parameter key compared by its natural ordering.
pub enum Selector<T, K> {
  Comparator(Arc<dyn Fn(&T, &T) -> Ordering + Send + Sync>),
  Key(Arc<dyn Fn(&T) -> K + Send + Sync>),
}

impl<T, K> Clone for Selector<T, K> {
  fn clone(&self) -> Self {
    match self {
      Selector::Comparator(compare) => Selector::Comparator(compare.clone()),
      Selector::Key(key) => Selector::Key(key.clone()),
    }
  }
}

impl<T> Selector<T, ()> {
  pub fn comparator(compare: impl Fn(&T, &T) -> Ordering + Send + Sync + 'static) -> Self {
    Selector::Comparator(Arc::new(compare))
  }
}

impl<T, K: Ord> Selector<T, K> {
  pub fn key(key: impl Fn(&T) -> K + Send + Sync + 'static) -> Self {
    Selector::Key(Arc::new(key))
  }

  pub fn max_parameters(&self) -> usize {
    match self {
      Selector::Comparator(_) => 2,
      Selector::Key(_) => 1,
    }
  }
}
