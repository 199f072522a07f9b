use crate::callback::{Callback, Element};
use crate::error::PoolError;

use std::collections::{BTreeSet, HashSet};
use std::hash::Hash;
use std::ops::{Range, RangeInclusive};

/// "True-ish" interpretation of predicate results: zero, empty and absent
/// values are false, everything else is true.
pub trait Truthy {
  fn is_truthy(&self) -> bool;
}

impl Truthy for bool {
  fn is_truthy(&self) -> bool {
    *self
  }
}

macro_rules! impl_truthy_for_numbers {
  ($($number:ty),*) => {
    $(
      impl Truthy for $number {
        fn is_truthy(&self) -> bool {
          *self != (0 as $number)
        }
      }
    )*
  };
}

impl_truthy_for_numbers!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64);

impl Truthy for char {
  fn is_truthy(&self) -> bool {
    *self != '\0'
  }
}

impl Truthy for String {
  fn is_truthy(&self) -> bool {
    !self.is_empty()
  }
}

impl Truthy for &str {
  fn is_truthy(&self) -> bool {
    !self.is_empty()
  }
}

impl<T> Truthy for Vec<T> {
  fn is_truthy(&self) -> bool {
    !self.is_empty()
  }
}

impl<T: Truthy> Truthy for Option<T> {
  fn is_truthy(&self) -> bool {
    self.as_ref().is_some_and(Truthy::is_truthy)
  }
}

/// The additive combinator used by `sum_parallel`. Integer addition fails
/// with [`PoolError::Overflow`] instead of wrapping.
pub trait Additive: Sized {
  fn plus(self, other: Self) -> Result<Self, PoolError>;
}

macro_rules! impl_additive_for_integers {
  ($($number:ty),*) => {
    $(
      impl Additive for $number {
        fn plus(self, other: Self) -> Result<Self, PoolError> {
          self.checked_add(other).ok_or(PoolError::Overflow(stringify!($number)))
        }
      }
    )*
  };
}

impl_additive_for_integers!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize);

impl Additive for f32 {
  fn plus(self, other: Self) -> Result<Self, PoolError> {
    Ok(self + other)
  }
}

impl Additive for f64 {
  fn plus(self, other: Self) -> Result<Self, PoolError> {
    Ok(self + other)
  }
}

impl Additive for String {
  fn plus(mut self, other: Self) -> Result<Self, PoolError> {
    self.push_str(&other);
    Ok(self)
  }
}

impl<T> Additive for Vec<T> {
  fn plus(mut self, mut other: Self) -> Result<Self, PoolError> {
    self.append(&mut other);
    Ok(self)
  }
}

/// A filter for `grep_parallel`: reference collections match by containment,
/// ranges by inclusion, callbacks by the truthiness of their result.
pub trait Grep<T> {
  fn is_case(&self, candidate: &T) -> Result<bool, PoolError>;
}

impl<T: PartialEq> Grep<T> for Vec<T> {
  fn is_case(&self, candidate: &T) -> Result<bool, PoolError> {
    Ok(self.contains(candidate))
  }
}

impl<T: PartialEq, const N: usize> Grep<T> for [T; N] {
  fn is_case(&self, candidate: &T) -> Result<bool, PoolError> {
    Ok(self.contains(candidate))
  }
}

impl<T: Eq + Hash> Grep<T> for HashSet<T> {
  fn is_case(&self, candidate: &T) -> Result<bool, PoolError> {
    Ok(self.contains(candidate))
  }
}

impl<T: Ord> Grep<T> for BTreeSet<T> {
  fn is_case(&self, candidate: &T) -> Result<bool, PoolError> {
    Ok(self.contains(candidate))
  }
}

impl<T: PartialOrd> Grep<T> for Range<T> {
  fn is_case(&self, candidate: &T) -> Result<bool, PoolError> {
    Ok(self.contains(candidate))
  }
}

impl<T: PartialOrd> Grep<T> for RangeInclusive<T> {
  fn is_case(&self, candidate: &T) -> Result<bool, PoolError> {
    Ok(self.contains(candidate))
  }
}

impl<T: Element, P: Truthy> Grep<T> for Callback<T, P> {
  fn is_case(&self, candidate: &T) -> Result<bool, PoolError> {
    self.invoke(candidate).map(|result| result.is_truthy())
  }
}
