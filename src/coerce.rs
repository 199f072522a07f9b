//! Normalizes the inputs of the parallel operations into sequences.
//!
//! Text becomes its characters as one-character strings, collections become
//! their elements, maps become their `(key, value)` entries, a single entry
//! becomes a one-element sequence, `()` and `None` become the empty sequence.
//! Iterators are drained through [`drain`].

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, LinkedList, VecDeque};

pub trait IntoSequence {
  type Item;

  fn into_sequence(self) -> Vec<Self::Item>;
}

impl IntoSequence for &str {
  type Item = String;

  fn into_sequence(self) -> Vec<String> {
    self.chars().map(String::from).collect()
  }
}

impl IntoSequence for String {
  type Item = String;

  fn into_sequence(self) -> Vec<String> {
    self.as_str().into_sequence()
  }
}

impl<T> IntoSequence for Vec<T> {
  type Item = T;

  fn into_sequence(self) -> Vec<T> {
    self
  }
}

impl<T: Clone> IntoSequence for &[T] {
  type Item = T;

  fn into_sequence(self) -> Vec<T> {
    self.to_vec()
  }
}

impl<T: Clone> IntoSequence for &Vec<T> {
  type Item = T;

  fn into_sequence(self) -> Vec<T> {
    self.clone()
  }
}

impl<T, const N: usize> IntoSequence for [T; N] {
  type Item = T;

  fn into_sequence(self) -> Vec<T> {
    Vec::from(self)
  }
}

macro_rules! impl_into_sequence_for_collection {
  ($($collection:ident),*) => {
    $(
      impl<T> IntoSequence for $collection<T> {
        type Item = T;

        fn into_sequence(self) -> Vec<T> {
          self.into_iter().collect()
        }
      }
    )*
  };
}

impl_into_sequence_for_collection!(VecDeque, LinkedList, HashSet, BTreeSet);

impl<K, V> IntoSequence for HashMap<K, V> {
  type Item = (K, V);

  fn into_sequence(self) -> Vec<(K, V)> {
    self.into_iter().collect()
  }
}

impl<K, V> IntoSequence for BTreeMap<K, V> {
  type Item = (K, V);

  fn into_sequence(self) -> Vec<(K, V)> {
    self.into_iter().collect()
  }
}

impl<K: Clone, V: Clone> IntoSequence for &HashMap<K, V> {
  type Item = (K, V);

  fn into_sequence(self) -> Vec<(K, V)> {
    self.iter().map(|(key, value)| (key.clone(), value.clone())).collect()
  }
}

impl<K: Clone, V: Clone> IntoSequence for &BTreeMap<K, V> {
  type Item = (K, V);

  fn into_sequence(self) -> Vec<(K, V)> {
    self.iter().map(|(key, value)| (key.clone(), value.clone())).collect()
  }
}

/// A single map entry.
impl<K, V> IntoSequence for (K, V) {
  type Item = (K, V);

  fn into_sequence(self) -> Vec<(K, V)> {
    vec![self]
  }
}

/// Nothing at all.
impl IntoSequence for () {
  type Item = ();

  fn into_sequence(self) -> Vec<()> {
    Vec::new()
  }
}

impl<C: IntoSequence> IntoSequence for Option<C> {
  type Item = C::Item;

  fn into_sequence(self) -> Vec<C::Item> {
    match self {
      Some(collection) => collection.into_sequence(),
      None => Vec::new(),
    }
  }
}

/// An iterator waiting to be drained into a sequence.
#[derive(Debug)]
pub struct Drained<I>(I);

/// Wraps an iterator (or anything iterable) so it can be passed to the
/// parallel operations.
pub fn drain<I: IntoIterator>(iterable: I) -> Drained<I::IntoIter> {
  Drained(iterable.into_iter())
}

impl<I: Iterator> IntoSequence for Drained<I> {
  type Item = I::Item;

  fn into_sequence(self) -> Vec<I::Item> {
    self.0.collect()
  }
}
