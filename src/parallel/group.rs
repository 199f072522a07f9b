use super::FanOut;
use crate::callback::{Callback, Element};
use crate::coerce::IntoSequence;
use crate::error::PoolError;

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use dashmap::DashMap;

/// Groups the elements by the key `classifier` computes for them.
///
/// Keys are compared by `Eq`/`Hash`. Each group lists its elements in input
/// order regardless of the order the classifier ran in.
pub fn group_by_parallel<C, T, K>(items: C, classifier: Callback<T, K>) -> Result<HashMap<K, Vec<T>>, PoolError>
where
  C: IntoSequence<Item = T>,
  T: Element,
  K: Eq + Hash + Clone + Send + Sync + 'static,
{
  classifier.require_element("group_by_parallel")?;
  let fan_out = FanOut::prepare(items, "group_by_parallel")?;

  let groups: Arc<DashMap<K, Vec<(usize, T)>>> = Arc::new(DashMap::new());
  let sink = groups.clone();
  fan_out.map_each(move |_, index, item| {
    let key = classifier.invoke(item)?;
    sink.entry(key).or_default().push((index, item.clone()));
    Ok(())
  })?;

  // Units of work drop their clone of the map before their handles complete.
  let groups = Arc::try_unwrap(groups).unwrap_or_else(|shared| {
    shared
      .iter()
      .map(|group| (group.key().clone(), group.value().clone()))
      .collect()
  });
  Ok(
    groups
      .into_iter()
      .map(|(key, mut members)| {
        members.sort_unstable_by_key(|(index, _)| *index);
        (key, members.into_iter().map(|(_, item)| item).collect())
      })
      .collect(),
  )
}
