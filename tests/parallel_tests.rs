use rand::Rng;
use scoped_parallel::{
  any_parallel, collect_many_parallel, collect_parallel, count_parallel, count_parallel_by, drain, each_parallel,
  each_with_index_parallel, every_parallel, find_all_parallel, find_any_parallel, find_parallel, fold_parallel,
  fold_parallel_with_seed, grep_parallel, group_by_parallel, inject_parallel, inject_parallel_with_seed, max_parallel,
  max_parallel_by, min_parallel, min_parallel_by, split_parallel, sum_parallel, with_new_pool, Callback,
  IndexedCallback, Pool, PoolError, Selector,
};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn setup_tracing_for_test() {
  use std::sync::Once;
  use tracing_subscriber::{fmt, EnvFilter};
  static TRACING_INIT: Once = Once::new();

  TRACING_INIT.call_once(|| {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,scoped_parallel=debug"));

    fmt::Subscriber::builder()
      .with_env_filter(filter)
      .with_test_writer()
      .try_init()
      .ok();
  });
}

// Runs `body` with a fresh four-worker pool as the current pool.
fn in_pool<T>(pool_name: &str, body: impl FnOnce() -> T) -> T {
  setup_tracing_for_test();
  with_new_pool(Pool::builder().name(pool_name).parallelism(4), |_| body()).unwrap()
}

fn panic_messages(error: PoolError) -> Vec<String> {
  match error {
    PoolError::Composite(composite) => composite.into_failures().into_iter().flat_map(panic_messages).collect(),
    PoolError::TaskPanicked { message, .. } => vec![message],
    other => panic!("Expected panics only, got {:?}", other),
  }
}

#[test]
fn test_operations_need_a_current_pool() {
  setup_tracing_for_test();
  let result = collect_parallel(vec![1, 2, 3], Callback::unary(|x: &i32| x * 10));
  assert_eq!(result, Err(PoolError::NoPoolAvailable));
}

#[test]
fn test_collect_maps_every_element_in_input_order() {
  let collected = in_pool("test_collect", || collect_parallel(vec![1, 2, 3, 4, 5], Callback::unary(|x: &i32| x * 10)));
  let collected = collected.unwrap();
  assert_eq!(
    collected.iter().copied().collect::<HashSet<i32>>(),
    HashSet::from([10, 20, 30, 40, 50])
  );
  assert_eq!(collected, vec![10, 20, 30, 40, 50]);
}

#[test]
fn test_collect_matches_sequential_mapping_for_random_input() {
  let mut rng = rand::rng();
  let input: Vec<i64> = (0..200).map(|_| rng.random_range(-1000..1000)).collect();
  let expected: Vec<i64> = input.iter().map(|x| x * x - 3).collect();

  let collected = in_pool("test_collect_random", || {
    collect_parallel(input.clone(), Callback::unary(|x: &i64| x * x - 3))
  });
  assert_eq!(collected, Ok(expected));
}

#[test]
fn test_collect_rejects_zero_argument_callbacks() {
  let result = in_pool("test_collect_nullary", || collect_parallel(vec![1, 2], Callback::<i32, i32>::nullary(|| 0)));
  assert_eq!(
    result,
    Err(PoolError::UnsupportedArity {
      operation: "collect_parallel",
      max_parameters: 0
    })
  );
}

#[test]
fn test_collect_many_flattens_in_input_order() {
  let flattened = in_pool("test_collect_many", || {
    collect_many_parallel(vec![1, 2, 3], Callback::unary(|x: &i32| vec![*x; *x as usize]))
  });
  assert_eq!(flattened, Ok(vec![1, 2, 2, 3, 3, 3]));
}

#[test]
fn test_map_entries_reach_pair_callbacks_as_key_and_value() {
  let scores = BTreeMap::from([("ada".to_string(), 3), ("bob".to_string(), 5)]);

  let (described, doubled) = in_pool("test_collect_pairs", || {
    let described = collect_parallel(
      &scores,
      Callback::pair(|name: &String, score: &i32| format!("{}:{}", name, score)),
    );
    let doubled = collect_parallel(&scores, Callback::unary(|entry: &(String, i32)| entry.1 * 2));
    (described, doubled)
  });
  assert_eq!(described, Ok(vec!["ada:3".to_string(), "bob:5".to_string()]));
  assert_eq!(doubled, Ok(vec![6, 10]));
}

#[test]
fn test_pair_callback_on_plain_elements_fails() {
  let result = in_pool("test_pair_on_plain", || {
    collect_parallel(
      vec![1],
      Callback::<i32, i32>::Pair(Arc::new(|never: &std::convert::Infallible, _: &std::convert::Infallible| -> i32 {
        match *never {}
      })),
    )
  });
  assert_eq!(result, Err(PoolError::NotAPair));
}

#[test]
fn test_text_is_processed_character_by_character() {
  let upper = in_pool("test_collect_text", || collect_parallel("abc", Callback::unary(|c: &String| c.to_uppercase())));
  assert_eq!(upper, Ok(vec!["A".to_string(), "B".to_string(), "C".to_string()]));
}

#[test]
fn test_each_runs_callback_once_per_element_and_returns_input() {
  let calls = Arc::new(AtomicUsize::new(0));
  let counter = calls.clone();
  let returned = in_pool("test_each", || {
    each_parallel(
      drain((1..=6).map(|x| x * 2)),
      Callback::unary(move |_: &i32| counter.fetch_add(1, Ordering::SeqCst)),
    )
  });
  assert_eq!(returned, Ok(vec![2, 4, 6, 8, 10, 12]));
  assert_eq!(calls.load(Ordering::SeqCst), 6);

  let ticks = Arc::new(AtomicUsize::new(0));
  let ticker = ticks.clone();
  let returned = in_pool("test_each_nullary", || {
    each_parallel(vec!['x', 'y'], Callback::nullary(move || ticker.fetch_add(1, Ordering::SeqCst)))
  });
  assert_eq!(returned, Ok(vec!['x', 'y']));
  assert_eq!(ticks.load(Ordering::SeqCst), 2);
}

#[test]
fn test_each_with_index_passes_original_positions() {
  let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
  let sink = seen.clone();
  let returned = in_pool("test_each_with_index", || {
    each_with_index_parallel(
      "abcd",
      IndexedCallback::element(move |letter: &String, index| sink.lock().push((index, letter.clone()))),
    )
  });
  assert_eq!(returned.map(|letters| letters.concat()), Ok("abcd".to_string()));

  let mut seen = seen.lock().clone();
  seen.sort();
  let expected: Vec<(usize, String)> = "abcd".chars().enumerate().map(|(index, c)| (index, c.to_string())).collect();
  assert_eq!(seen, expected);
}

#[test]
fn test_each_with_index_over_map_entries() {
  let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
  let sink = seen.clone();
  let entries = BTreeMap::from([('a', 1u8), ('b', 2u8)]);
  in_pool("test_each_with_index_pairs", || {
    each_with_index_parallel(
      entries,
      IndexedCallback::pair(move |key: &char, value: &u8, index| sink.lock().push((*key, *value, index))),
    )
  })
  .unwrap();
  let mut seen = seen.lock().clone();
  seen.sort();
  assert_eq!(seen, vec![('a', 1, 0), ('b', 2, 1)]);
}

#[test]
fn test_find_all_keeps_truthy_matches_in_order() {
  let found = in_pool("test_find_all", || {
    find_all_parallel(
      vec![4, 1, 7, 2, 9],
      Callback::unary(|x: &i32| if *x > 3 { Some(*x) } else { None }),
    )
  });
  assert_eq!(found, Ok(vec![4, 7, 9]));
}

#[test]
fn test_find_returns_lowest_index_match_regardless_of_timing() {
  let found = in_pool("test_find_lowest", || {
    find_parallel(
      vec![1, 8, 3, 9, 10],
      Callback::unary(|x: &i32| {
        if *x == 8 {
          // The lowest match finishes last.
          thread::sleep(Duration::from_millis(60));
        }
        *x > 7
      }),
    )
  });
  assert_eq!(found, Ok(Some(8)));
}

#[test]
fn test_find_and_find_all_agree_on_random_input() {
  let mut rng = rand::rng();
  for round in 0..10 {
    let input: Vec<u32> = (0..50).map(|_| rng.random_range(0..500)).collect();
    let threshold = rng.random_range(400..520);

    let (first, all) = in_pool(&format!("test_find_agreement_{}", round), || {
      let predicate = Callback::unary(move |x: &u32| *x >= threshold);
      (
        find_parallel(input.clone(), predicate.clone()).unwrap(),
        find_all_parallel(input.clone(), predicate).unwrap(),
      )
    });

    assert_eq!(first, all.first().copied());
    assert_eq!(first, input.iter().copied().find(|x| *x >= threshold));
  }
}

#[test]
fn test_find_reports_failures_before_the_match_only() {
  let failed = in_pool("test_find_failure_before_match", || {
    find_parallel(
      vec![0, 5, 9],
      Callback::unary(|x: &i32| {
        if *x == 0 {
          panic!("cannot inspect zero");
        }
        *x > 4
      }),
    )
  });
  assert_eq!(panic_messages(failed.unwrap_err()), vec!["cannot inspect zero".to_string()]);

  let found = in_pool("test_find_failure_after_match", || {
    find_parallel(
      vec![5, 0, 0],
      Callback::unary(|x: &i32| {
        if *x == 0 {
          panic!("cannot inspect zero");
        }
        *x > 4
      }),
    )
  });
  assert_eq!(found, Ok(Some(5)));
}

#[test]
fn test_find_any_any_and_every() {
  in_pool("test_search_races", || {
    let found = find_any_parallel(vec![3, 12, 5, 14], Callback::unary(|x: &i32| *x > 10)).unwrap();
    assert!(matches!(found, Some(12) | Some(14)), "unexpected match {:?}", found);
    assert_eq!(find_any_parallel(vec![1, 2], Callback::unary(|x: &i32| *x > 10)), Ok(None));

    assert_eq!(any_parallel(drain(0..200), Callback::unary(|x: &i32| *x == 137)), Ok(true));
    assert_eq!(any_parallel(vec![1, 3, 5], Callback::unary(|x: &i32| x % 2 == 0)), Ok(false));
    assert_eq!(any_parallel(Vec::<i32>::new(), Callback::unary(|_: &i32| true)), Ok(false));

    assert_eq!(every_parallel(vec![2, 4, 6], Callback::unary(|x: &i32| x % 2 == 0)), Ok(true));
    assert_eq!(every_parallel(vec![2, 3, 6], Callback::unary(|x: &i32| x % 2 == 0)), Ok(false));
    assert_eq!(every_parallel(Vec::<i32>::new(), Callback::unary(|_: &i32| false)), Ok(true));
  });
}

#[test]
fn test_any_reports_failures_when_nothing_matches() {
  let result = in_pool("test_any_failure", || {
    any_parallel(
      vec![1, 2],
      Callback::unary(|x: &i32| {
        if *x == 2 {
          panic!("two is unreadable");
        }
        false
      }),
    )
  });
  assert_eq!(panic_messages(result.unwrap_err()), vec!["two is unreadable".to_string()]);
}

// Element 0 fails at once; element 1 reaches its verdict only later.
fn fails_first_then_decides(verdict: bool) -> Callback<i32, bool> {
  Callback::unary(move |x: &i32| {
    if *x == 0 {
      panic!("zero is unreadable");
    }
    thread::sleep(Duration::from_millis(100));
    verdict
  })
}

#[test]
fn test_any_reports_failures_seen_before_the_match() {
  let result = in_pool("test_any_failure_before_match", || any_parallel(vec![0, 1], fails_first_then_decides(true)));
  assert_eq!(panic_messages(result.unwrap_err()), vec!["zero is unreadable".to_string()]);
}

#[test]
fn test_every_reports_failures_seen_before_the_counterexample() {
  let result = in_pool("test_every_failure_before_counterexample", || {
    every_parallel(vec![0, 1], fails_first_then_decides(false))
  });
  assert_eq!(panic_messages(result.unwrap_err()), vec!["zero is unreadable".to_string()]);
}

#[test]
fn test_find_any_reports_failures_seen_before_the_match() {
  let result = in_pool("test_find_any_failure_before_match", || {
    find_any_parallel(vec![0, 1], fails_first_then_decides(true))
  });
  match result {
    Err(PoolError::TaskPanicked { message, trace, .. }) => {
      assert_eq!(message, "zero is unreadable");
      assert!(trace.is_some());
    }
    other => panic!("Expected the failure of element 0, got {:?}", other),
  }
}

#[test]
fn test_split_is_lossless_and_complete() {
  let mut rng = rand::rng();
  let input: Vec<i32> = (0..100).map(|_| rng.random_range(-50..50)).collect();

  let (negative, rest) = in_pool("test_split", || split_parallel(input.clone(), Callback::unary(|x: &i32| *x < 0))).unwrap();

  assert!(negative.iter().all(|x| *x < 0));
  assert!(rest.iter().all(|x| *x >= 0));
  assert_eq!(negative.len() + rest.len(), input.len());
  let mut rejoined: Vec<i32> = negative.iter().chain(rest.iter()).copied().collect();
  let mut expected = input.clone();
  rejoined.sort();
  expected.sort();
  assert_eq!(rejoined, expected);
  assert_eq!(negative, input.iter().copied().filter(|x| *x < 0).collect::<Vec<_>>());
}

#[test]
fn test_grep_accepts_ranges_collections_and_callbacks() {
  in_pool("test_grep", || {
    assert_eq!(grep_parallel(vec![9, 13, 17, 21], 13..20), Ok(vec![13, 17]));
    assert_eq!(grep_parallel(vec![9, 13, 17, 21], 13..=21), Ok(vec![13, 17, 21]));
    assert_eq!(
      grep_parallel(vec!["a", "b", "c"], BTreeSet::from(["c", "a"])),
      Ok(vec!["a", "c"])
    );
    assert_eq!(grep_parallel(vec![1, 2, 3, 4], vec![4, 2]), Ok(vec![2, 4]));
    assert_eq!(grep_parallel(vec![1, 2, 3, 4], Callback::unary(|x: &i32| x % 2)), Ok(vec![1, 3]));
  });
}

#[test]
fn test_count_by_value_and_by_predicate() {
  in_pool("test_count", || {
    assert_eq!(count_parallel(vec![1, 2, 1, 3, 1], &1), Ok(3));
    assert_eq!(count_parallel("banana", &"a".to_string()), Ok(3));
    assert_eq!(count_parallel_by(vec![1, 2, 3, 4, 5], Callback::unary(|x: &i32| *x > 2)), Ok(3));
    assert_eq!(count_parallel(Vec::<i32>::new(), &0), Ok(0));
  });
}

#[test]
fn test_group_by_partitions_by_key_equality() {
  let mut rng = rand::rng();
  let input: Vec<u32> = (0..120).map(|_| rng.random_range(0..1000)).collect();

  let groups = in_pool("test_group_by", || group_by_parallel(input.clone(), Callback::unary(|x: &u32| x % 7))).unwrap();

  let mut expected: HashMap<u32, Vec<u32>> = HashMap::new();
  for x in &input {
    expected.entry(x % 7).or_default().push(*x);
  }
  assert_eq!(groups, expected);
}

#[test]
fn test_group_by_over_map_entries() {
  let ages = HashMap::from([("ann", 31), ("bea", 17), ("cid", 45), ("dan", 12)]);
  let groups = in_pool("test_group_by_pairs", || {
    group_by_parallel(ages, Callback::pair(|_: &&str, age: &i32| *age >= 18))
  })
  .unwrap();

  let adults: BTreeSet<&str> = groups[&true].iter().map(|(name, _)| *name).collect();
  let minors: BTreeSet<&str> = groups[&false].iter().map(|(name, _)| *name).collect();
  assert_eq!(adults, BTreeSet::from(["ann", "cid"]));
  assert_eq!(minors, BTreeSet::from(["bea", "dan"]));
}

#[test]
fn test_min_and_max_by_natural_order() {
  in_pool("test_min_max", || {
    let mut rng = rand::rng();
    let input: Vec<i32> = (0..300).map(|_| rng.random_range(-10_000..10_000)).collect();
    assert_eq!(min_parallel(input.clone()), Ok(input.iter().min().copied()));
    assert_eq!(max_parallel(input.clone()), Ok(input.iter().max().copied()));
    assert_eq!(min_parallel(Vec::<i32>::new()), Ok(None));
  });
}

#[test]
fn test_min_and_max_by_selector_resolve_ties_to_first() {
  in_pool("test_min_max_by", || {
    let words: Vec<String> = ["bb", "a", "cc", "d"].iter().map(|word| word.to_string()).collect();
    assert_eq!(
      min_parallel_by(words.clone(), Selector::key(|word: &String| word.len())),
      Ok(Some("a".to_string()))
    );
    assert_eq!(
      max_parallel_by(words.clone(), Selector::key(|word: &String| word.len())),
      Ok(Some("bb".to_string()))
    );

    let ranked = vec![(1, 'a'), (3, 'b'), (3, 'c'), (0, 'd'), (0, 'e')];
    let by_rank = Selector::comparator(|left: &(i32, char), right: &(i32, char)| left.0.cmp(&right.0));
    assert_eq!(max_parallel_by(ranked.clone(), by_rank.clone()), Ok(Some((3, 'b'))));
    assert_eq!(min_parallel_by(ranked, by_rank), Ok(Some((0, 'd'))));
  });
}

#[test]
fn test_sum_of_empty_single_and_many() {
  in_pool("test_sum", || {
    assert_eq!(sum_parallel(Vec::<i64>::new()), Ok(None));
    assert_eq!(sum_parallel(vec![7i64]), Ok(Some(7)));
    assert_eq!(sum_parallel(drain(1..=100i64)), Ok(Some(5050)));
    // Concatenation is associative but not commutative: operand order survives.
    let letters: Vec<String> = "abcdefghij".chars().map(String::from).collect();
    assert_eq!(sum_parallel(letters), Ok(Some("abcdefghij".to_string())));
  });
}

#[test]
fn test_sum_reports_integer_overflow() {
  in_pool("test_sum_overflow", || {
    assert_eq!(sum_parallel(vec![100i8, 20, 7]), Ok(Some(127)));
    // Each chunk fits on its own; only combining the partials overflows.
    assert_eq!(sum_parallel(vec![100u8; 8]), Err(PoolError::Overflow("u8")));
    assert_eq!(sum_parallel(vec![i64::MAX, 1]), Err(PoolError::Overflow("i64")));
  });
}

#[test]
fn test_inject_and_fold() {
  in_pool("test_inject", || {
    assert_eq!(inject_parallel(vec![1, 2, 3, 4, 5], |a: i32, b: i32| a + b), Ok(Some(15)));
    assert_eq!(inject_parallel_with_seed(vec![1, 2, 3, 4, 5], 0, |a: i32, b: i32| a + b), Ok(15));
    assert_eq!(fold_parallel(Vec::<i32>::new(), |a: i32, b: i32| a + b), Ok(None));
    assert_eq!(fold_parallel_with_seed(vec![2, 3], 10, |a: i32, b: i32| a * b), Ok(60));
  });
}

#[test]
fn test_inject_with_seed_applies_the_seed_last() {
  in_pool("test_inject_seed_last", || {
    let concat = |left: String, right: String| left + &right;
    assert_eq!(
      inject_parallel_with_seed(vec!["a".to_string(), "b".to_string()], "s".to_string(), concat),
      Ok("abs".to_string())
    );
    assert_eq!(
      inject_parallel_with_seed(Vec::<String>::new(), "seed".to_string(), concat),
      Ok("seed".to_string())
    );
  });
}

#[test]
fn test_concurrent_failures_are_aggregated_in_submission_order() {
  let result = in_pool("test_composite", || {
    collect_parallel(
      vec![0, 1, 2],
      Callback::unary(|x: &i32| {
        match *x {
          0 => {
            // Fails after the third element has already failed.
            thread::sleep(Duration::from_millis(80));
            panic!("first element failed")
          }
          2 => panic!("third element failed"),
          other => other,
        }
      }),
    )
  });

  match result {
    Err(PoolError::Composite(composite)) => {
      assert_eq!(composite.len(), 2);
      let messages = panic_messages(PoolError::Composite(composite));
      assert_eq!(messages, vec!["first element failed".to_string(), "third element failed".to_string()]);
    }
    other => panic!("Expected a composite failure, got {:?}", other),
  }
}

#[test]
fn test_parallel_operations_nest_inside_callbacks() {
  setup_tracing_for_test();
  let totals = with_new_pool(Pool::builder().name("test_nesting").parallelism(2), |_| {
    collect_parallel(
      vec![1, 2, 3],
      Callback::unary(|x: &i32| {
        let row: Vec<i32> = (1..=*x).collect();
        let squares = collect_parallel(row, Callback::unary(|y: &i32| y * y)).unwrap();
        squares.into_iter().sum::<i32>()
      }),
    )
  })
  .unwrap();
  assert_eq!(totals, Ok(vec![1, 5, 14]));
}
