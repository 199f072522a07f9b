//! Scoped parallel processing on a work-stealing pool.
//!
//! A [`Pool`] is made current for a block of code with [`with_pool`],
//! [`with_new_pool`] or a [`PoolScope`] guard. While it is current, units of
//! work can be submitted with [`submit`] and the parallel collection operations
//! (`collect_parallel`, `find_parallel`, `group_by_parallel`, ...) fan out one
//! unit of work per element and block until the result is known. Work running
//! on a pool sees that pool as current too, so parallel operations nest.
//!
//! ```no_run
//! use scoped_parallel::{collect_parallel, with_new_pool, Callback, Pool};
//!
//! let squares = with_new_pool(Pool::builder().parallelism(4), |_| {
//!   collect_parallel(vec![1, 2, 3], Callback::unary(|n: &i32| n * n))
//! });
//! assert_eq!(squares.and_then(|outcome| outcome).ok(), Some(vec![1, 4, 9]));
//! ```

mod aggregate;
mod callback;
pub mod coerce;
pub mod config;
mod error;
mod handle;
mod parallel;
mod pool;
pub mod scope;
mod submit;
mod task;
mod timer;
mod value;

pub use aggregate::{combine_failures, join_all};
pub use callback::{Callback, Element, IndexedCallback, Selector};
pub use coerce::{drain, IntoSequence};
pub use config::{ParallelConfig, PoolFactory, TimerFactory};
pub use error::{CompositeFailure, PoolError};
pub use handle::TaskHandle;
pub use parallel::{
  any_parallel, collect_many_parallel, collect_parallel, count_parallel, count_parallel_by, each_parallel,
  each_with_index_parallel, every_parallel, find_all_parallel, find_any_parallel, find_parallel, fold_parallel,
  fold_parallel_with_seed, grep_parallel, group_by_parallel, inject_parallel, inject_parallel_with_seed, max_parallel,
  max_parallel_by, min_parallel, min_parallel_by, split_parallel, sum_parallel,
};
pub use pool::{Pool, PoolBuilder, PoolState, ShutdownMode};
pub use scope::{with_new_pool, with_pool, PoolScope};
pub use submit::{asynchronous, call_async, submit, submit_with_timeout, TimeoutCanceller};
pub use task::{TaskContext, TaskStatus};
pub use timer::{GeneralTimer, TimerAction, TokioTimer};
pub use value::{Additive, Grep, Truthy};
