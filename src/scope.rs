//! Per-thread stack of "current" pools.
//!
//! Every thread owns its own stack, so pushing and popping never needs a lock.
//! [`PoolScope`] pairs each push with a pop on every exit path, including
//! unwinding out of a panicking block.

use crate::error::PoolError;
use crate::pool::{Pool, PoolBuilder, ShutdownMode};

use std::cell::RefCell;
use std::marker::PhantomData;

use tracing::{debug, trace};

thread_local! {
  static POOL_STACK: RefCell<Vec<Pool>> = const { RefCell::new(Vec::new()) };
}

/// Makes `pool` the current pool of the calling thread.
pub fn push(pool: Pool) {
  POOL_STACK.with(|stack| {
    let mut stack = stack.borrow_mut();
    trace!(pool_name = %pool.name(), depth = stack.len() + 1, "Pushing pool scope.");
    stack.push(pool);
  });
}

/// Removes the current pool of the calling thread, restoring the previous one.
pub fn pop() -> Option<Pool> {
  POOL_STACK
    .try_with(|stack| stack.borrow_mut().pop())
    .ok()
    .flatten()
}

/// The pool on top of the calling thread's stack.
pub fn current() -> Result<Pool, PoolError> {
  try_current().ok_or(PoolError::NoPoolAvailable)
}

pub fn try_current() -> Option<Pool> {
  POOL_STACK.with(|stack| stack.borrow().last().cloned())
}

pub fn is_empty() -> bool {
  depth() == 0
}

/// Number of pool scopes currently open on the calling thread.
pub fn depth() -> usize {
  POOL_STACK.with(|stack| stack.borrow().len())
}

/// Guard for one level of the calling thread's pool stack.
///
/// Not `Send`: it must be dropped on the thread that entered it.
#[must_use = "the pool is only current while the scope guard is alive"]
pub struct PoolScope {
  depth: usize,
  _not_send: PhantomData<*const ()>,
}

impl PoolScope {
  pub fn enter(pool: Pool) -> Self {
    push(pool);
    Self {
      depth: depth(),
      _not_send: PhantomData,
    }
  }
}

impl Drop for PoolScope {
  fn drop(&mut self) {
    // Truncating also discards pushes the block forgot to pop.
    let _ = POOL_STACK.try_with(|stack| stack.borrow_mut().truncate(self.depth - 1));
  }
}

/// Runs `body` with `pool` as the calling thread's current pool.
pub fn with_pool<F, T>(pool: &Pool, body: F) -> T
where
  F: FnOnce() -> T,
{
  let _scope = PoolScope::enter(pool.clone());
  body()
}

/// Builds a pool, runs `body` with it as the current pool, then shuts it down
/// gracefully.
pub fn with_new_pool<F, T>(builder: PoolBuilder, body: F) -> Result<T, PoolError>
where
  F: FnOnce(&Pool) -> T,
{
  let pool = builder.build()?;
  let result = with_pool(&pool, || body(&pool));
  debug!(pool_name = %pool.name(), "Leaving pool scope, shutting pool down.");
  pool.shutdown(ShutdownMode::Graceful);
  Ok(result)
}
