//! Process-wide configuration: pool and timer factories plus the registry of
//! default pools and timers stopped together by [`shutdown`].
//!
//! Factories can be set once per [`ParallelConfig`]. The process-wide instance
//! is reached through [`global`] and the free functions of this module.

use crate::error::PoolError;
use crate::pool::{Pool, PoolBuilder, ShutdownMode};
use crate::timer::{GeneralTimer, TokioTimer};

use std::fmt;
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use tracing::{debug, info, trace};

/// Produces the pools handed out by [`ParallelConfig::retrieve_default_pool`].
pub trait PoolFactory: Send + Sync {
  fn create_pool(&self) -> Result<Pool, PoolError>;
}

impl<F> PoolFactory for F
where
  F: Fn() -> Result<Pool, PoolError> + Send + Sync,
{
  fn create_pool(&self) -> Result<Pool, PoolError> {
    self()
  }
}

/// Produces the timers handed out by [`ParallelConfig::retrieve_default_timer`].
pub trait TimerFactory: Send + Sync {
  fn create_timer(&self, name: &str, daemon: bool) -> Result<Arc<dyn GeneralTimer>, PoolError>;
}

impl<F> TimerFactory for F
where
  F: Fn(&str, bool) -> Result<Arc<dyn GeneralTimer>, PoolError> + Send + Sync,
{
  fn create_timer(&self, name: &str, daemon: bool) -> Result<Arc<dyn GeneralTimer>, PoolError> {
    self(name, daemon)
  }
}

pub struct ParallelConfig {
  pool_factory: OnceLock<Arc<dyn PoolFactory>>,
  timer_factory: OnceLock<Arc<dyn TimerFactory>>,
  timers: Mutex<Vec<Arc<dyn GeneralTimer>>>,
  default_pools: Mutex<Vec<Pool>>,
}

impl fmt::Debug for ParallelConfig {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ParallelConfig")
      .field("pool_factory_set", &self.pool_factory.get().is_some())
      .field("timer_factory_set", &self.timer_factory.get().is_some())
      .field("registered_timers", &self.registered_timer_count())
      .field("registered_pools", &self.registered_pool_count())
      .finish()
  }
}

impl Default for ParallelConfig {
  fn default() -> Self {
    Self::new()
  }
}

impl ParallelConfig {
  pub fn new() -> Self {
    Self {
      pool_factory: OnceLock::new(),
      timer_factory: OnceLock::new(),
      timers: Mutex::new(Vec::new()),
      default_pools: Mutex::new(Vec::new()),
    }
  }

  /// Installs the pool factory. Fails with [`PoolError::AlreadySet`] on every
  /// call after the first.
  pub fn set_pool_factory(&self, factory: impl PoolFactory + 'static) -> Result<(), PoolError> {
    self
      .pool_factory
      .set(Arc::new(factory))
      .map_err(|_| PoolError::AlreadySet("set_pool_factory"))?;
    info!("Pool factory configured.");
    Ok(())
  }

  /// Installs the timer factory. Fails with [`PoolError::AlreadySet`] on every
  /// call after the first.
  pub fn set_timer_factory(&self, factory: impl TimerFactory + 'static) -> Result<(), PoolError> {
    self
      .timer_factory
      .set(Arc::new(factory))
      .map_err(|_| PoolError::AlreadySet("set_timer_factory"))?;
    info!("Timer factory configured.");
    Ok(())
  }

  /// Returns a pool from the configured factory, or a default pool with one
  /// worker per logical CPU. The pool is registered for [`shutdown`](Self::shutdown).
  pub fn retrieve_default_pool(&self) -> Result<Pool, PoolError> {
    let pool = match self.pool_factory.get() {
      Some(factory) => factory.create_pool()?,
      None => PoolBuilder::new().build()?,
    };
    debug!(pool_name = %pool.name(), "Default pool retrieved.");
    self.default_pools.lock().push(pool.clone());
    Ok(pool)
  }

  /// Returns a timer from the configured factory, or a [`TokioTimer`]. The
  /// timer is registered for [`shutdown`](Self::shutdown).
  pub fn retrieve_default_timer(&self, name: &str, daemon: bool) -> Result<Arc<dyn GeneralTimer>, PoolError> {
    let timer: Arc<dyn GeneralTimer> = match self.timer_factory.get() {
      Some(factory) => factory.create_timer(name, daemon)?,
      None => Arc::new(TokioTimer::new(name, daemon)?),
    };
    debug!(timer_name = %name, daemon, "Default timer retrieved.");
    self.timers.lock().push(timer.clone());
    Ok(timer)
  }

  pub fn registered_timer_count(&self) -> usize {
    self.timers.lock().len()
  }

  pub fn registered_pool_count(&self) -> usize {
    self.default_pools.lock().len()
  }

  /// Stops every registered timer and default pool. Calling it again only
  /// affects what was registered since.
  pub fn shutdown(&self) {
    let timers: Vec<_> = self.timers.lock().drain(..).collect();
    let pools: Vec<_> = self.default_pools.lock().drain(..).collect();
    if timers.is_empty() && pools.is_empty() {
      trace!("Configuration shutdown: nothing registered.");
      return;
    }

    info!(timers = timers.len(), pools = pools.len(), "Shutting down registered timers and default pools.");
    for timer in timers {
      timer.shutdown();
    }
    for pool in pools {
      pool.shutdown(ShutdownMode::ForcefulCancel);
    }
  }
}

lazy_static::lazy_static! {
  static ref GLOBAL_CONFIG: ParallelConfig = ParallelConfig::new();
}

/// The process-wide configuration.
pub fn global() -> &'static ParallelConfig {
  &GLOBAL_CONFIG
}

pub fn set_pool_factory(factory: impl PoolFactory + 'static) -> Result<(), PoolError> {
  global().set_pool_factory(factory)
}

pub fn set_timer_factory(factory: impl TimerFactory + 'static) -> Result<(), PoolError> {
  global().set_timer_factory(factory)
}

pub fn retrieve_default_pool() -> Result<Pool, PoolError> {
  global().retrieve_default_pool()
}

pub fn retrieve_default_timer(name: &str, daemon: bool) -> Result<Arc<dyn GeneralTimer>, PoolError> {
  global().retrieve_default_timer(name, daemon)
}

/// Stops every timer and default pool registered with the process-wide configuration.
pub fn shutdown() {
  global().shutdown()
}
