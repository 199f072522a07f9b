use crate::error::PoolError;
use crate::handle::TaskHandle;
use crate::scope::PoolScope;
use crate::task::{self, Cancellable, TaskCell, TaskContext, TracedSection};

use std::cell::Cell;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering as AtomicOrdering};
use std::sync::Arc;

use dashmap::DashMap;
use futures::FutureExt;
use parking_lot::{Condvar, Mutex};
use tokio::runtime::{Builder as RuntimeBuilder, Handle as TokioHandle, Runtime};
use tracing::{self, debug, error, info, info_span, trace, warn, Instrument};

lazy_static::lazy_static! {
  static ref NEXT_POOL_ID_COUNTER: AtomicU64 = AtomicU64::new(0);
  static ref NEXT_POOL_TASK_ID_COUNTER: AtomicU64 = AtomicU64::new(0);
}

thread_local! {
  static WORKER_OF_POOL: Cell<Option<u64>> = const { Cell::new(None) };
}

const DEFAULT_POOL_NAME: &str = "scoped-parallel-pool";
const DEFAULT_MAX_BLOCKING_THREADS: usize = 512;

/// Defines how the pool should behave upon shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownMode {
  /// Waits for submitted tasks to complete.
  Graceful,
  /// Cancels all submitted tasks that have not finished yet.
  ForcefulCancel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolState {
  Active,
  ShuttingDown,
  ShutDown,
}

impl PoolState {
  fn from_u8(raw: u8) -> Self {
    match raw {
      0 => PoolState::Active,
      1 => PoolState::ShuttingDown,
      _ => PoolState::ShutDown,
    }
  }
}

/// Builder for [`Pool`].
#[derive(Debug, Clone)]
pub struct PoolBuilder {
  name: String,
  parallelism: usize,
  max_blocking_threads: usize,
}

impl Default for PoolBuilder {
  fn default() -> Self {
    Self {
      name: DEFAULT_POOL_NAME.to_string(),
      parallelism: num_cpus::get().max(1),
      max_blocking_threads: DEFAULT_MAX_BLOCKING_THREADS,
    }
  }
}

impl PoolBuilder {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn name(mut self, name: impl Into<String>) -> Self {
    self.name = name.into();
    self
  }

  /// Number of worker threads. Values below one are raised to one.
  pub fn parallelism(mut self, parallelism: usize) -> Self {
    self.parallelism = parallelism.max(1);
    self
  }

  /// Upper bound on the extra threads started while workers block in `join`.
  pub fn max_blocking_threads(mut self, max_blocking_threads: usize) -> Self {
    self.max_blocking_threads = max_blocking_threads.max(1);
    self
  }

  pub fn build(self) -> Result<Pool, PoolError> {
    Pool::with_builder(self)
  }
}

struct PoolInner {
  id: u64,
  name: Arc<String>,
  parallelism: usize,
  state: AtomicU8,
  runtime: Mutex<Option<Runtime>>,
  tokio_handle: TokioHandle,
  active_task_info: DashMap<u64, Arc<dyn Cancellable>>,
  in_flight: Mutex<usize>,
  idle: Condvar,
}

/// A shared work-stealing pool running units of work.
///
/// Backed by a multi-threaded Tokio runtime whose scheduler steals work between
/// its workers. `Pool` is a cheap, cloneable handle; the pool is stopped by
/// [`shutdown`](Pool::shutdown) or implicitly when the last handle is dropped.
#[derive(Clone)]
pub struct Pool {
  inner: Arc<PoolInner>,
}

impl fmt::Debug for Pool {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Pool")
      .field("id", &self.inner.id)
      .field("name", &self.inner.name)
      .field("parallelism", &self.inner.parallelism)
      .field("state", &self.state())
      .finish()
  }
}

impl PartialEq for Pool {
  fn eq(&self, other: &Self) -> bool {
    self.inner.id == other.inner.id
  }
}

impl Eq for Pool {}

impl Pool {
  /// Creates a pool named `name` with `parallelism` worker threads.
  pub fn new(parallelism: usize, name: &str) -> Result<Self, PoolError> {
    PoolBuilder::new().name(name).parallelism(parallelism).build()
  }

  pub fn builder() -> PoolBuilder {
    PoolBuilder::new()
  }

  fn with_builder(builder: PoolBuilder) -> Result<Self, PoolError> {
    task::install_trace_hook();
    let id = NEXT_POOL_ID_COUNTER.fetch_add(1, AtomicOrdering::Relaxed);
    let runtime = RuntimeBuilder::new_multi_thread()
      .worker_threads(builder.parallelism)
      .max_blocking_threads(builder.max_blocking_threads)
      .thread_name(format!("{}-worker", builder.name))
      .on_thread_start(move || WORKER_OF_POOL.with(|worker_of| worker_of.set(Some(id))))
      .on_thread_stop(|| WORKER_OF_POOL.with(|worker_of| worker_of.set(None)))
      .build()
      .map_err(|build_error| PoolError::PoolBuildFailed {
        name: builder.name.clone(),
        reason: build_error.to_string(),
      })?;

    info!(
      pool_name = %builder.name,
      pool_id = id,
      parallelism = builder.parallelism,
      "Pool started."
    );

    Ok(Self {
      inner: Arc::new(PoolInner {
        id,
        name: Arc::new(builder.name),
        parallelism: builder.parallelism,
        state: AtomicU8::new(PoolState::Active as u8),
        tokio_handle: runtime.handle().clone(),
        runtime: Mutex::new(Some(runtime)),
        active_task_info: DashMap::new(),
        in_flight: Mutex::new(0),
        idle: Condvar::new(),
      }),
    })
  }

  pub fn id(&self) -> u64 {
    self.inner.id
  }

  pub fn name(&self) -> &str {
    &self.inner.name
  }

  pub fn parallelism(&self) -> usize {
    self.inner.parallelism
  }

  pub fn state(&self) -> PoolState {
    PoolState::from_u8(self.inner.state.load(AtomicOrdering::Acquire))
  }

  pub fn is_active(&self) -> bool {
    self.state() == PoolState::Active
  }

  /// Number of submitted tasks that have not finished yet.
  pub fn active_task_count(&self) -> usize {
    self.inner.active_task_info.len()
  }

  /// True when called from one of this pool's worker threads.
  pub fn is_current_worker(&self) -> bool {
    WORKER_OF_POOL.with(|worker_of| worker_of.get() == Some(self.inner.id))
  }

  /// Enqueues `work` and returns a handle for its result.
  ///
  /// While it runs, `work` sees this pool as the current pool of its worker
  /// thread, so nested parallel operations use the same pool.
  pub fn submit<F, R>(&self, work: F) -> Result<TaskHandle<R>, PoolError>
  where
    F: FnOnce(&TaskContext) -> R + Send + 'static,
    R: Send + 'static,
  {
    if !self.is_active() {
      warn!(pool_name = %self.inner.name, "Submit: Attempted to submit task to a pool that is shutting down or closed.");
      return Err(PoolError::PoolShuttingDown(self.inner.name.to_string()));
    }

    let task_id = NEXT_POOL_TASK_ID_COUNTER.fetch_add(1, AtomicOrdering::Relaxed);
    let cell = TaskCell::new(task_id);
    let context = TaskContext::new(task_id, self.inner.name.clone(), cell.token().clone());

    *self.inner.in_flight.lock() += 1;
    self.inner.active_task_info.insert(task_id, cell.clone());
    debug!(pool_name = %self.inner.name, %task_id, "Submitting task.");

    let guard = TaskGuard {
      pool: self.clone(),
      cell: cell.clone(),
    };
    self.inner.tokio_handle.spawn(
      Self::run_task(guard, context, work).instrument(info_span!(
        "pool_task",
        pool_name = %*self.inner.name,
        %task_id
      )),
    );

    Ok(TaskHandle::new(cell))
  }

  async fn run_task<F, R>(guard: TaskGuard<R>, context: TaskContext, work: F)
  where
    F: FnOnce(&TaskContext) -> R + Send + 'static,
    R: Send + 'static,
  {
    let task_id = context.task_id();
    if context.is_cancelled() {
      debug!(pool_name = %guard.pool.inner.name, %task_id, "Dequeued task already cancelled.");
      drop(work);
      return;
    }

    let pool = guard.pool.clone();
    let execution = AssertUnwindSafe(async move { Self::execute(pool, &context, work) })
      .catch_unwind()
      .await;

    let outcome = match execution {
      Ok(value) => {
        trace!(pool_name = %guard.pool.inner.name, %task_id, "Task executed successfully.");
        Ok(value)
      }
      Err(panic_payload) => {
        let failure = task::panic_failure(task_id, panic_payload.as_ref());
        error!(pool_name = %guard.pool.inner.name, %task_id, error = %failure, "Task panicked during execution.");
        Err(failure)
      }
    };

    if !guard.cell.complete(outcome) {
      debug!(pool_name = %guard.pool.inner.name, %task_id, "Task was cancelled while running, outcome discarded.");
    }
  }

  fn execute<F, R>(pool: Pool, context: &TaskContext, work: F) -> R
  where
    F: FnOnce(&TaskContext) -> R,
  {
    let _scope = PoolScope::enter(pool);
    let _traced = TracedSection::enter();
    work(context)
  }

  fn finish_task(&self, task_id: u64) {
    self.inner.active_task_info.remove(&task_id);
    let mut in_flight = self.inner.in_flight.lock();
    *in_flight = in_flight.saturating_sub(1);
    if *in_flight == 0 {
      self.inner.idle.notify_all();
    }
  }

  /// Stops the pool. Only the first call has an effect.
  ///
  /// A graceful shutdown called from one of the pool's own workers does not
  /// wait, since the calling task itself is still in flight.
  pub fn shutdown(&self, mode: ShutdownMode) {
    let transition = self.inner.state.compare_exchange(
      PoolState::Active as u8,
      PoolState::ShuttingDown as u8,
      AtomicOrdering::AcqRel,
      AtomicOrdering::Acquire,
    );
    if transition.is_err() {
      info!(pool_name = %self.inner.name, "Shutdown already in progress or completed.");
      return;
    }
    info!(pool_name = %self.inner.name, "Initiating explicit pool shutdown (mode: {:?}).", mode);

    match mode {
      ShutdownMode::ForcefulCancel => {
        let tasks_to_cancel: Vec<Arc<dyn Cancellable>> = self
          .inner
          .active_task_info
          .iter()
          .map(|entry| entry.value().clone())
          .collect();
        if tasks_to_cancel.is_empty() {
          info!(pool_name = %self.inner.name, "No active tasks to cancel forcefully.");
        }
        for task in tasks_to_cancel {
          if task.cancel() {
            debug!(pool_name = %self.inner.name, task_id = task.task_id(), "Forcefully cancelled active task during shutdown.");
          }
        }
      }
      ShutdownMode::Graceful if self.is_current_worker() => {
        warn!(pool_name = %self.inner.name, "Graceful shutdown requested from a worker of this pool; not waiting for tasks.");
      }
      ShutdownMode::Graceful => {
        info!(pool_name = %self.inner.name, "Graceful shutdown: Waiting for submitted tasks to complete.");
        task::blocking(|| {
          let mut in_flight = self.inner.in_flight.lock();
          while *in_flight > 0 {
            self.inner.idle.wait(&mut in_flight);
          }
        });
      }
    }

    self.stop_runtime();
    self.inner.state.store(PoolState::ShutDown as u8, AtomicOrdering::Release);
    info!(pool_name = %self.inner.name, "Pool shutdown process completed.");
  }

  fn stop_runtime(&self) {
    let runtime = self.inner.runtime.lock().take();
    if let Some(runtime) = runtime {
      runtime.shutdown_background();
    }
  }
}

/// Owned by every spawned task. Performs the pool's bookkeeping however the
/// task ends, including when the runtime drops it without polling.
struct TaskGuard<R: Send + 'static> {
  pool: Pool,
  cell: Arc<TaskCell<R>>,
}

impl<R: Send + 'static> Drop for TaskGuard<R> {
  fn drop(&mut self) {
    let task_id = self.cell.id();
    let abandoned = if self.cell.token().is_cancelled() {
      PoolError::TaskCancelled(task_id)
    } else {
      PoolError::PoolShuttingDown(self.pool.inner.name.to_string())
    };
    if self.cell.complete(Err(abandoned)) {
      warn!(pool_name = %self.pool.inner.name, %task_id, "Task dropped before it could run.");
    }
    self.pool.finish_task(task_id);
    trace!(pool_name = %self.pool.inner.name, %task_id, "Task finished processing, removed active info.");
  }
}

impl Drop for PoolInner {
  fn drop(&mut self) {
    if PoolState::from_u8(*self.state.get_mut()) == PoolState::ShutDown {
      trace!(pool_name = %*self.name, "Drop: Shutdown already completed.");
      return;
    }
    info!(
      pool_name = %*self.name,
      "Pool dropped. Initiating implicit shutdown without waiting for workers."
    );
    // The last handle may be released by one of this pool's own workers,
    // where only a background shutdown is permitted.
    if let Some(runtime) = self.runtime.get_mut().take() {
      runtime.shutdown_background();
    }
  }
}
