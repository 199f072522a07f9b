use crate::error::PoolError;

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::{Builder as RuntimeBuilder, Handle as TokioHandle, Runtime};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, trace_span, Instrument};

const NON_DAEMON_SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

/// A delayed action run once by a [`GeneralTimer`].
pub type TimerAction = Box<dyn FnOnce() + Send + 'static>;

/// A named timer used to schedule delayed actions such as timeout cancellation.
pub trait GeneralTimer: Send + Sync {
  fn name(&self) -> &str;

  /// Daemon timers never delay shutdown for actions that are currently running.
  fn is_daemon(&self) -> bool;

  /// Runs `action` once after `delay`.
  fn schedule(&self, delay: Duration, action: TimerAction) -> Result<(), PoolError>;

  /// Discards every pending action and stops the timer. Idempotent.
  fn shutdown(&self);
}

/// The default [`GeneralTimer`], driven by a single-worker Tokio runtime.
pub struct TokioTimer {
  name: Arc<String>,
  daemon: bool,
  tokio_handle: TokioHandle,
  runtime: Mutex<Option<Runtime>>,
  shutdown_token: CancellationToken,
}

impl fmt::Debug for TokioTimer {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("TokioTimer")
      .field("name", &self.name)
      .field("daemon", &self.daemon)
      .field("shut_down", &self.shutdown_token.is_cancelled())
      .finish()
  }
}

impl TokioTimer {
  pub fn new(name: &str, daemon: bool) -> Result<Self, PoolError> {
    let runtime = RuntimeBuilder::new_multi_thread()
      .worker_threads(1)
      .thread_name(name)
      .enable_time()
      .build()
      .map_err(|build_error| PoolError::PoolBuildFailed {
        name: name.to_string(),
        reason: build_error.to_string(),
      })?;
    debug!(timer_name = %name, daemon, "Timer started.");

    Ok(Self {
      name: Arc::new(name.to_string()),
      daemon,
      tokio_handle: runtime.handle().clone(),
      runtime: Mutex::new(Some(runtime)),
      shutdown_token: CancellationToken::new(),
    })
  }

  pub fn is_shut_down(&self) -> bool {
    self.shutdown_token.is_cancelled()
  }
}

impl GeneralTimer for TokioTimer {
  fn name(&self) -> &str {
    &self.name
  }

  fn is_daemon(&self) -> bool {
    self.daemon
  }

  fn schedule(&self, delay: Duration, action: TimerAction) -> Result<(), PoolError> {
    if self.shutdown_token.is_cancelled() {
      return Err(PoolError::TimerShutDown(self.name.to_string()));
    }

    let token = self.shutdown_token.clone();
    let timer_name = self.name.clone();
    self.tokio_handle.spawn(
      async move {
        tokio::select! {
          biased;
          _ = token.cancelled() => {
            trace!(timer_name = %*timer_name, "Timer shut down, scheduled action discarded.");
          }
          _ = tokio::time::sleep(delay) => {
            if catch_unwind(AssertUnwindSafe(action)).is_err() {
              error!(timer_name = %*timer_name, "A scheduled timer action panicked.");
            }
          }
        }
      }
      .instrument(trace_span!("timer_action", timer_name = %*self.name, delay_ms = delay.as_millis() as u64)),
    );
    Ok(())
  }

  fn shutdown(&self) {
    if self.shutdown_token.is_cancelled() {
      trace!(timer_name = %*self.name, "Timer already shut down.");
      return;
    }
    self.shutdown_token.cancel();

    let runtime = self.runtime.lock().take();
    if let Some(runtime) = runtime {
      // Waiting is not permitted from inside another runtime.
      if self.daemon || TokioHandle::try_current().is_ok() {
        runtime.shutdown_background();
      } else {
        runtime.shutdown_timeout(NON_DAEMON_SHUTDOWN_GRACE);
      }
    }
    info!(timer_name = %*self.name, "Timer shut down.");
  }
}

impl Drop for TokioTimer {
  fn drop(&mut self) {
    self.shutdown();
  }
}
