use crate::pool::PoolState;

use thiserror::Error;

/// Errors surfaced by pool construction and lifecycle operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
  #[error("Invalid pool configuration: {0}")]
  InvalidConfig(String),

  #[error("Operation is not permitted while the pool is in the {0:?} state")]
  InvalidState(PoolState),

  #[error("Task queue is at capacity, submission rejected")]
  QueueFull,

  #[error("Pool is stopping or already stopped, cannot accept new tasks")]
  PoolStopped,
}

/// Failures of an individual task, captured into its [`TaskResult`] and
/// never propagated past the worker that executed it.
///
/// [`TaskResult`]: crate::TaskResult
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
  #[error("Task execution failed: {0}")]
  Failed(String),

  #[error("Task panicked during execution")]
  Panicked,
}

impl TaskError {
  /// Convenience constructor for the common "execute returned an error" case.
  pub fn failed(reason: impl Into<String>) -> Self {
    TaskError::Failed(reason.into())
  }
}
