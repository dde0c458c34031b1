use crate::error::TaskError;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(0);

/// The function a worker runs for a task. Executed synchronously, at most once.
pub type TaskFn<T, R> = Box<dyn FnOnce(T) -> Result<R, TaskError> + Send + 'static>;

/// Optional per-task completion callback, invoked synchronously by the worker
/// that executed the task.
pub type TaskCallback<R> = Box<dyn FnOnce(TaskResult<R>) + Send + 'static>;

/// A unit of work: an opaque input, the function that consumes it, and an
/// optional completion callback.
///
/// A task is owned by the submitter until it is accepted into the queue, then
/// by the queue, then by exactly one worker. It is immutable once submitted.
pub struct Task<T, R> {
  pub(crate) id: u64,
  pub(crate) input: T,
  pub(crate) execute: TaskFn<T, R>,
  pub(crate) callback: Option<TaskCallback<R>>,
}

impl<T, R> Task<T, R> {
  /// Creates a task from its input and execute function, assigning it a
  /// process-wide unique id.
  pub fn new(input: T, execute: impl FnOnce(T) -> Result<R, TaskError> + Send + 'static) -> Self {
    Self {
      id: NEXT_TASK_ID.fetch_add(1, AtomicOrdering::Relaxed),
      input,
      execute: Box::new(execute),
      callback: None,
    }
  }

  /// Attaches a completion callback. The callback is invoked synchronously by
  /// the executing worker, instead of publishing onto the pool's result stream.
  pub fn with_callback(mut self, callback: impl FnOnce(TaskResult<R>) + Send + 'static) -> Self {
    self.callback = Some(Box::new(callback));
    self
  }

  /// Returns the unique id assigned to this task.
  pub fn id(&self) -> u64 {
    self.id
  }
}

impl<T, R> fmt::Debug for Task<T, R> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Task")
      .field("id", &self.id)
      .field("has_callback", &self.callback.is_some())
      .finish_non_exhaustive()
  }
}

/// The outcome of executing a task, carrying the originating task's id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskResult<R> {
  pub task_id: u64,
  pub outcome: Result<R, TaskError>,
}

impl<R> TaskResult<R> {
  pub fn is_ok(&self) -> bool {
    self.outcome.is_ok()
  }

  /// Consumes the result, returning the task's output or failure.
  pub fn into_outcome(self) -> Result<R, TaskError> {
    self.outcome
  }
}
