use crate::task::Task;

use std::fmt;

use tracing::trace;

/// Why an enqueue attempt was rejected. Mapped onto the public error
/// taxonomy by the pool: `Full` becomes `QueueFull`, `Closed` becomes
/// `PoolStopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EnqueueError {
  Full,
  Closed,
}

/// A bounded, multi-producer multi-consumer FIFO queue of tasks.
///
/// Admission is decided immediately and never blocks the submitter; dequeueing
/// suspends the calling worker until a task is available or the queue is both
/// closed and drained. Built on `async-channel` so every worker can hold its
/// own cloned consumer handle instead of contending on a shared
/// `Mutex<Receiver>`.
pub(crate) struct TaskQueue<T, R> {
  tx: async_channel::Sender<Task<T, R>>,
  rx: async_channel::Receiver<Task<T, R>>,
}

impl<T: Send + 'static, R: Send + 'static> TaskQueue<T, R> {
  /// Creates a queue buffering at most `capacity` tasks.
  pub(crate) fn new(capacity: usize) -> Self {
    let (tx, rx) = async_channel::bounded(capacity);
    Self { tx, rx }
  }

  /// Splits the queue into its producer and consumer halves. Both are
  /// cloneable; each worker takes its own consumer clone.
  pub(crate) fn split(self) -> (QueueProducer<T, R>, QueueConsumer<T, R>) {
    (QueueProducer { tx: self.tx }, QueueConsumer { rx: self.rx })
  }
}

/// The submission half of the [`TaskQueue`].
pub(crate) struct QueueProducer<T, R> {
  tx: async_channel::Sender<Task<T, R>>,
}

impl<T, R> Clone for QueueProducer<T, R> {
  fn clone(&self) -> Self {
    Self { tx: self.tx.clone() }
  }
}

impl<T, R> fmt::Debug for QueueProducer<T, R> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("QueueProducer")
      .field("len", &self.tx.len())
      .field("is_closed", &self.tx.is_closed())
      .finish_non_exhaustive()
  }
}

impl<T: Send + 'static, R: Send + 'static> QueueProducer<T, R> {
  /// Attempts to enqueue a task without blocking.
  ///
  /// Returns `Err(EnqueueError::Full)` when the buffer is at capacity and
  /// `Err(EnqueueError::Closed)` once the queue has been closed. The
  /// admission decision is made at the point this call returns; tasks accepted
  /// by the same producer are dequeued in their acceptance order.
  pub(crate) fn try_enqueue(&self, task: Task<T, R>) -> Result<(), EnqueueError> {
    match self.tx.try_send(task) {
      Ok(()) => Ok(()),
      Err(async_channel::TrySendError::Full(task)) => {
        trace!(task_id = task.id, "Queue at capacity, rejecting task.");
        Err(EnqueueError::Full)
      }
      Err(async_channel::TrySendError::Closed(task)) => {
        trace!(task_id = task.id, "Queue closed, rejecting task.");
        Err(EnqueueError::Closed)
      }
    }
  }

  /// Closes the queue to new enqueues. Tasks already buffered remain
  /// dequeueable until drained. Idempotent; returns `true` on the call that
  /// actually performed the close.
  pub(crate) fn close(&self) -> bool {
    self.tx.close()
  }

  pub(crate) fn is_closed(&self) -> bool {
    self.tx.is_closed()
  }

  /// Number of tasks currently buffered.
  pub(crate) fn len(&self) -> usize {
    self.tx.len()
  }
}

/// The dequeue half of the [`TaskQueue`]. Cloned once per worker.
pub(crate) struct QueueConsumer<T, R> {
  rx: async_channel::Receiver<Task<T, R>>,
}

impl<T, R> Clone for QueueConsumer<T, R> {
  fn clone(&self) -> Self {
    Self { rx: self.rx.clone() }
  }
}

impl<T: Send + 'static, R: Send + 'static> QueueConsumer<T, R> {
  /// Waits for the next task.
  ///
  /// Returns `None` only after the queue has been closed **and** every
  /// buffered task has been dequeued.
  pub(crate) async fn dequeue(&self) -> Option<Task<T, R>> {
    self.rx.recv().await.ok()
  }
}
