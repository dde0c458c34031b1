use crate::collector::{run_supervisor, Delivery, ResultStream};
use crate::error::PoolError;
use crate::queue::{EnqueueError, QueueConsumer, QueueProducer, TaskQueue};
use crate::signal::StopSignal;
use crate::task::{Task, TaskResult};
use crate::worker::run_worker_loop;

use std::mem;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::runtime::Handle as TokioHandle;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Lifecycle of a [`WorkerPool`]. Transitions are one-directional:
/// `Created -> Running -> Stopping -> Stopped`. There is no restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolState {
  /// Constructed, workers not yet spawned. Submissions buffer in the queue.
  Created,
  /// Workers are running.
  Running,
  /// Shutdown initiated; waiting for workers to exit.
  Stopping,
  /// Every worker has terminated.
  Stopped,
}

/// Defines how the pool behaves upon shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownMode {
  /// Closes the queue to new submissions and lets workers drain everything
  /// already buffered before exiting.
  Graceful,
  /// Sets the stop signal as well. Workers race the signal against the queue,
  /// so buffered tasks may be abandoned.
  Immediate,
}

/// Internal lifecycle slot. The `Created` variant parks the resources that
/// `start` consumes when spawning workers.
enum Lifecycle<T: Send + 'static, R: Send + 'static> {
  Created {
    consumer: QueueConsumer<T, R>,
    results_tx: Option<async_channel::Sender<TaskResult<R>>>,
  },
  Running {
    supervisor: JoinHandle<()>,
  },
  Stopping,
  Stopped,
}

impl<T: Send + 'static, R: Send + 'static> Lifecycle<T, R> {
  fn state(&self) -> PoolState {
    match self {
      Lifecycle::Created { .. } => PoolState::Created,
      Lifecycle::Running { .. } => PoolState::Running,
      Lifecycle::Stopping => PoolState::Stopping,
      Lifecycle::Stopped => PoolState::Stopped,
    }
  }
}

/// A fixed-size pool of workers fed by a bounded FIFO queue.
///
/// Submission is non-blocking with immediate accept/reject admission control;
/// shutdown is cooperative via a shared one-shot stop signal. Completion is
/// delivered either through per-task callbacks ([`WorkerPool::new`]) or
/// through a fan-in [`ResultStream`] ([`WorkerPool::with_collector`]); one
/// pattern per pool instance.
pub struct WorkerPool<T: Send + 'static, R: Send + 'static> {
  pool_name: Arc<String>,
  worker_count: usize,
  producer: QueueProducer<T, R>,
  stop: StopSignal,
  tokio_handle: TokioHandle,
  lifecycle: Mutex<Lifecycle<T, R>>,
}

impl<T: Send + 'static, R: Send + 'static> WorkerPool<T, R> {
  /// Creates a callback-style pool: each task's completion is delivered to
  /// its own callback, and callback-less results are dropped.
  ///
  /// `worker_count` and `queue_capacity` must both be at least 1
  /// (`InvalidConfig` otherwise). Workers are not spawned until
  /// [`start`](Self::start).
  pub fn new(
    worker_count: usize,
    queue_capacity: usize,
    tokio_handle: TokioHandle,
    pool_name: &str,
  ) -> Result<Self, PoolError> {
    let (pool, _) = Self::build(worker_count, queue_capacity, tokio_handle, pool_name, false)?;
    Ok(pool)
  }

  /// Creates a collector-style pool: results of callback-less tasks are
  /// fanned into the returned [`ResultStream`], which is closed exactly once,
  /// after every worker has exited.
  pub fn with_collector(
    worker_count: usize,
    queue_capacity: usize,
    tokio_handle: TokioHandle,
    pool_name: &str,
  ) -> Result<(Self, ResultStream<R>), PoolError> {
    let (pool, stream) = Self::build(worker_count, queue_capacity, tokio_handle, pool_name, true)?;
    let Some(stream) = stream else {
      unreachable!("build(collect = true) always produces a stream")
    };
    Ok((pool, stream))
  }

  fn build(
    worker_count: usize,
    queue_capacity: usize,
    tokio_handle: TokioHandle,
    pool_name: &str,
    collect: bool,
  ) -> Result<(Self, Option<ResultStream<R>>), PoolError> {
    if worker_count == 0 {
      return Err(PoolError::InvalidConfig(format!(
        "worker_count must be at least 1 (pool '{pool_name}')"
      )));
    }
    if queue_capacity == 0 {
      return Err(PoolError::InvalidConfig(format!(
        "queue_capacity must be at least 1 (pool '{pool_name}')"
      )));
    }

    let (producer, consumer) = TaskQueue::new(queue_capacity).split();

    // The results channel is unbounded so a slow stream consumer can never
    // wedge a worker (and thereby shutdown) on result delivery.
    let (results_tx, stream) = if collect {
      let (tx, rx) = async_channel::unbounded();
      (Some(tx), Some(ResultStream { rx }))
    } else {
      (None, None)
    };

    let pool = Self {
      pool_name: Arc::new(pool_name.to_string()),
      worker_count,
      producer,
      stop: StopSignal::new(),
      tokio_handle,
      lifecycle: Mutex::new(Lifecycle::Created { consumer, results_tx }),
    };

    info!(
      pool_name,
      worker_count, queue_capacity, collector = collect, "Pool created."
    );
    Ok((pool, stream))
  }

  pub fn name(&self) -> &str {
    &self.pool_name
  }

  pub fn worker_count(&self) -> usize {
    self.worker_count
  }

  /// Current number of tasks buffered in the queue.
  pub fn queued_task_count(&self) -> usize {
    self.producer.len()
  }

  pub fn state(&self) -> PoolState {
    self.lifecycle.lock().state()
  }

  /// Spawns the pool's workers and its supervisor, transitioning
  /// `Created -> Running`.
  ///
  /// Calling `start` more than once, or on a pool in any state other than
  /// `Created`, returns `InvalidState`.
  pub fn start(&self) -> Result<(), PoolError> {
    let mut lifecycle = self.lifecycle.lock();
    if !matches!(*lifecycle, Lifecycle::Created { .. }) {
      warn!(pool_name = %*self.pool_name, state = ?lifecycle.state(), "start() rejected.");
      return Err(PoolError::InvalidState(lifecycle.state()));
    }

    // Placeholder is immediately overwritten below; the lock is held throughout.
    let Lifecycle::Created { consumer, results_tx } = mem::replace(&mut *lifecycle, Lifecycle::Stopped) else {
      unreachable!("state checked above")
    };

    let delivery = match &results_tx {
      Some(tx) => Delivery::Collect(tx.clone()),
      None => Delivery::Discard,
    };

    let mut workers = Vec::with_capacity(self.worker_count);
    for index in 0..self.worker_count {
      let worker_loop = run_worker_loop(
        self.pool_name.clone(),
        index,
        consumer.clone(),
        self.stop.clone(),
        delivery.clone(),
      );
      workers.push(self.tokio_handle.spawn(worker_loop.instrument(info_span!(
        "pool_worker",
        pool_name = %*self.pool_name,
        worker = index
      ))));
    }

    // The supervisor owns the worker join barrier and, for collector pools,
    // the sole right to close the results stream.
    let supervisor = self.tokio_handle.spawn(
      run_supervisor(self.pool_name.clone(), workers, results_tx)
        .instrument(info_span!("pool_supervisor", pool_name = %*self.pool_name)),
    );

    *lifecycle = Lifecycle::Running { supervisor };
    info!(pool_name = %*self.pool_name, worker_count = self.worker_count, "Pool started.");
    Ok(())
  }

  /// Attempts to enqueue a task without blocking.
  ///
  /// Returns `PoolStopped` once shutdown has begun (stop signal set or queue
  /// closed) and `QueueFull` when the queue is at capacity. Rejection is
  /// final for this call; the caller decides whether to retry or drop.
  /// Submitting to a `Created` pool succeeds and buffers until `start`.
  pub fn submit(&self, task: Task<T, R>) -> Result<(), PoolError> {
    if self.stop.is_set() {
      warn!(pool_name = %*self.pool_name, task_id = task.id(), "Submission rejected, pool is stopping.");
      return Err(PoolError::PoolStopped);
    }

    let task_id = task.id();
    match self.producer.try_enqueue(task) {
      Ok(()) => {
        debug!(pool_name = %*self.pool_name, task_id, "Task accepted into queue.");
        Ok(())
      }
      Err(EnqueueError::Full) => Err(PoolError::QueueFull),
      Err(EnqueueError::Closed) => Err(PoolError::PoolStopped),
    }
  }

  /// Shuts the pool down and waits until every worker has terminated.
  ///
  /// Both modes close the queue to new submissions; `Immediate` additionally
  /// sets the stop signal, in which case buffered tasks may go unexecuted;
  /// workers race "task available" against "stop set" with no priority.
  /// On return the pool is `Stopped`: no task runs after this point and no
  /// worker is leaked. There is no built-in timeout; callers needing a
  /// bounded wait should wrap this in one externally.
  pub async fn shutdown(&self, mode: ShutdownMode) -> Result<(), PoolError> {
    let supervisor = {
      let mut lifecycle = self.lifecycle.lock();
      if !matches!(*lifecycle, Lifecycle::Running { .. }) {
        warn!(pool_name = %*self.pool_name, state = ?lifecycle.state(), "shutdown() rejected.");
        return Err(PoolError::InvalidState(lifecycle.state()));
      }
      let Lifecycle::Running { supervisor } = mem::replace(&mut *lifecycle, Lifecycle::Stopping) else {
        unreachable!("state checked above")
      };
      supervisor
    };

    info!(pool_name = %*self.pool_name, ?mode, "Initiating pool shutdown.");
    // Close admission before setting the stop signal. A submitter that
    // observed the signal unset may still be between its check and its
    // enqueue; closing first means no task can be accepted once set()
    // has returned.
    self.producer.close();
    if mode == ShutdownMode::Immediate {
      self.stop.set();
    }

    if let Err(join_error) = supervisor.await {
      error!(pool_name = %*self.pool_name, "Supervisor terminated abnormally: {join_error:?}");
    }

    *self.lifecycle.lock() = Lifecycle::Stopped;
    info!(pool_name = %*self.pool_name, "Pool shutdown complete.");
    Ok(())
  }

  /// Immediate shutdown: sets the stop signal, closes the queue, and blocks
  /// until every worker has exited. Equivalent to
  /// `shutdown(ShutdownMode::Immediate)`.
  pub async fn stop(&self) -> Result<(), PoolError> {
    self.shutdown(ShutdownMode::Immediate).await
  }
}

impl<T: Send + 'static, R: Send + 'static> Drop for WorkerPool<T, R> {
  fn drop(&mut self) {
    // An explicit shutdown already signalled the workers. Otherwise signal
    // here so they terminate on their own; Drop must not block on the join.
    if !self.stop.is_set() && !self.producer.is_closed() {
      info!(
        pool_name = %*self.pool_name,
        "WorkerPool dropped without shutdown. Signalling workers to stop and closing the queue."
      );
      self.producer.close();
      self.stop.set();
    }
  }
}
