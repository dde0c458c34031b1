use crate::collector::Delivery;
use crate::error::TaskError;
use crate::queue::QueueConsumer;
use crate::signal::StopSignal;
use crate::task::{Task, TaskResult};

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{debug, error, info, trace, warn};

/// The worker loop: repeatedly race "a task is available" against "the pool
/// is stopping", execute whatever task wins, and terminate on stop or on a
/// closed-and-drained queue.
///
/// The select is intentionally unbiased. When a buffered task and the stop
/// signal are simultaneously ready, either branch may win, so tasks still
/// queued when shutdown begins may or may not execute. Exactly one outcome
/// happens per iteration.
pub(crate) async fn run_worker_loop<T, R>(
  pool_name: Arc<String>,
  worker_index: usize,
  queue: QueueConsumer<T, R>,
  stop: StopSignal,
  delivery: Delivery<R>,
) where
  T: Send + 'static,
  R: Send + 'static,
{
  info!(pool_name = %*pool_name, worker = worker_index, "Worker started.");

  loop {
    tokio::select! {
      _ = stop.cancelled() => {
        info!(pool_name = %*pool_name, worker = worker_index, "Stop signal received. Worker terminating.");
        break;
      }

      dequeued = queue.dequeue() => {
        match dequeued {
          Some(task) => {
            execute_task(&pool_name, worker_index, task, &delivery).await;
          }
          None => {
            info!(
              pool_name = %*pool_name,
              worker = worker_index,
              "Task queue closed and drained. Worker terminating."
            );
            break;
          }
        }
      }
    }
  }
}

/// Runs a single task and hands its result to the task's callback or to the
/// pool's delivery strategy. Task failures and panics are captured into the
/// result; nothing thrown by a task or callback escapes the worker.
async fn execute_task<T, R>(pool_name: &Arc<String>, worker_index: usize, task: Task<T, R>, delivery: &Delivery<R>)
where
  T: Send + 'static,
  R: Send + 'static,
{
  let Task {
    id: task_id,
    input,
    execute,
    callback,
  } = task;

  trace!(pool_name = %**pool_name, worker = worker_index, task_id, "Executing task.");

  let outcome = match catch_unwind(AssertUnwindSafe(move || execute(input))) {
    Ok(Ok(output)) => Ok(output),
    Ok(Err(task_error)) => {
      debug!(
        pool_name = %**pool_name,
        worker = worker_index,
        task_id,
        "Task reported failure: {task_error}"
      );
      Err(task_error)
    }
    Err(_panic_payload) => {
      error!(pool_name = %**pool_name, worker = worker_index, task_id, "Task panicked during execution.");
      Err(TaskError::Panicked)
    }
  };

  let result = TaskResult { task_id, outcome };

  match callback {
    Some(callback) => {
      if catch_unwind(AssertUnwindSafe(move || callback(result))).is_err() {
        warn!(
          pool_name = %**pool_name,
          worker = worker_index,
          task_id,
          "Task completion callback panicked."
        );
      }
    }
    None => delivery.deliver(pool_name, result).await,
  }
}
