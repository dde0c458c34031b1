use crate::task::TaskResult;

use std::sync::Arc;

use futures::future::join_all;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// How a worker hands off a result when the task carries no callback.
///
/// Chosen once per pool at construction: callback-style pools discard
/// callback-less results, collector-style pools publish every one of them
/// onto the pool's [`ResultStream`].
pub(crate) enum Delivery<R> {
  /// No results stream; callback-less results are dropped.
  Discard,
  /// Fan results into the shared stream consumed via [`ResultStream`].
  Collect(async_channel::Sender<TaskResult<R>>),
}

impl<R> Clone for Delivery<R> {
  fn clone(&self) -> Self {
    match self {
      Delivery::Discard => Delivery::Discard,
      Delivery::Collect(tx) => Delivery::Collect(tx.clone()),
    }
  }
}

impl<R: Send + 'static> Delivery<R> {
  pub(crate) async fn deliver(&self, pool_name: &str, result: TaskResult<R>) {
    match self {
      Delivery::Discard => {
        debug!(
          pool_name,
          task_id = result.task_id,
          "Task has no callback and pool has no collector; dropping result."
        );
      }
      Delivery::Collect(tx) => {
        let task_id = result.task_id;
        if tx.send(result).await.is_err() {
          // Receiver dropped; nothing left to observe results.
          warn!(pool_name, task_id, "Result stream receiver was dropped, task outcome lost.");
        }
      }
    }
  }
}

/// The consuming end of a pool's fan-in results stream.
///
/// Results from all workers are multiplexed into this single stream. Ordering
/// across workers is unspecified; results of one worker arrive in that
/// worker's processing order. [`recv`](Self::recv) returning `None` is the
/// terminal signal: the stream has been closed by the pool's supervisor and
/// no further result will ever arrive.
#[derive(Debug)]
pub struct ResultStream<R> {
  pub(crate) rx: async_channel::Receiver<TaskResult<R>>,
}

impl<R: Send + 'static> ResultStream<R> {
  /// Waits for the next result. Returns `None` once the stream is closed and
  /// drained; every subsequent call also returns `None`.
  pub async fn recv(&self) -> Option<TaskResult<R>> {
    self.rx.recv().await.ok()
  }

  /// Number of results buffered and not yet received.
  pub fn len(&self) -> usize {
    self.rx.len()
  }

  pub fn is_empty(&self) -> bool {
    self.rx.is_empty()
  }

  /// Whether the supervisor has closed the stream. Buffered results may still
  /// be pending even when this is `true`.
  pub fn is_closed(&self) -> bool {
    self.rx.is_closed()
  }
}

/// Joins every worker, then closes the results stream.
///
/// This is the single place the results stream is ever closed: workers only
/// send, and the close happens strictly after the join barrier has observed
/// every worker's exit. Awaited by `shutdown` to guarantee no worker outlives
/// the pool.
pub(crate) async fn run_supervisor<R: Send + 'static>(
  pool_name: Arc<String>,
  workers: Vec<JoinHandle<()>>,
  results_tx: Option<async_channel::Sender<TaskResult<R>>>,
) {
  let worker_count = workers.len();
  debug!(pool_name = %*pool_name, worker_count, "Supervisor waiting on worker join barrier.");

  for (index, join_result) in join_all(workers).await.into_iter().enumerate() {
    if let Err(join_error) = join_result {
      // Worker bodies catch task panics, so this indicates a bug or an abort.
      error!(pool_name = %*pool_name, worker = index, "Worker terminated abnormally: {join_error:?}");
    }
  }

  if let Some(tx) = results_tx {
    let closed_now = tx.close();
    debug!(
      pool_name = %*pool_name,
      closed_now,
      "All workers joined, results stream closed."
    );
  }

  info!(pool_name = %*pool_name, worker_count, "All workers terminated.");
}
