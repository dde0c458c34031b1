use task_conveyor::{PoolError, Task, WorkerPool};

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::{error, info};

#[tokio::main]
async fn main() {
  tracing_subscriber::fmt()
    .with_max_level(tracing::Level::DEBUG)
    .with_target(false) // Disable module paths for cleaner example output
    .init();

  info!("--- Basic Usage Example ---");

  let pool = WorkerPool::new(
    3,  // Worker count
    10, // Queue capacity
    Handle::current(),
    "basic_pool",
  )
  .expect("Pool construction failed");
  pool.start().expect("Pool start failed");

  let completed = Arc::new(AtomicUsize::new(0));
  let mut accepted = 0usize;

  for i in 0..20u64 {
    let completed = completed.clone();
    let task = Task::new(i, move |id| {
      info!("Processing task {}", id);
      std::thread::sleep(Duration::from_millis(200)); // Simulate work
      Ok(format!("Result of task {}", id))
    })
    .with_callback(move |result| {
      match &result.outcome {
        Ok(output) => info!("Task completed: {}", output),
        Err(e) => error!("Task failed: {}", e),
      }
      completed.fetch_add(1, Ordering::SeqCst);
    });

    match pool.submit(task) {
      Ok(()) => accepted += 1,
      Err(PoolError::QueueFull) => info!("Task {} rejected, queue is full", i),
      Err(e) => error!("Failed to submit task {}: {:?}", i, e),
    }
  }

  info!("Submitted {} of 20 tasks. Waiting for completions...", accepted);
  while completed.load(Ordering::SeqCst) < accepted {
    tokio::time::sleep(Duration::from_millis(50)).await;
  }

  pool.stop().await.expect("Pool shutdown failed");
  info!("Pool stopped. {} tasks completed.", completed.load(Ordering::SeqCst));
  info!("--- Basic Usage Example End ---");
}
