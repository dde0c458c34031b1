use task_conveyor::{PoolState, Task, WorkerPool};

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::info;

#[tokio::main]
async fn main() {
  tracing_subscriber::fmt()
    .with_max_level(tracing::Level::DEBUG)
    .with_target(false)
    .init();

  info!("--- Immediate Shutdown Example ---");

  let pool = WorkerPool::new(2, 10, Handle::current(), "immediate_pool").expect("Pool construction failed");
  pool.start().expect("Pool start failed");

  let executed = Arc::new(AtomicUsize::new(0));

  // Fill the queue with slow tasks; most will still be buffered when stop()
  // is called, and may or may not run. The worker races "task available"
  // against "stop signal set" with no priority between them.
  for i in 0..10u64 {
    let executed = executed.clone();
    let task = Task::new(i, move |id| {
      info!("Task {} running", id);
      std::thread::sleep(Duration::from_millis(300));
      executed.fetch_add(1, Ordering::SeqCst);
      Ok(id)
    });
    if pool.submit(task).is_err() {
      info!("Task {} not admitted", i);
    }
  }

  tokio::time::sleep(Duration::from_millis(100)).await;
  info!("Calling stop() with {} tasks still queued...", pool.queued_task_count());
  pool.stop().await.expect("Pool shutdown failed");

  assert_eq!(pool.state(), PoolState::Stopped);
  info!(
    "Pool stopped. {} of 10 tasks executed; the rest were abandoned in the queue.",
    executed.load(Ordering::SeqCst)
  );

  // Submissions after stop are rejected outright.
  let late = pool.submit(Task::new(99u64, Ok));
  info!("Late submission result: {:?}", late.unwrap_err());
  info!("--- Immediate Shutdown Example End ---");
}
