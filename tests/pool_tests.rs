use task_conveyor::{PoolError, PoolState, ShutdownMode, Task, TaskError, WorkerPool};

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::sleep;

// Helper to initialize tracing for tests. Once ensures it runs a single time
// across the whole test binary.
fn setup_tracing_for_test() {
  use std::sync::Once;
  use tracing_subscriber::{fmt, EnvFilter};
  static TRACING_INIT: Once = Once::new();

  TRACING_INIT.call_once(|| {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,task_conveyor=trace"));
    fmt::Subscriber::builder()
      .with_env_filter(filter)
      .with_test_writer()
      .try_init()
      .ok();
  });
}

// Helper to create a task that busy-sleeps for `work_ms` and bumps `completed`
// from its callback.
fn counting_task(input: u64, work_ms: u64, completed: Arc<AtomicUsize>) -> Task<u64, u64> {
  Task::new(input, move |value| {
    if work_ms > 0 {
      std::thread::sleep(Duration::from_millis(work_ms));
    }
    Ok(value * 2)
  })
  .with_callback(move |_result| {
    completed.fetch_add(1, Ordering::SeqCst);
  })
}

// Polls `condition` until it holds or the deadline passes.
async fn wait_until(deadline: Duration, mut condition: impl FnMut() -> bool) -> bool {
  let started = tokio::time::Instant::now();
  while started.elapsed() < deadline {
    if condition() {
      return true;
    }
    sleep(Duration::from_millis(10)).await;
  }
  condition()
}

#[tokio::test]
async fn test_zero_worker_count_is_invalid_config() {
  setup_tracing_for_test();
  let error = WorkerPool::<u64, u64>::new(0, 10, tokio::runtime::Handle::current(), "zero_workers").err();
  assert!(matches!(error, Some(PoolError::InvalidConfig(_))), "got {error:?}");
}

#[tokio::test]
async fn test_zero_queue_capacity_is_invalid_config() {
  setup_tracing_for_test();
  let error = WorkerPool::<u64, u64>::new(3, 0, tokio::runtime::Handle::current(), "zero_capacity").err();
  assert!(matches!(error, Some(PoolError::InvalidConfig(_))), "got {error:?}");
}

#[tokio::test]
async fn test_submit_and_callback_completion() {
  setup_tracing_for_test();
  let pool = WorkerPool::new(2, 5, tokio::runtime::Handle::current(), "basic_callback").unwrap();
  pool.start().unwrap();

  let (result_tx, result_rx) = oneshot::channel();
  let task = Task::new(21u64, |value| Ok(value * 2)).with_callback(move |result| {
    let _ = result_tx.send(result);
  });
  let task_id = task.id();

  pool.submit(task).unwrap();
  let result = result_rx.await.expect("callback should fire");
  assert_eq!(result.task_id, task_id);
  assert_eq!(result.outcome, Ok(42));

  pool.stop().await.unwrap();
}

#[tokio::test]
async fn test_task_failure_is_captured_and_isolated() {
  setup_tracing_for_test();
  let pool = WorkerPool::new(1, 5, tokio::runtime::Handle::current(), "failure_isolation").unwrap();
  pool.start().unwrap();

  let (fail_tx, fail_rx) = oneshot::channel();
  pool
    .submit(
      Task::new(0u64, |_| Err::<u64, _>(TaskError::failed("boom"))).with_callback(move |result| {
        let _ = fail_tx.send(result.outcome);
      }),
    )
    .unwrap();
  assert_eq!(fail_rx.await.unwrap(), Err(TaskError::Failed("boom".into())));

  // The worker that saw the failure must still execute subsequent tasks.
  let (ok_tx, ok_rx) = oneshot::channel();
  pool
    .submit(Task::new(5u64, |v| Ok(v + 1)).with_callback(move |result| {
      let _ = ok_tx.send(result.outcome);
    }))
    .unwrap();
  assert_eq!(ok_rx.await.unwrap(), Ok(6));

  pool.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_task_panic_is_captured_and_isolated() {
  setup_tracing_for_test();
  let pool = WorkerPool::new(1, 5, tokio::runtime::Handle::current(), "panic_isolation").unwrap();
  pool.start().unwrap();

  let (panic_tx, panic_rx) = oneshot::channel();
  pool
    .submit(
      Task::new(0u64, |_| -> Result<u64, TaskError> { panic!("task exploded") }).with_callback(move |result| {
        let _ = panic_tx.send(result.outcome);
      }),
    )
    .unwrap();
  assert_eq!(panic_rx.await.unwrap(), Err(TaskError::Panicked));

  let (ok_tx, ok_rx) = oneshot::channel();
  pool
    .submit(Task::new(1u64, |v| Ok(v)).with_callback(move |result| {
      let _ = ok_tx.send(result.outcome);
    }))
    .unwrap();
  assert_eq!(ok_rx.await.unwrap(), Ok(1));

  pool.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_callback_panic_does_not_kill_worker() {
  setup_tracing_for_test();
  let pool = WorkerPool::new(1, 5, tokio::runtime::Handle::current(), "callback_panic").unwrap();
  pool.start().unwrap();

  pool
    .submit(Task::new(0u64, |v| Ok(v)).with_callback(|_| panic!("callback exploded")))
    .unwrap();

  let (ok_tx, ok_rx) = oneshot::channel();
  pool
    .submit(Task::new(2u64, |v| Ok(v * 10)).with_callback(move |result| {
      let _ = ok_tx.send(result.outcome);
    }))
    .unwrap();
  assert_eq!(ok_rx.await.unwrap(), Ok(20));

  pool.stop().await.unwrap();
}

#[tokio::test]
async fn test_lifecycle_transitions_and_invalid_states() {
  setup_tracing_for_test();
  let pool = WorkerPool::<u64, u64>::new(2, 5, tokio::runtime::Handle::current(), "lifecycle").unwrap();
  assert_eq!(pool.state(), PoolState::Created);

  // Shutdown before start is forbidden.
  assert_eq!(pool.stop().await, Err(PoolError::InvalidState(PoolState::Created)));

  pool.start().unwrap();
  assert_eq!(pool.state(), PoolState::Running);

  // Start is one-shot.
  assert_eq!(pool.start(), Err(PoolError::InvalidState(PoolState::Running)));

  pool.stop().await.unwrap();
  assert_eq!(pool.state(), PoolState::Stopped);

  // Transitions are one-directional: no restart, no second shutdown.
  assert_eq!(pool.start(), Err(PoolError::InvalidState(PoolState::Stopped)));
  assert_eq!(pool.stop().await, Err(PoolError::InvalidState(PoolState::Stopped)));
}

#[tokio::test]
async fn test_submit_before_start_buffers_until_started() {
  setup_tracing_for_test();
  let pool = WorkerPool::new(1, 5, tokio::runtime::Handle::current(), "pre_start_submit").unwrap();

  let (result_tx, result_rx) = oneshot::channel();
  pool
    .submit(Task::new(7u64, |v| Ok(v)).with_callback(move |result| {
      let _ = result_tx.send(result.outcome);
    }))
    .unwrap();
  assert_eq!(pool.queued_task_count(), 1);

  pool.start().unwrap();
  assert_eq!(result_rx.await.unwrap(), Ok(7));

  pool.stop().await.unwrap();
}

#[tokio::test]
async fn test_submit_after_stop_returns_pool_stopped() {
  setup_tracing_for_test();
  let pool = WorkerPool::new(2, 5, tokio::runtime::Handle::current(), "post_stop_submit").unwrap();
  pool.start().unwrap();
  pool.stop().await.unwrap();

  let completed = Arc::new(AtomicUsize::new(0));
  let result = pool.submit(counting_task(1, 0, completed.clone()));
  assert_eq!(result, Err(PoolError::PoolStopped));

  // The rejected task must never run.
  sleep(Duration::from_millis(50)).await;
  assert_eq!(completed.load(Ordering::SeqCst), 0);
}

// Scenario A: 3 workers, queue capacity 10, 20 slow submissions. The first 10
// must be admitted immediately; later ones may bounce with QueueFull while the
// queue is saturated; every admitted task eventually completes.
#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_scenario_backpressure_under_saturation() {
  setup_tracing_for_test();
  let pool = WorkerPool::new(3, 10, tokio::runtime::Handle::current(), "backpressure").unwrap();
  pool.start().unwrap();

  let completed = Arc::new(AtomicUsize::new(0));
  let mut accepted = 0usize;
  let mut rejected = 0usize;

  for i in 0..20u64 {
    match pool.submit(counting_task(i, 20, completed.clone())) {
      Ok(()) => accepted += 1,
      Err(PoolError::QueueFull) => rejected += 1,
      Err(other) => panic!("unexpected submission error: {other:?}"),
    }
  }

  assert!(accepted >= 10, "at least the first 10 submissions must be admitted, got {accepted}");
  assert_eq!(accepted + rejected, 20);

  let all_done = wait_until(Duration::from_secs(5), || {
    completed.load(Ordering::SeqCst) == accepted
  })
  .await;
  assert!(
    all_done,
    "every admitted task must complete: {} of {accepted}",
    completed.load(Ordering::SeqCst)
  );

  pool.stop().await.unwrap();
}

// Scenario B: stop with tasks still queued. Stop must return once workers have
// exited regardless of whether every queued task ran, and nothing may execute
// after it returns.
#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_scenario_stop_with_queued_tasks() {
  setup_tracing_for_test();
  let pool = WorkerPool::new(1, 10, tokio::runtime::Handle::current(), "stop_midstream").unwrap();
  pool.start().unwrap();

  let executed = Arc::new(AtomicUsize::new(0));
  let mut accepted = 0usize;
  for i in 0..8u64 {
    let executed = executed.clone();
    let task = Task::new(i, move |v| {
      std::thread::sleep(Duration::from_millis(40));
      executed.fetch_add(1, Ordering::SeqCst);
      Ok(v)
    });
    if pool.submit(task).is_ok() {
      accepted += 1;
    }
  }
  assert!(accepted > 1);

  // Let the single worker pick up the first task.
  sleep(Duration::from_millis(10)).await;

  tokio::time::timeout(Duration::from_secs(5), pool.stop())
    .await
    .expect("stop() must return once all workers have exited")
    .unwrap();
  assert_eq!(pool.state(), PoolState::Stopped);

  let executed_at_stop = executed.load(Ordering::SeqCst);
  assert!(executed_at_stop <= accepted);

  // Quiescence: nothing executes after stop() has returned.
  sleep(Duration::from_millis(200)).await;
  assert_eq!(executed.load(Ordering::SeqCst), executed_at_stop);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_graceful_shutdown_drains_every_accepted_task() {
  setup_tracing_for_test();
  let pool = WorkerPool::new(2, 10, tokio::runtime::Handle::current(), "graceful_drain").unwrap();
  pool.start().unwrap();

  let completed = Arc::new(AtomicUsize::new(0));
  for i in 0..10u64 {
    pool.submit(counting_task(i, 5, completed.clone())).unwrap();
  }

  pool.shutdown(ShutdownMode::Graceful).await.unwrap();
  assert_eq!(
    completed.load(Ordering::SeqCst),
    10,
    "graceful shutdown must drain the queue before workers exit"
  );
  assert_eq!(pool.queued_task_count(), 0);
}
