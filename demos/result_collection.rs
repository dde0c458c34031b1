use task_conveyor::{PoolError, ShutdownMode, Task, WorkerPool};

use std::sync::Arc;
use std::time::Duration;
use rand::Rng;
use tokio::runtime::Handle;
use tracing::info;

#[derive(Debug, Clone, Copy)]
struct Item {
  id: u64,
  payload: u64,
}

#[tokio::main]
async fn main() {
  tracing_subscriber::fmt()
    .with_max_level(tracing::Level::INFO)
    .with_target(false)
    .init();

  info!("--- Result Collection Example ---");

  let (pool, results) = WorkerPool::with_collector(
    5,  // Worker count
    10, // Queue capacity
    Handle::current(),
    "pipeline_pool",
  )
  .expect("Pool construction failed");
  pool.start().expect("Pool start failed");
  let pool = Arc::new(pool);

  // Two producers, ten items each. Submission is non-blocking, so a full
  // queue shows up as QueueFull and the producer retries after a pause.
  let mut producers = Vec::new();
  for producer_id in 0..2u64 {
    let pool = pool.clone();
    producers.push(tokio::spawn(async move {
      for i in 0..10u64 {
        let item = Item {
          id: producer_id * 10 + i,
          payload: rand::rng().random_range(0..100),
        };
        info!("Producer[{}] produced item {:?}", producer_id, item);
        loop {
          let task = Task::new(item, |item: Item| {
            std::thread::sleep(Duration::from_millis(50));
            Ok(Item {
              id: item.id,
              payload: item.payload * 2,
            })
          });
          match pool.submit(task) {
            Ok(()) => break,
            Err(PoolError::QueueFull) => tokio::time::sleep(Duration::from_millis(10)).await,
            Err(e) => panic!("submission failed: {e:?}"),
          }
        }
      }
      info!("Producer[{}] finished", producer_id);
    }));
  }
  for producer in producers {
    producer.await.expect("producer task panicked");
  }

  // Drain mode: workers finish everything buffered, then the supervisor
  // closes the results stream.
  pool
    .shutdown(ShutdownMode::Graceful)
    .await
    .expect("Pool shutdown failed");

  let mut count = 0usize;
  while let Some(result) = results.recv().await {
    let item = result.outcome.expect("pipeline tasks never fail");
    info!("Collected result {{ id: {}, payload: {} }}", item.id, item.payload);
    count += 1;
  }
  info!("Results stream closed after {} results. All workers completed.", count);
  info!("--- Result Collection Example End ---");
}
