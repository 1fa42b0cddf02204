use std::time::Duration;

use conveyor::broadcast::Broadcaster;
use conveyor::config::PoolConfig;
use conveyor::coordinator::ShutdownCoordinator;
use conveyor::error::ErrorKind;
use conveyor::queue::BoundedQueue;
use conveyor::shutdown::{ShutdownResult, create_shutdown_channel};
use conveyor::types::Job;
use conveyor::workers::base::{Worker, WorkerHandle};
use conveyor::workers::pool::WorkerPool;

use crate::support::init_test_tracing;

#[tokio::test(flavor = "multi_thread")]
async fn coordinator_stop_tears_down_a_live_pool() {
    init_test_tracing();

    let coordinator = {
        ShutdownCoordinator::spawn(|shutdown_rx| async move {
            let config = PoolConfig {
                workers: 4,
                job_queue_capacity: 4,
                result_queue_capacity: 4,
            };
            let pool = WorkerPool::new(config, shutdown_rx.clone(), |job: Job<u64>| async move {
                Ok(job.payload)
            })?;

            let jobs = pool.jobs();
            let results = pool.results();
            let handle = pool.start().await?;

            // Keep feeding jobs until shutdown interrupts the put.
            let feeder = tokio::spawn(async move {
                let mut id = 0;
                loop {
                    if jobs.put_or_shutdown(Job::new(id, id), &shutdown_rx).await.is_err() {
                        break;
                    }
                    id += 1;
                }
            });

            // Discard results until the pool winds down.
            while results.get().await.is_some() {}

            feeder.await.map_err(|join_err| {
                conveyor::conveyor_error!(
                    ErrorKind::TaskPanic,
                    "feeder task panicked",
                    detail = join_err.to_string()
                )
            })?;
            handle.wait().await
        })
    };

    // Let the pool process for a moment, then request teardown.
    tokio::time::sleep(Duration::from_millis(50)).await;
    coordinator.stop().await.expect("teardown completes cleanly");
}

#[tokio::test(flavor = "multi_thread")]
async fn drain_on_shutdown_keeps_buffered_results() {
    init_test_tracing();

    let (shutdown_tx, shutdown_rx) = create_shutdown_channel();
    let queue = BoundedQueue::new(8);
    for n in 0..4 {
        queue.put(n).await.expect("queue is open");
    }

    let drainer = {
        let queue = queue.clone();
        tokio::spawn(async move { queue.drain_or_shutdown(&shutdown_rx).await })
    };

    tokio::time::sleep(Duration::from_millis(20)).await;
    shutdown_tx.shutdown();

    match drainer.await.expect("drainer should not panic") {
        ShutdownResult::Shutdown(items) => assert_eq!(items, vec![0, 1, 2, 3]),
        ShutdownResult::Ok(_) => panic!("the queue was never closed"),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn broadcaster_close_during_shutdown_ends_all_subscribers() {
    init_test_tracing();

    let broadcaster = Broadcaster::new(4);
    let readers: Vec<_> = (0..3)
        .map(|n| {
            broadcaster
                .subscribe(&format!("subscriber-{n}"))
                .expect("broadcaster is open")
        })
        .collect();

    broadcaster.broadcast("tick").expect("broadcaster is open");
    broadcaster.close().expect("first close succeeds");

    for reader in readers {
        assert_eq!(reader.get().await, Some("tick"));
        assert_eq!(reader.get().await, None);
    }

    let err = broadcaster
        .broadcast("late")
        .expect_err("broadcasts are rejected after close");
    assert_eq!(err.kind(), ErrorKind::InvalidState);
}
