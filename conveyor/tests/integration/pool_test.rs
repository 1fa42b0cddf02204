use conveyor::config::PoolConfig;
use conveyor::conveyor_error;
use conveyor::error::ErrorKind;
use conveyor::shutdown::create_shutdown_channel;
use conveyor::types::Job;
use conveyor::workers::base::{Worker, WorkerHandle};
use conveyor::workers::pool::WorkerPool;

use crate::support::init_test_tracing;

#[tokio::test(flavor = "multi_thread")]
async fn pool_emits_one_result_per_job_across_many_workers() {
    init_test_tracing();

    let (_shutdown_tx, shutdown_rx) = create_shutdown_channel();
    let config = PoolConfig {
        workers: 8,
        job_queue_capacity: 16,
        result_queue_capacity: 16,
    };
    let pool = WorkerPool::new(config, shutdown_rx, |job: Job<u64>| async move {
        // Force rescheduling so completion order differs from submission order.
        tokio::task::yield_now().await;
        Ok(job.payload + 1)
    })
    .expect("config is valid");

    let jobs = pool.jobs();
    let results = pool.results();
    let handle = pool.start().await.expect("pool starts");

    let producer = tokio::spawn(async move {
        for id in 0..500 {
            jobs.put(Job::new(id, id)).await.expect("job queue is open");
        }
        jobs.close();
    });

    let mut ids = Vec::new();
    while let Some(result) = results.get().await {
        assert_eq!(result.output.expect("job succeeds"), result.job_id + 1);
        ids.push(result.job_id);
    }

    producer.await.expect("producer should not panic");
    handle.wait().await.expect("pool drains cleanly");

    ids.sort_unstable();
    let expected: Vec<u64> = (0..500).collect();
    assert_eq!(ids, expected);
}

#[tokio::test(flavor = "multi_thread")]
async fn pool_accounts_for_every_job_under_mixed_outcomes() {
    init_test_tracing();

    const JOBS: u64 = 300;

    let (_shutdown_tx, shutdown_rx) = create_shutdown_channel();
    let config = PoolConfig {
        workers: 4,
        job_queue_capacity: 8,
        result_queue_capacity: 8,
    };
    let pool = WorkerPool::new(config, shutdown_rx, |job: Job<u64>| async move {
        match job.payload % 3 {
            0 => Ok(job.payload),
            1 => Err(conveyor_error!(ErrorKind::Unknown, "synthetic failure")),
            _ => panic!("synthetic panic"),
        }
    })
    .expect("config is valid");

    let jobs = pool.jobs();
    let results = pool.results();
    let metrics = pool.metrics();
    let handle = pool.start().await.expect("pool starts");

    let producer = tokio::spawn(async move {
        for id in 0..JOBS {
            jobs.put(Job::new(id, id)).await.expect("job queue is open");
        }
        jobs.close();
    });

    let mut successes = 0;
    let mut failures = 0;
    let mut total = 0;
    while let Some(result) = results.get().await {
        total += 1;
        if result.is_success() {
            successes += 1;
        } else {
            failures += 1;
        }
    }

    producer.await.expect("producer should not panic");
    handle.wait().await.expect("contained failures do not fail the pool");

    assert_eq!(total, JOBS);
    assert_eq!(successes, JOBS / 3);
    assert_eq!(failures, JOBS - JOBS / 3);
    assert_eq!(metrics.processed(), JOBS / 3);
    assert_eq!(metrics.processed() + metrics.failed() + metrics.panicked(), JOBS);
}
