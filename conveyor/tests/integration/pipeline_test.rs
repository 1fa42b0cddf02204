use conveyor::config::PoolConfig;
use conveyor::pipeline::{Partition, fan_in, fan_out, stage};
use conveyor::queue::BoundedQueue;
use conveyor::shutdown::create_shutdown_channel;
use conveyor::types::Job;
use conveyor::workers::base::{Worker, WorkerHandle};
use conveyor::workers::pool::WorkerPool;

use crate::support::init_test_tracing;

#[tokio::test(flavor = "multi_thread")]
async fn split_transform_merge_conserves_every_item() {
    init_test_tracing();

    let source = BoundedQueue::new(16);
    let branches = fan_out(source.clone(), 4, 8, Partition::RoundRobin);
    let squared: Vec<BoundedQueue<u64>> = branches
        .into_iter()
        .map(|branch| stage(branch, 8, |n: u64| async move { n * n }))
        .collect();
    let merged = fan_in(squared, 16);

    let producer = {
        let source = source.clone();
        tokio::spawn(async move {
            for n in 0..200 {
                source.put(n).await.expect("source is open");
            }
            source.close();
        })
    };

    let mut seen = Vec::new();
    while let Some(item) = merged.get().await {
        seen.push(item);
    }
    producer.await.expect("producer should not panic");

    seen.sort_unstable();
    let expected: Vec<u64> = (0..200).map(|n| n * n).collect();
    assert_eq!(seen, expected);
}

#[tokio::test(flavor = "multi_thread")]
async fn key_partitioned_branches_preserve_per_key_order() {
    init_test_tracing();

    let source = BoundedQueue::new(16);
    // Branches are drained one at a time, so each must be able to buffer its
    // whole share of the input.
    let branches = fan_out(
        source.clone(),
        3,
        64,
        Partition::by_key(|item: &(usize, u32)| item.0),
    );

    let producer = {
        let source = source.clone();
        tokio::spawn(async move {
            for seq in 0..60u32 {
                let key = (seq % 7) as usize;
                source.put((key, seq)).await.expect("source is open");
            }
            source.close();
        })
    };

    for (index, branch) in branches.iter().enumerate() {
        let mut last_per_key: std::collections::HashMap<usize, u32> = std::collections::HashMap::new();
        while let Some((key, seq)) = branch.get().await {
            assert_eq!(key % 3, index, "item routed to the wrong branch");
            if let Some(previous) = last_per_key.insert(key, seq) {
                assert!(previous < seq, "per-key order violated on branch {index}");
            }
        }
    }

    producer.await.expect("producer should not panic");
}

#[tokio::test(flavor = "multi_thread")]
async fn stage_output_feeds_a_worker_pool() {
    init_test_tracing();

    let source = BoundedQueue::new(8);
    // The stage wraps raw values into identified jobs for the pool.
    let staged = stage(source.clone(), 8, |n: u64| async move { Job::new(n, n * 10) });

    let (_shutdown_tx, shutdown_rx) = create_shutdown_channel();
    let config = PoolConfig {
        workers: 3,
        job_queue_capacity: 8,
        result_queue_capacity: 8,
    };
    let pool = WorkerPool::new(config, shutdown_rx, |job: Job<u64>| async move {
        Ok(job.payload + 1)
    })
    .expect("config is valid");

    let jobs = pool.jobs();
    let results = pool.results();
    let handle = pool.start().await.expect("pool starts");

    // Forward the stage output into the pool and close the job queue when the
    // stage reports end-of-stream.
    let forwarder = tokio::spawn(async move {
        while let Some(job) = staged.get().await {
            jobs.put(job).await.expect("job queue is open");
        }
        jobs.close();
    });

    let producer = {
        let source = source.clone();
        tokio::spawn(async move {
            for n in 0..50 {
                source.put(n).await.expect("source is open");
            }
            source.close();
        })
    };

    let mut outputs = Vec::new();
    while let Some(result) = results.get().await {
        outputs.push((result.job_id, result.output.expect("job succeeds")));
    }
    producer.await.expect("producer should not panic");
    forwarder.await.expect("forwarder should not panic");
    handle.wait().await.expect("pool drains cleanly");

    outputs.sort_unstable();
    let expected: Vec<(u64, u64)> = (0..50).map(|n| (n, n * 10 + 1)).collect();
    assert_eq!(outputs, expected);
}
