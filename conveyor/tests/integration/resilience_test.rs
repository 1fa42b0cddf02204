use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use conveyor::bail;
use conveyor::breaker::{CircuitBreaker, CircuitState};
use conveyor::error::ErrorKind;
use conveyor::limiter::Pacer;
use conveyor::queue::BoundedQueue;
use conveyor::semaphore::Semaphore;
use conveyor::state::SharedCounter;

use crate::support::init_test_tracing;

#[tokio::test(start_paused = true)]
async fn pacer_spreads_queue_consumption_over_time() {
    init_test_tracing();

    let queue = BoundedQueue::new(8);
    for n in 0..5 {
        queue.put(n).await.expect("queue is open");
    }
    queue.close();

    let pacer = Pacer::new(Duration::from_millis(100));
    let start = tokio::time::Instant::now();

    let mut drained = Vec::new();
    while let Some(item) = queue.get().await {
        pacer.wait().await;
        drained.push(item);
    }

    assert_eq!(drained, vec![0, 1, 2, 3, 4]);
    // The first tick fires immediately; the remaining four are spaced out.
    assert!(start.elapsed() >= Duration::from_millis(400));
}

#[tokio::test(start_paused = true)]
async fn breaker_shields_a_failing_backend_until_it_recovers() {
    init_test_tracing();

    let breaker = CircuitBreaker::new(2, Duration::from_millis(500));
    let healthy = Arc::new(AtomicBool::new(false));
    let invocations = Arc::new(AtomicU32::new(0));

    let backend = |healthy: Arc<AtomicBool>, invocations: Arc<AtomicU32>| async move {
        invocations.fetch_add(1, Ordering::SeqCst);
        if healthy.load(Ordering::SeqCst) {
            Ok(42)
        } else {
            bail!(ErrorKind::Unknown, "backend unavailable");
        }
    };

    // Two consecutive failures trip the breaker.
    for _ in 0..2 {
        let outcome = breaker
            .call(|| backend(Arc::clone(&healthy), Arc::clone(&invocations)))
            .await;
        assert_eq!(outcome.expect_err("backend is down").kind(), ErrorKind::Unknown);
    }
    assert_eq!(breaker.snapshot().await.state, CircuitState::Open);

    // While open and inside the cooldown, the backend is never touched.
    let rejected = breaker
        .call(|| backend(Arc::clone(&healthy), Arc::clone(&invocations)))
        .await;
    assert_eq!(
        rejected.expect_err("breaker rejects").kind(),
        ErrorKind::BreakerOpen
    );
    assert_eq!(invocations.load(Ordering::SeqCst), 2);

    // After the cooldown the backend has recovered; the probe closes the breaker.
    healthy.store(true, Ordering::SeqCst);
    tokio::time::advance(Duration::from_millis(501)).await;

    let probed = breaker
        .call(|| backend(Arc::clone(&healthy), Arc::clone(&invocations)))
        .await;
    assert_eq!(probed.expect("backend recovered"), 42);
    assert_eq!(breaker.snapshot().await.state, CircuitState::Closed);
}

#[tokio::test(flavor = "multi_thread")]
async fn semaphore_bounds_concurrency_across_spawned_tasks() {
    init_test_tracing();

    const CAPACITY: usize = 3;
    const TASKS: u64 = 30;

    let semaphore = Arc::new(Semaphore::new(CAPACITY));
    let active = Arc::new(AtomicU32::new(0));
    let peak = Arc::new(AtomicU32::new(0));
    let completed = SharedCounter::new();

    let mut handles = Vec::new();
    for _ in 0..TASKS {
        let semaphore = Arc::clone(&semaphore);
        let active = Arc::clone(&active);
        let peak = Arc::clone(&peak);
        let completed = completed.clone();
        handles.push(tokio::spawn(async move {
            let _permit = semaphore.acquire().await;

            let now = active.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            tokio::task::yield_now().await;
            active.fetch_sub(1, Ordering::SeqCst);
            completed.increment();
        }));
    }

    for handle in handles {
        handle.await.expect("task should not panic");
    }

    assert_eq!(completed.value(), TASKS);
    assert!(
        peak.load(Ordering::SeqCst) as usize <= CAPACITY,
        "semaphore bound was violated"
    );
}
