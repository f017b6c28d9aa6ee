//! End-to-end tests of the result pipeline: bounded executor, broadcast
//! hub, and statistics aggregator wired together over in-memory record
//! sources and instrumented operations.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use user_bench::benchmark::{run_pipeline, PipelineOptions};
use user_bench::engine::{execute, progress, Broadcast, OpResult, StatsAggregator};
use user_bench::ops::operation;
use user_bench::records::{Record, RecordSource};

fn records(n: usize) -> RecordSource {
    RecordSource::new(
        (0..n)
            .map(|i| Record::new(format!("user{i}@example.net")))
            .collect(),
    )
}

fn options(concurrency: usize) -> PipelineOptions {
    PipelineOptions {
        concurrency,
        progress: false,
        verbose: false,
    }
}

/// Every record yields exactly one result, and the stream closes once.
#[tokio::test]
async fn one_result_per_record_then_close() {
    let (mut results, executor) = execute(
        records(25).into_stream(),
        4,
        |_record| async { Ok(()) },
        false,
    );

    let mut count = 0;
    while results.recv().await.is_some() {
        count += 1;
    }
    assert_eq!(count, 25);
    // recv() on a closed channel keeps returning None.
    assert!(results.recv().await.is_none());
    executor.await.unwrap().unwrap();
}

/// An empty input closes the output stream immediately with zero results.
#[tokio::test]
async fn empty_input_closes_immediately() {
    let (mut results, executor) = execute(
        records(0).into_stream(),
        8,
        |_record| async { Ok(()) },
        false,
    );
    assert!(results.recv().await.is_none());
    executor.await.unwrap().unwrap();
}

/// At no instant do more than `concurrency` operations overlap.
#[tokio::test]
async fn concurrency_cap_is_respected() {
    let in_flight = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let in_flight_probe = Arc::clone(&in_flight);
    let peak_probe = Arc::clone(&peak);
    let op = move |_record: Record| {
        let in_flight = Arc::clone(&in_flight_probe);
        let peak = Arc::clone(&peak_probe);
        async move {
            let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }
    };

    let (mut results, executor) = execute(records(40).into_stream(), 4, op, false);
    let mut count = 0;
    while results.recv().await.is_some() {
        count += 1;
    }
    executor.await.unwrap().unwrap();

    assert_eq!(count, 40);
    let peak = peak.load(Ordering::SeqCst);
    assert!(peak <= 4, "peak overlap {peak} exceeded the cap");
    // With 40 sleeping operations the cap should actually be reached.
    assert_eq!(peak, 4);
}

/// Operation errors and panics are recovered into failure results; the
/// pipeline itself never fails because of a record.
#[tokio::test]
async fn failures_and_panics_become_results() {
    let op = |record: Record| async move {
        if record.email.starts_with("user1") {
            panic!("boom");
        } else if record.email.starts_with("user2") {
            anyhow::bail!("rejected");
        }
        Ok(())
    };

    let (mut results, executor) = execute(records(30).into_stream(), 3, op, false);
    let mut ok = 0;
    let mut failed = 0;
    while let Some(result) = results.recv().await {
        if result.success {
            assert!(result.error.is_none());
            ok += 1;
        } else {
            assert!(result.error.is_some());
            assert!(result.duration_ms >= 0.0);
            failed += 1;
        }
    }
    executor.await.unwrap().unwrap();

    // user1*, user10..19, user2*, user20..29 fail; the rest succeed.
    assert_eq!(ok + failed, 30);
    assert_eq!(failed, 22);
}

/// Every subscriber observes the identical ordered result sequence.
#[tokio::test]
async fn broadcast_delivers_same_order_to_all_subscribers() {
    for subscribers in [1, 2, 5] {
        let (results, executor) = execute(
            records(50).into_stream(),
            8,
            |_record| async {
                // Jitter makes completion order nondeterministic.
                tokio::time::sleep(Duration::from_micros(rand_sleep())).await;
                Ok(())
            },
            false,
        );

        let mut hub = Broadcast::new(results, 16);
        let subscriptions: Vec<_> = (0..subscribers).map(|_| hub.subscribe()).collect();
        hub.spawn();

        // Drain concurrently; queues are smaller than the result count, so
        // a sequential drain would stall the hub on a full sibling queue.
        let collectors: Vec<_> = subscriptions
            .into_iter()
            .map(|mut subscription| {
                tokio::spawn(async move {
                    let mut keys = Vec::new();
                    while let Some(result) = subscription.recv().await {
                        keys.push(result.key);
                    }
                    keys
                })
            })
            .collect();

        let mut sequences = Vec::new();
        for collector in collectors {
            sequences.push(collector.await.unwrap());
        }
        executor.await.unwrap().unwrap();

        assert_eq!(sequences[0].len(), 50);
        for sequence in &sequences[1..] {
            assert_eq!(sequence, &sequences[0]);
        }
    }
}

fn rand_sleep() -> u64 {
    use rand::Rng;
    rand::thread_rng().gen_range(0..500)
}

/// A fully failing run still produces complete, timed statistics.
#[tokio::test]
async fn all_failure_run_is_still_timed() {
    let op = operation(|_record| async { anyhow::bail!("down") });
    let stats = run_pipeline(records(20), op, &options(4)).await.unwrap();

    assert_eq!(stats.successes, 0);
    assert_eq!(stats.failures, 20);
    assert_eq!(stats.distribution.count, 20);
    assert!(stats.distribution.max >= stats.distribution.min);
    assert_eq!(stats.rate, 0.0);
}

/// An empty run yields all-zero statistics and no division by zero.
#[tokio::test]
async fn empty_run_stats_are_zero() {
    let op = operation(|_record| async { Ok(()) });
    let stats = run_pipeline(records(0), op, &options(1)).await.unwrap();

    assert_eq!(stats.distribution.count, 0);
    assert_eq!(stats.successes, 0);
    assert_eq!(stats.failures, 0);
    assert_eq!(stats.distribution.p99, 0.0);
    assert!(stats.rate.is_finite());
}

/// A mixed run counts successes and failures independently over one pass.
#[tokio::test]
async fn mixed_run_counts_both_sides() {
    let op = operation(|record| async move {
        if record.email.contains('3') {
            anyhow::bail!("unlucky");
        }
        Ok(())
    });
    let stats = run_pipeline(records(20), op, &options(2)).await.unwrap();

    // user3 and user13 carry a '3'.
    assert_eq!(stats.failures, 2);
    assert_eq!(stats.successes, 18);
    assert_eq!(stats.distribution.count, 20);
    assert!(stats.rate > 0.0);
}

/// The aggregator sees results through the hub exactly once each.
#[tokio::test]
async fn aggregator_reads_each_result_once() {
    let (results, executor) = execute(
        records(10).into_stream(),
        2,
        |_record| async { Ok(()) },
        false,
    );
    let mut hub = Broadcast::new(results, 4);
    let subscription = hub.subscribe();
    hub.spawn();

    let totals = StatsAggregator::aggregate(subscription).await;
    executor.await.unwrap().unwrap();

    assert_eq!(totals.summary.count, 10);
    assert_eq!(totals.successes, 10);
}

/// The progress observer consumes exactly `n` results and then resolves,
/// leaving anything past `n` untouched on the subscription.
#[tokio::test]
async fn progress_resolves_after_n_results() {
    let (tx, rx) = tokio::sync::mpsc::channel(16);
    for i in 0..8 {
        tx.send(OpResult::success(format!("user{i}@example.net"), 1.0))
            .await
            .unwrap();
    }

    progress::observe(rx, 8).await;
    // The sender is still alive; resolving proves the observer counted to
    // exactly 8 rather than waiting for stream closure.
    drop(tx);
}

/// A subscription that closes before `n` results still lets the observer
/// resolve instead of hanging.
#[tokio::test]
async fn progress_resolves_on_early_closure() {
    let (tx, rx) = tokio::sync::mpsc::channel(16);
    tx.send(OpResult::failure("user0@example.net", 1.0, "down"))
        .await
        .unwrap();
    drop(tx);

    progress::observe(rx, 5).await;
}

/// A pipeline with progress enabled completes and produces the same
/// statistics; the observer is purely observational.
#[tokio::test]
async fn pipeline_with_progress_enabled_completes() {
    let op = operation(|_record| async { Ok(()) });
    let options = PipelineOptions {
        concurrency: 4,
        progress: true,
        verbose: false,
    };
    let stats = run_pipeline(records(30), op, &options).await.unwrap();

    assert_eq!(stats.distribution.count, 30);
    assert_eq!(stats.successes, 30);
    assert_eq!(stats.failures, 0);
}
