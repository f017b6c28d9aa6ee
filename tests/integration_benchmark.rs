//! Orchestrator tests: matrix shape, strict sequential execution order,
//! per-pairing error recording, and the fail-fast policy.

use std::sync::{Arc, Mutex};
use user_bench::benchmark::{Orchestrator, RunOutcome};
use user_bench::cli::Mode;
use user_bench::ops::{operation, OperationTable};
use user_bench::records::{Record, RecordSource, RecordSourceFactory, SourceError, StaticSource};

fn static_factory(n: usize) -> StaticSource {
    StaticSource::new(
        (0..n)
            .map(|i| Record::new(format!("user{i}@example.net")))
            .collect(),
    )
}

/// A table whose operations append their mode to a shared probe.
fn probed_table(probe: Arc<Mutex<Vec<Mode>>>) -> OperationTable {
    let mut table = OperationTable::new();
    for mode in [Mode::Create, Mode::Load, Mode::Delete, Mode::Query] {
        let probe = Arc::clone(&probe);
        table.insert(
            mode,
            operation(move |_record| {
                let probe = Arc::clone(&probe);
                async move {
                    probe.lock().unwrap().push(mode);
                    Ok(())
                }
            }),
        );
    }
    table
}

/// modes=[create, query] x levels=[1, 2] produces exactly four correctly
/// keyed entries, executed strictly in declared sequential order.
#[tokio::test]
async fn matrix_shape_and_declared_order() {
    let probe = Arc::new(Mutex::new(Vec::new()));
    let table = probed_table(Arc::clone(&probe));
    let factory = static_factory(3);

    let orchestrator = Orchestrator::new(vec![Mode::Create, Mode::Query], vec![1, 2], &table);
    let report = orchestrator.run(&factory).await.unwrap();

    assert_eq!(report.results.len(), 2);
    assert_eq!(report.results[0].concurrency, 1);
    assert_eq!(report.results[1].concurrency, 2);
    for level in &report.results {
        assert_eq!(level.tests.len(), 2);
        for mode in [Mode::Create, Mode::Query] {
            match level.tests.get(&mode) {
                Some(RunOutcome::Stats(stats)) => {
                    assert_eq!(stats.distribution.count, 3);
                    assert_eq!(stats.successes, 3);
                }
                other => panic!("missing stats for {mode}: {other:?}"),
            }
        }
    }

    // Pairings never overlap: each one's three invocations are contiguous,
    // and the pairings appear in declared order.
    let invocations = probe.lock().unwrap().clone();
    let expected: Vec<Mode> = [Mode::Create, Mode::Query, Mode::Create, Mode::Query]
        .iter()
        .flat_map(|&mode| std::iter::repeat(mode).take(3))
        .collect();
    assert_eq!(invocations, expected);
}

/// A factory failure in one pairing becomes an error entry; the remaining
/// matrix still runs.
#[tokio::test]
async fn pairing_error_is_recorded_and_matrix_continues() {
    struct FlakyFactory {
        calls: Mutex<usize>,
    }

    impl RecordSourceFactory for FlakyFactory {
        fn create(&self) -> Result<RecordSource, SourceError> {
            let mut calls = self.calls.lock().unwrap();
            *calls += 1;
            if *calls == 2 {
                return Err(SourceError::UnsupportedFormat {
                    extension: "bin".to_string(),
                });
            }
            Ok(RecordSource::new(vec![Record::new("user@example.net")]))
        }
    }

    let probe = Arc::new(Mutex::new(Vec::new()));
    let table = probed_table(probe);
    let factory = FlakyFactory {
        calls: Mutex::new(0),
    };

    let orchestrator = Orchestrator::new(vec![Mode::Create, Mode::Load], vec![1, 2], &table);
    let report = orchestrator.run(&factory).await.unwrap();

    // Second pairing (load at level 1) failed; the other three completed.
    assert!(matches!(
        report.results[0].tests.get(&Mode::Load),
        Some(RunOutcome::Error { .. })
    ));
    assert!(matches!(
        report.results[0].tests.get(&Mode::Create),
        Some(RunOutcome::Stats(_))
    ));
    assert!(matches!(
        report.results[1].tests.get(&Mode::Load),
        Some(RunOutcome::Stats(_))
    ));
    assert!(report.has_errors());
}

/// With fail-fast configured, the first pairing error aborts the matrix.
#[tokio::test]
async fn fail_fast_aborts_matrix() {
    struct BrokenFactory;

    impl RecordSourceFactory for BrokenFactory {
        fn create(&self) -> Result<RecordSource, SourceError> {
            Err(SourceError::UnsupportedFormat {
                extension: "bin".to_string(),
            })
        }
    }

    let probe = Arc::new(Mutex::new(Vec::new()));
    let table = probed_table(probe);

    let orchestrator =
        Orchestrator::new(vec![Mode::Create], vec![1, 2], &table).with_fail_fast(true);
    assert!(orchestrator.run(&BrokenFactory).await.is_err());
}

/// Failed operations are counted across the whole matrix.
#[tokio::test]
async fn matrix_counts_total_failures() {
    let mut table = OperationTable::new();
    table.insert(
        Mode::Create,
        operation(|record| async move {
            if record.email.starts_with("user0") {
                anyhow::bail!("rejected");
            }
            Ok(())
        }),
    );

    let factory = static_factory(4);
    let orchestrator = Orchestrator::new(vec![Mode::Create], vec![1, 2], &table);
    let report = orchestrator.run(&factory).await.unwrap();

    // One failing record per pairing, two pairings.
    assert_eq!(report.total_failures(), 2);
    assert!(!report.has_errors());
}
