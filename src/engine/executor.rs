//! # Bounded Executor
//!
//! Consumes the record stream, keeps at most `concurrency` operations in
//! flight, and emits one timed [`OpResult`] per record onto a channel that
//! closes exactly once all inputs are consumed and all in-flight operations
//! have settled.
//!
//! Operation failures never escape: an error (or panic) inside the
//! operation becomes a failure result for that record. The executor itself
//! only fails if the downstream consumer disappears before all results are
//! delivered.

use super::{EngineError, OpResult};
use crate::records::Record;
use futures::{FutureExt, StreamExt};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, trace};

/// Start a bounded execution pass over `records`.
///
/// Returns the result stream plus the handle of the driving task. The
/// receiver yields one result per input record in completion order and then
/// closes; with an empty input it closes immediately. The handle settles
/// with [`EngineError::ChannelClosed`] if the receiver is dropped early.
///
/// `concurrency` must be at least 1.
pub fn execute<S, F, Fut>(
    records: S,
    concurrency: usize,
    op: F,
    verbose: bool,
) -> (mpsc::Receiver<OpResult>, JoinHandle<Result<(), EngineError>>)
where
    S: futures::Stream<Item = Record> + Send + 'static,
    F: Fn(Record) -> Fut + Send + Sync + Clone + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    assert!(concurrency >= 1, "concurrency must be at least 1");

    // The channel is a hand-off to the broadcast hub, not a buffer for the
    // whole run; a couple of slots per in-flight slot is enough slack.
    let (tx, rx) = mpsc::channel(concurrency * 2);

    let handle = tokio::spawn(async move {
        let results = records
            .map(move |record| run_one(record, op.clone(), verbose))
            .buffer_unordered(concurrency);
        futures::pin_mut!(results);

        while let Some(result) = results.next().await {
            tx.send(result).await.map_err(|_| EngineError::ChannelClosed)?;
        }
        // Dropping the sender here closes the stream, exactly once, after
        // the final result.
        Ok(())
    });

    (rx, handle)
}

/// Run one operation invocation: time it from dispatch to settle and wrap
/// the outcome, recovering errors and panics into failure results.
async fn run_one<F, Fut>(record: Record, op: F, verbose: bool) -> OpResult
where
    F: Fn(Record) -> Fut,
    Fut: Future<Output = anyhow::Result<()>>,
{
    let key = record.email.clone();
    let start = Instant::now();
    let outcome = AssertUnwindSafe(op(record)).catch_unwind().await;
    let duration_ms = start.elapsed().as_secs_f64() * 1000.0;

    let outcome = match outcome {
        Ok(outcome) => outcome,
        Err(_) => Err(anyhow::anyhow!("operation panicked")),
    };

    match outcome {
        Ok(()) => {
            trace!("{}: ok in {:.3}ms", key, duration_ms);
            OpResult::success(key, duration_ms)
        }
        Err(e) => {
            let message = format!("{:#}", e);
            if verbose {
                error!("{}: failed in {:.3}ms: {}", key, duration_ms, message);
            } else {
                trace!("{}: failed in {:.3}ms: {}", key, duration_ms, message);
            }
            OpResult::failure(key, duration_ms, message)
        }
    }
}
