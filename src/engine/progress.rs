//! # Progress Observer
//!
//! A broadcast subscriber that renders cumulative completion against the
//! known record count. Purely observational: it never touches result values
//! and, when progress rendering is disabled, the pipeline simply does not
//! subscribe it.

use super::OpResult;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;

fn progress_bar(total: u64) -> ProgressBar {
    let bar = ProgressBar::new(total);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({msg})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-"),
    );
    bar
}

/// Consume exactly `total` results from the subscription, advancing the bar
/// from `0/total` to `total/total`, then resolve.
///
/// Resolves early if the subscription closes first; the count only ever
/// increases.
pub async fn observe(mut subscription: mpsc::Receiver<OpResult>, total: u64) {
    let bar = progress_bar(total);
    let mut seen: u64 = 0;
    let mut failed: u64 = 0;

    while seen < total {
        match subscription.recv().await {
            Some(result) => {
                seen += 1;
                if !result.success {
                    failed += 1;
                }
                bar.set_message(format!("{} failed", failed));
                bar.inc(1);
            }
            None => break,
        }
    }

    bar.finish_with_message(format!("{} failed", failed));
}
