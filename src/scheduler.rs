//! Batched concurrent task execution.
//!
//! Tasks run in contiguous batches of a configurable size. Everything in
//! a batch launches concurrently on the single control loop; the batch
//! boundary is a strict barrier, so batch N+1 never starts before batch N
//! has fully resolved. A failing task is caught, logged, and counted; it
//! never aborts siblings or later batches.

use futures::future::join_all;
use indicatif::{ProgressBar, ProgressStyle};
use std::future::Future;
use tracing::error;

use crate::models::Task;

/// Outcome counts for a completed run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub succeeded: usize,
    pub failed: usize,
}

impl RunSummary {
    pub fn resolved(&self) -> usize {
        self.succeeded + self.failed
    }
}

/// Runs the task matrix in bounded-size concurrent batches.
pub struct BatchScheduler {
    batch_size: usize,
}

impl BatchScheduler {
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
        }
    }

    /// Run every task, at most `batch_size` concurrently.
    ///
    /// Returns only after all tasks have resolved; the loop structure is
    /// the completion barrier, so callers can safely run one-time
    /// finalization (file arrangement, aggregation) right after this.
    pub async fn run_all<F, Fut>(&self, tasks: Vec<Task>, run: F) -> RunSummary
    where
        F: Fn(Task) -> Fut,
        Fut: Future<Output = anyhow::Result<()>>,
    {
        let total = tasks.len();
        let total_batches = total.div_ceil(self.batch_size);

        let progress = ProgressBar::new(total as u64);
        progress.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} audits")
                .unwrap()
                .progress_chars("#>-"),
        );

        let mut summary = RunSummary::default();
        let mut remaining = tasks.into_iter();
        let mut batch_index = 0;

        loop {
            let batch: Vec<Task> = remaining.by_ref().take(self.batch_size).collect();
            if batch.is_empty() {
                break;
            }
            batch_index += 1;

            let identities: Vec<(String, String)> = batch
                .iter()
                .map(|t| (t.url.clone(), t.label()))
                .collect();

            let results = join_all(batch.into_iter().map(&run)).await;

            for (result, (url, label)) in results.into_iter().zip(identities) {
                match result {
                    Ok(()) => summary.succeeded += 1,
                    Err(e) => {
                        summary.failed += 1;
                        error!("❌ Audit failed for [{}] on {}: {:#}", label, url, e);
                    }
                }
                progress.inc(1);
            }

            println!("\n✅ Batch {}/{} completed\n", batch_index, total_batches);
        }

        progress.finish_and_clear();

        debug_assert_eq!(summary.resolved(), total);
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::build_matrix;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    fn urls(n: usize) -> Vec<String> {
        (0..n)
            .map(|i| format!("https://example.com/p{}", i))
            .collect()
    }

    #[tokio::test]
    async fn test_concurrency_never_exceeds_batch_size() {
        for batch_size in [1, 3, 4] {
            let current = Arc::new(AtomicUsize::new(0));
            let peak = Arc::new(AtomicUsize::new(0));

            let summary = BatchScheduler::new(batch_size)
                .run_all(build_matrix(&urls(3)), |_task| {
                    let current = current.clone();
                    let peak = peak.clone();
                    async move {
                        let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                        current.fetch_sub(1, Ordering::SeqCst);
                        Ok(())
                    }
                })
                .await;

            assert_eq!(summary.resolved(), 12);
            assert!(
                peak.load(Ordering::SeqCst) <= batch_size,
                "peak {} exceeded batch size {}",
                peak.load(Ordering::SeqCst),
                batch_size
            );
        }
    }

    #[tokio::test]
    async fn test_batches_are_strict_barriers() {
        // Record (batch_of_task, event) pairs; with batch size 2 every
        // task of batch k must start after every task of batch k-1 ended.
        let events: Arc<Mutex<Vec<(usize, &'static str)>>> = Arc::new(Mutex::new(Vec::new()));

        BatchScheduler::new(2)
            .run_all(build_matrix(&urls(2)), |task| {
                let events = events.clone();
                async move {
                    let batch = task.sequence_index / 2;
                    events.lock().unwrap().push((batch, "start"));
                    // Stagger so interleaving would show up if batches
                    // overlapped.
                    tokio::time::sleep(Duration::from_millis(
                        5 + (task.sequence_index % 2) as u64 * 10,
                    ))
                    .await;
                    events.lock().unwrap().push((batch, "end"));
                    Ok(())
                }
            })
            .await;

        let events = events.lock().unwrap();
        let mut highest_finished_batch_before = 0usize;
        let mut ended_in_batch = 0usize;
        for (batch, kind) in events.iter() {
            match *kind {
                "start" => assert!(
                    *batch >= highest_finished_batch_before,
                    "batch {} started before batch {} finished",
                    batch,
                    highest_finished_batch_before
                ),
                _ => {
                    ended_in_batch += 1;
                    if ended_in_batch % 2 == 0 {
                        highest_finished_batch_before = batch + 1;
                    }
                }
            }
        }
    }

    #[tokio::test]
    async fn test_failure_never_aborts_siblings_or_later_batches() {
        let ran = Arc::new(AtomicUsize::new(0));

        let summary = BatchScheduler::new(2)
            .run_all(build_matrix(&urls(2)), |task| {
                let ran = ran.clone();
                async move {
                    ran.fetch_add(1, Ordering::SeqCst);
                    if task.sequence_index == 1 {
                        anyhow::bail!("synthetic failure");
                    }
                    Ok(())
                }
            })
            .await;

        assert_eq!(ran.load(Ordering::SeqCst), 8);
        assert_eq!(summary.succeeded, 7);
        assert_eq!(summary.failed, 1);
    }

    #[tokio::test]
    async fn test_zero_batch_size_is_clamped() {
        let summary = BatchScheduler::new(0)
            .run_all(build_matrix(&urls(1)), |_| async { Ok(()) })
            .await;
        assert_eq!(summary.resolved(), 4);
    }

    #[tokio::test]
    async fn test_empty_matrix() {
        let summary = BatchScheduler::new(4)
            .run_all(Vec::new(), |_| async { Ok(()) })
            .await;
        assert_eq!(summary.resolved(), 0);
    }
}
