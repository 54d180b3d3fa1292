//! Bounded-concurrency fire-and-forget task runner.
//!
//! Report dispatch and status polling are side effects nobody awaits. The
//! runner accepts such tasks, executes at most `concurrency` of them at a
//! time, and swallows every outcome:
//!
//! - A failed or panicking task is logged and counted, never propagated
//! - Excess tasks queue FIFO with no priority
//! - [`TaskRunner::stop`] discards queued tasks and silently drops later
//!   `add` calls; running tasks finish undisturbed

use crate::error::Result;
use futures::future::BoxFuture;
use futures::FutureExt;
use metrics::{counter, gauge, histogram};
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn};

// ═══════════════════════════════════════════════════════════════════════════════
// Runner Statistics
// ═══════════════════════════════════════════════════════════════════════════════

/// Counters observing fire-and-forget outcomes without changing the
/// non-blocking contract.
#[derive(Debug, Default)]
struct RunnerCounters {
    accepted: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    panicked: AtomicU64,
    discarded: AtomicU64,
    queued: AtomicU64,
}

/// Point-in-time snapshot of runner activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunnerStats {
    pub accepted: u64,
    pub completed: u64,
    pub failed: u64,
    pub panicked: u64,
    pub discarded: u64,
    pub queued: u64,
}

// ═══════════════════════════════════════════════════════════════════════════════
// Task Runner
// ═══════════════════════════════════════════════════════════════════════════════

type Task = BoxFuture<'static, Result<()>>;

/// Fixed-concurrency queue for deferred side-effect operations.
pub struct TaskRunner {
    tx: mpsc::UnboundedSender<Task>,
    stopped: Arc<AtomicBool>,
    counters: Arc<RunnerCounters>,
}

impl TaskRunner {
    /// Start a runner with the given number of worker tasks.
    pub fn new(concurrency: usize) -> Self {
        let concurrency = concurrency.max(1);
        let (tx, rx) = mpsc::unbounded_channel::<Task>();
        let rx = Arc::new(Mutex::new(rx));
        let stopped = Arc::new(AtomicBool::new(false));
        let counters = Arc::new(RunnerCounters::default());

        for worker_id in 0..concurrency {
            let rx = rx.clone();
            let stopped = stopped.clone();
            let counters = counters.clone();
            tokio::spawn(async move {
                Self::worker_loop(worker_id, rx, stopped, counters).await;
            });
        }

        info!(concurrency, "Task runner started");

        Self {
            tx,
            stopped,
            counters,
        }
    }

    /// Enqueue a task. The caller never observes its result.
    ///
    /// After [`Self::stop`], calls are silently dropped.
    pub fn add<F>(&self, task: F)
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        if self.stopped.load(Ordering::SeqCst) {
            debug!("Task dropped, runner is stopped");
            return;
        }

        self.counters.accepted.fetch_add(1, Ordering::SeqCst);
        let queued = self.counters.queued.fetch_add(1, Ordering::SeqCst) + 1;
        counter!("adsync_runner_tasks_total").increment(1);
        gauge!("adsync_runner_queue_depth").set(queued as f64);

        if self.tx.send(task.boxed()).is_err() {
            // Workers are gone, nothing left to run it
            self.counters.queued.fetch_sub(1, Ordering::SeqCst);
            warn!("Task dropped, runner workers have shut down");
        }
    }

    /// Stop accepting work and discard not-yet-started queued tasks.
    ///
    /// Already-running tasks are not interrupted.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        info!("Task runner stopped");
    }

    /// Whether [`Self::stop`] has been called.
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Snapshot the runner's counters.
    pub fn stats(&self) -> RunnerStats {
        RunnerStats {
            accepted: self.counters.accepted.load(Ordering::SeqCst),
            completed: self.counters.completed.load(Ordering::SeqCst),
            failed: self.counters.failed.load(Ordering::SeqCst),
            panicked: self.counters.panicked.load(Ordering::SeqCst),
            discarded: self.counters.discarded.load(Ordering::SeqCst),
            queued: self.counters.queued.load(Ordering::SeqCst),
        }
    }

    async fn worker_loop(
        worker_id: usize,
        rx: Arc<Mutex<mpsc::UnboundedReceiver<Task>>>,
        stopped: Arc<AtomicBool>,
        counters: Arc<RunnerCounters>,
    ) {
        loop {
            let task = {
                let mut rx = rx.lock().await;
                rx.recv().await
            };
            let Some(task) = task else {
                debug!(worker_id, "Runner worker exiting, queue closed");
                break;
            };

            let queued = counters.queued.fetch_sub(1, Ordering::SeqCst) - 1;
            gauge!("adsync_runner_queue_depth").set(queued as f64);

            // stop() discards everything still queued
            if stopped.load(Ordering::SeqCst) {
                counters.discarded.fetch_add(1, Ordering::SeqCst);
                counter!("adsync_runner_tasks_discarded").increment(1);
                continue;
            }

            let started = Instant::now();
            let outcome = std::panic::AssertUnwindSafe(task).catch_unwind().await;
            histogram!("adsync_runner_task_duration_seconds")
                .record(started.elapsed().as_secs_f64());

            match outcome {
                Ok(Ok(())) => {
                    counters.completed.fetch_add(1, Ordering::SeqCst);
                    counter!("adsync_runner_tasks_completed").increment(1);
                }
                Ok(Err(err)) => {
                    counters.failed.fetch_add(1, Ordering::SeqCst);
                    err.log();
                }
                Err(panic) => {
                    counters.panicked.fetch_add(1, Ordering::SeqCst);
                    counter!("adsync_runner_tasks_panicked").increment(1);
                    let message = panic
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic".to_string());
                    error!(worker_id, panic = %message, "Runner task panicked");
                }
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AdsyncError;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    #[tokio::test]
    async fn test_tasks_run_to_completion() {
        let runner = TaskRunner::new(4);
        let done = Arc::new(AtomicUsize::new(0));

        for _ in 0..10 {
            let done = done.clone();
            runner.add(async move {
                done.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }

        settle().await;
        assert_eq!(done.load(Ordering::SeqCst), 10);
        assert_eq!(runner.stats().completed, 10);
    }

    #[tokio::test]
    async fn test_concurrency_ceiling_is_enforced() {
        let runner = TaskRunner::new(2);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        for _ in 0..8 {
            let running = running.clone();
            let peak = peak.clone();
            runner.add(async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                running.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            });
        }

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(runner.stats().completed, 8);
    }

    #[tokio::test]
    async fn test_failing_task_does_not_block_queue() {
        let runner = TaskRunner::new(1);
        let done = Arc::new(AtomicUsize::new(0));

        runner.add(async { Err(AdsyncError::internal("task exploded")) });
        let done_clone = done.clone();
        runner.add(async move {
            done_clone.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        settle().await;
        assert_eq!(done.load(Ordering::SeqCst), 1);
        let stats = runner.stats();
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.completed, 1);
    }

    #[tokio::test]
    async fn test_panicking_task_does_not_block_queue() {
        let runner = TaskRunner::new(1);
        let done = Arc::new(AtomicUsize::new(0));

        runner.add(async { panic!("task panicked") });
        let done_clone = done.clone();
        runner.add(async move {
            done_clone.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        settle().await;
        assert_eq!(done.load(Ordering::SeqCst), 1);
        assert_eq!(runner.stats().panicked, 1);
    }

    #[tokio::test]
    async fn test_stop_drops_later_adds() {
        let runner = TaskRunner::new(2);
        runner.stop();

        let done = Arc::new(AtomicUsize::new(0));
        let done_clone = done.clone();
        runner.add(async move {
            done_clone.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        settle().await;
        assert_eq!(done.load(Ordering::SeqCst), 0);
        assert_eq!(runner.stats().accepted, 0);
        assert!(runner.is_stopped());
    }

    #[tokio::test]
    async fn test_stop_discards_queued_tasks_but_not_running_ones() {
        let runner = TaskRunner::new(1);
        let done = Arc::new(AtomicUsize::new(0));

        // first task occupies the single worker
        let done_running = done.clone();
        runner.add(async move {
            tokio::time::sleep(Duration::from_millis(80)).await;
            done_running.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        // queued behind it
        let done_queued = done.clone();
        runner.add(async move {
            done_queued.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        runner.stop();
        tokio::time::sleep(Duration::from_millis(150)).await;

        // running task finished, queued one was discarded
        assert_eq!(done.load(Ordering::SeqCst), 1);
        assert_eq!(runner.stats().discarded, 1);
    }
}
