//! Fixed-rate ticker feeding a bounded pool of workers.
//!
//! The ticker fires on a `tokio::time::interval` whose first tick completes
//! immediately, so the first unit of work starts with zero delay. Every tick
//! borrows a permit from a [`Semaphore`] sized to the worker pool and hands it
//! to the spawned task, which gives it back when it finishes. Because the ticker
//! never awaits the task itself, a slow tick does not push back the next nominal
//! firing; ticks overlap until the pool runs out of permits.
//!
//! When every permit is held the ticker waits for one to come back. Firings
//! missed in the meantime are caught up in a burst
//! ([`MissedTickBehavior::Burst`]) so the long-run rate stays anchored to the
//! start time.
//!
//! The schedule ends when the [`CancellationToken`] fires or the optional tick
//! limit is reached. After a tick limit, ticks in flight are awaited. Once the
//! token fires, every tick still in flight is dropped at its next await point,
//! which also drops its connection, so a stuck connect or write cannot hold up
//! shutdown.

use std::{fmt, future::Future, sync::Arc, time::Duration};

use tokio::{
    sync::Semaphore,
    task::{JoinError, JoinSet},
    time::{self, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// What a single tick reports back to the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The whole batch was written and the connection released.
    Completed { sent: usize },
    /// The attempt failed after `sent` lines; the failure was already logged.
    Failed { sent: usize },
    /// Dropped mid-flight because the run was cancelled.
    Cancelled,
}

/// Totals for one run of the scheduler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub ticks: u64,
    pub completed: u64,
    pub failed: u64,
    pub cancelled: u64,
    pub orders_sent: u64,
}

impl RunSummary {
    fn record(&mut self, result: Result<TickOutcome, JoinError>) {
        match result {
            Ok(TickOutcome::Completed { sent }) => {
                self.completed += 1;
                self.orders_sent += sent as u64;
            }
            Ok(TickOutcome::Failed { sent }) => {
                self.failed += 1;
                self.orders_sent += sent as u64;
            }
            Ok(TickOutcome::Cancelled) => self.cancelled += 1,
            // a panicking tick only loses its own batch
            Err(err) => {
                warn!("tick aborted: {}", err);
                self.failed += 1;
            }
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ticks={} completed={} failed={} cancelled={} orders_sent={}",
            self.ticks, self.completed, self.failed, self.cancelled, self.orders_sent
        )
    }
}

pub struct Scheduler {
    period: Duration,
    pool: Arc<Semaphore>,
    workers: usize,
    cancel: CancellationToken,
    max_ticks: Option<u64>,
}

impl Scheduler {
    /// # Panics
    /// If `period` is zero or `workers` is zero.
    pub fn new(period: Duration, workers: usize, cancel: CancellationToken) -> Self {
        assert!(!period.is_zero(), "tick period must be > 0");
        assert!(workers > 0, "worker pool must have at least one worker");
        Self {
            period,
            pool: Arc::new(Semaphore::new(workers)),
            workers,
            cancel,
            max_ticks: None,
        }
    }

    pub fn with_max_ticks(mut self, max_ticks: Option<u64>) -> Self {
        self.max_ticks = max_ticks;
        self
    }

    /// Drive `task` at the configured rate until cancelled or the tick limit is hit.
    ///
    /// `task` is called on the ticker with the 1-based tick number and must
    /// return a self-contained future; the future runs on its own tokio task.
    pub async fn run<F, Fut>(&self, mut task: F) -> RunSummary
    where
        F: FnMut(u64) -> Fut,
        Fut: Future<Output = TickOutcome> + Send + 'static,
    {
        info!(
            "scheduler started: period={:?} workers={} max_ticks={:?}",
            self.period, self.workers, self.max_ticks
        );
        let mut ticker = time::interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Burst);

        let mut in_flight = JoinSet::new();
        let mut summary = RunSummary::default();

        loop {
            if self.max_ticks.is_some_and(|max| summary.ticks >= max) {
                debug!("tick limit reached");
                break;
            }
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            let permit = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                permit = self.pool.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    // the pool is never closed while the ticker runs
                    Err(_) => break,
                },
            };

            summary.ticks += 1;
            let tick = task(summary.ticks);
            let cancel = self.cancel.clone();
            in_flight.spawn(async move {
                let outcome = tokio::select! {
                    biased;
                    outcome = tick => outcome,
                    _ = cancel.cancelled() => TickOutcome::Cancelled,
                };
                drop(permit);
                outcome
            });

            while let Some(result) = in_flight.try_join_next() {
                summary.record(result);
            }
        }

        debug!("waiting on {} in-flight ticks", in_flight.len());
        while let Some(result) = in_flight.join_next().await {
            summary.record(result);
        }
        info!("scheduler stopped: {}", summary);
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    /// Tracks how many tasks run at the same time and the highest value seen.
    #[derive(Default)]
    struct Gauge {
        current: AtomicUsize,
        peak: AtomicUsize,
    }

    impl Gauge {
        fn enter(&self) {
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
        }
        fn exit(&self) {
            self.current.fetch_sub(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_stops_at_tick_limit() {
        let scheduler = Scheduler::new(Duration::from_millis(1), 10, CancellationToken::new())
            .with_max_ticks(Some(5));
        let summary = scheduler
            .run(|_| async { TickOutcome::Completed { sent: 100 } })
            .await;
        assert_eq!(summary.ticks, 5);
        assert_eq!(summary.completed, 5);
        assert_eq!(summary.failed, 0);
        assert_eq!(summary.orders_sent, 500);
    }

    #[tokio::test]
    async fn test_tick_numbers_start_at_one() {
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let scheduler = Scheduler::new(Duration::from_millis(1), 2, CancellationToken::new())
            .with_max_ticks(Some(3));
        let log = seen.clone();
        scheduler
            .run(move |n| {
                log.lock().unwrap().push(n);
                async { TickOutcome::Completed { sent: 0 } }
            })
            .await;
        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_failed_and_panicking_ticks_do_not_stop_schedule() {
        let scheduler = Scheduler::new(Duration::from_millis(1), 4, CancellationToken::new())
            .with_max_ticks(Some(6));
        let summary = scheduler
            .run(|n| async move {
                match n {
                    2 => panic!("tick {} blew up", n),
                    3 => TickOutcome::Failed { sent: 10 },
                    _ => TickOutcome::Completed { sent: 100 },
                }
            })
            .await;
        assert_eq!(summary.ticks, 6);
        assert_eq!(summary.completed, 4);
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.orders_sent, 410);
    }

    /// Slow ticks overlap instead of delaying the next firing.
    #[tokio::test]
    async fn test_slow_ticks_overlap() {
        let gauge = Arc::new(Gauge::default());
        let scheduler = Scheduler::new(Duration::from_millis(2), 10, CancellationToken::new())
            .with_max_ticks(Some(4));
        let start = Instant::now();
        let g = gauge.clone();
        scheduler
            .run(move |_| {
                let g = g.clone();
                async move {
                    g.enter();
                    time::sleep(Duration::from_millis(200)).await;
                    g.exit();
                    TickOutcome::Completed { sent: 0 }
                }
            })
            .await;
        // sequential execution would need at least 800ms
        assert!(start.elapsed() < Duration::from_millis(700));
        assert!(gauge.peak.load(Ordering::SeqCst) > 1);
    }

    #[tokio::test]
    async fn test_concurrency_never_exceeds_pool() {
        let gauge = Arc::new(Gauge::default());
        let scheduler = Scheduler::new(Duration::from_millis(1), 2, CancellationToken::new())
            .with_max_ticks(Some(6));
        let g = gauge.clone();
        let summary = scheduler
            .run(move |_| {
                let g = g.clone();
                async move {
                    g.enter();
                    time::sleep(Duration::from_millis(20)).await;
                    g.exit();
                    TickOutcome::Completed { sent: 1 }
                }
            })
            .await;
        assert_eq!(summary.completed, 6);
        assert!(gauge.peak.load(Ordering::SeqCst) <= 2);
    }

    #[test]
    #[should_panic(expected = "worker pool must have at least one worker")]
    fn test_new_rejects_empty_pool() {
        Scheduler::new(Duration::from_millis(1), 0, CancellationToken::new());
    }

    #[test]
    #[should_panic(expected = "tick period must be > 0")]
    fn test_new_rejects_zero_period() {
        Scheduler::new(Duration::ZERO, 1, CancellationToken::new());
    }

    /// Ticks that never finish are dropped once the run is cancelled.
    #[tokio::test]
    async fn test_cancel_drops_stuck_ticks() {
        let cancel = CancellationToken::new();
        let scheduler = Scheduler::new(Duration::from_millis(1), 2, cancel.clone());
        let trigger = cancel.clone();
        tokio::spawn(async move {
            time::sleep(Duration::from_millis(30)).await;
            trigger.cancel();
        });
        let summary = time::timeout(
            Duration::from_secs(2),
            scheduler.run(|_| std::future::pending::<TickOutcome>()),
        )
        .await
        .expect("stuck ticks kept the scheduler alive after cancel");
        // the pool fills up and the ticker waits, so exactly two ticks fired
        assert_eq!(summary.ticks, 2);
        assert_eq!(summary.cancelled, 2);
        assert_eq!(summary.completed, 0);
    }

    #[tokio::test]
    async fn test_cancel_stops_unbounded_schedule() {
        let cancel = CancellationToken::new();
        let scheduler = Scheduler::new(Duration::from_millis(1), 3, cancel.clone());
        let trigger = cancel.clone();
        tokio::spawn(async move {
            time::sleep(Duration::from_millis(30)).await;
            trigger.cancel();
        });
        let summary = time::timeout(
            Duration::from_secs(2),
            scheduler.run(|_| async { TickOutcome::Completed { sent: 0 } }),
        )
        .await
        .expect("scheduler did not stop after cancel");
        assert!(summary.ticks > 0);
        assert_eq!(summary.ticks, summary.completed);
    }
}
