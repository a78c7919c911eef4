//! Recurring scheduled tasks.
//!
//! # Responsibilities
//! - Run a job on a fixed period, first run immediately
//! - Rebuild the timer when the job asks for a new period
//! - Stop on shutdown, `cancel()`, or when the handle is dropped

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};

const MIN_PERIOD: Duration = Duration::from_millis(1);

/// What the job wants the scheduler to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reschedule {
    /// Keep the current timer.
    Keep,
    /// Drop the timer and start a new one at this period.
    Restart(Duration),
}

fn ticker(first: Instant, period: Duration) -> Interval {
    let mut ticker = time::interval_at(first, period.max(MIN_PERIOD));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

/// Handle to a spawned recurring job.
#[derive(Debug)]
pub struct RecurringTask {
    name: String,
    period_ms: Arc<AtomicU64>,
    handle: JoinHandle<()>,
}

impl RecurringTask {
    pub fn spawn<F, Fut>(
        name: impl Into<String>,
        period: Duration,
        mut shutdown: broadcast::Receiver<()>,
        mut job: F,
    ) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Reschedule> + Send + 'static,
    {
        let name = name.into();
        let period_ms = Arc::new(AtomicU64::new(period.as_millis() as u64));
        let current = period_ms.clone();
        let task_name = name.clone();

        let handle = tokio::spawn(async move {
            let mut timer = ticker(Instant::now(), period);
            loop {
                tokio::select! {
                    _ = timer.tick() => {
                        if let Reschedule::Restart(next) = job().await {
                            tracing::debug!(task = %task_name, period_ms = next.as_millis() as u64, "Restarting timer");
                            current.store(next.as_millis() as u64, Ordering::Relaxed);
                            timer = ticker(Instant::now() + next.max(MIN_PERIOD), next);
                        }
                    }
                    _ = shutdown.recv() => {
                        tracing::debug!(task = %task_name, "Recurring task received shutdown signal");
                        break;
                    }
                }
            }
        });

        Self {
            name,
            period_ms,
            handle,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Period the timer is currently running at.
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms.load(Ordering::Relaxed))
    }

    pub fn cancel(&self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for RecurringTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::Shutdown;
    use std::sync::atomic::AtomicU32;

    fn counting_job(count: Arc<AtomicU32>) -> impl FnMut() -> std::future::Ready<Reschedule> + Send + 'static {
        move || {
            count.fetch_add(1, Ordering::SeqCst);
            std::future::ready(Reschedule::Keep)
        }
    }

    async fn advance(duration: Duration) {
        time::sleep(duration).await;
        tokio::task::yield_now().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_tick_is_immediate() {
        let shutdown = Shutdown::new();
        let count = Arc::new(AtomicU32::new(0));
        let _task = RecurringTask::spawn("t", Duration::from_secs(10), shutdown.subscribe(), counting_job(count.clone()));

        advance(Duration::from_millis(1)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
        advance(Duration::from_secs(10)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_changes_period() {
        let shutdown = Shutdown::new();
        let count = Arc::new(AtomicU32::new(0));
        let job_count = count.clone();
        let task = RecurringTask::spawn("t", Duration::from_secs(1), shutdown.subscribe(), move || {
            let n = job_count.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n == 1 {
                    Reschedule::Restart(Duration::from_secs(5))
                } else {
                    Reschedule::Keep
                }
            }
        });

        advance(Duration::from_millis(1)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(task.period(), Duration::from_secs(5));

        advance(Duration::from_secs(4)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
        advance(Duration::from_secs(1)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_and_cancel_stop_the_task() {
        let shutdown = Shutdown::new();
        let count = Arc::new(AtomicU32::new(0));
        let task = RecurringTask::spawn("a", Duration::from_secs(1), shutdown.subscribe(), counting_job(count.clone()));
        let unrelated = Shutdown::new();
        let other = RecurringTask::spawn("b", Duration::from_secs(1), unrelated.subscribe(), counting_job(Arc::new(AtomicU32::new(0))));

        advance(Duration::from_millis(1)).await;
        shutdown.trigger();
        advance(Duration::from_secs(3)).await;
        assert!(task.is_finished());
        assert_eq!(count.load(Ordering::SeqCst), 1);

        assert!(!other.is_finished());
        other.cancel();
        advance(Duration::from_millis(1)).await;
        assert!(other.is_finished());
    }
}
