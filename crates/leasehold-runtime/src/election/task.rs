use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use leasehold_core::Result;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::callbacks::LeaderCallbacks;

/// Future returned by [`ManagedTask::run`].
pub type TaskFuture = Pin<Box<dyn Future<Output = Result<()>> + Send + 'static>>;

/// Work that may only run while this candidate leads.
pub trait ManagedTask: Send + Sync + 'static {
    /// Task name for logs.
    fn name(&self) -> &str;

    /// Run until `leadership` is cancelled.
    fn run(&self, leadership: CancellationToken) -> TaskFuture;
}

/// A running task and the token that stops it.
struct Running {
    leadership: CancellationToken,
    handle: JoinHandle<()>,
}

/// Starts a [`ManagedTask`] when leadership is acquired and stops it when
/// leadership ends.
///
/// On stop the task's token is cancelled and the task is aborted in the same
/// call, so it never runs past its current poll once leadership is gone.
pub struct LeaderTaskRunner<T: ManagedTask> {
    task: Arc<T>,
    running: Mutex<Option<Running>>,
    stopped: Mutex<Vec<JoinHandle<()>>>,
}

impl<T: ManagedTask> LeaderTaskRunner<T> {
    /// Create a new runner.
    pub fn new(task: T) -> Self {
        Self {
            task: Arc::new(task),
            running: Mutex::new(None),
            stopped: Mutex::new(Vec::new()),
        }
    }

    /// The managed task.
    pub fn task(&self) -> &T {
        &self.task
    }

    /// Check if the task is running.
    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .is_some_and(|r| !r.handle.is_finished())
    }

    /// Wait until every stopped task has been torn down.
    pub async fn wait_drained(&self) {
        let handles: Vec<_> = self
            .stopped
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain(..)
            .collect();

        for handle in handles {
            let _ = handle.await;
        }
    }

    fn start(&self, leadership: CancellationToken) {
        let mut running = self.running.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = running.take() {
            tracing::warn!(task = %self.task.name(), "Task still running at new leadership, stopping it");
            previous.leadership.cancel();
            previous.handle.abort();
        }

        let name = self.task.name().to_string();
        let future = self.task.run(leadership.clone());
        let handle = tokio::spawn(async move {
            match future.await {
                Ok(()) => tracing::info!(task = %name, "Leader task finished"),
                Err(e) => tracing::error!(task = %name, "Leader task failed: {}", e),
            }
        });

        tracing::info!(task = %self.task.name(), "Leader task started");
        *running = Some(Running { leadership, handle });
    }

    fn stop(&self) {
        let Some(Running { leadership, handle }) = self
            .running
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        else {
            return;
        };

        leadership.cancel();
        handle.abort();
        tracing::info!(task = %self.task.name(), "Leader task stopped");

        let mut stopped = self.stopped.lock().unwrap_or_else(|e| e.into_inner());
        stopped.retain(|h| !h.is_finished());
        stopped.push(handle);
    }
}

impl<T: ManagedTask> LeaderCallbacks for LeaderTaskRunner<T> {
    fn on_started_leading(&self, leadership: CancellationToken) {
        self.start(leadership);
    }

    fn on_stopped_leading(&self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    struct Counter {
        ticks: Arc<AtomicU32>,
    }

    impl ManagedTask for Counter {
        fn name(&self) -> &str {
            "counter"
        }

        fn run(&self, leadership: CancellationToken) -> TaskFuture {
            let ticks = self.ticks.clone();
            Box::pin(async move {
                loop {
                    tokio::select! {
                        _ = leadership.cancelled() => break,
                        _ = tokio::time::sleep(Duration::from_secs(1)) => {
                            ticks.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                }
                Ok(())
            })
        }
    }

    /// Ignores cancellation entirely and counts while it runs.
    struct Stubborn {
        ticks: Arc<AtomicU32>,
    }

    impl ManagedTask for Stubborn {
        fn name(&self) -> &str {
            "stubborn"
        }

        fn run(&self, _leadership: CancellationToken) -> TaskFuture {
            let ticks = self.ticks.clone();
            Box::pin(async move {
                while ticks.load(Ordering::SeqCst) < u32::MAX {
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    ticks.fetch_add(1, Ordering::SeqCst);
                }
                Ok(())
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_task_runs_only_while_leading() {
        let ticks = Arc::new(AtomicU32::new(0));
        let runner = LeaderTaskRunner::new(Counter {
            ticks: ticks.clone(),
        });
        assert!(!runner.is_running());

        let leadership = CancellationToken::new();
        runner.on_started_leading(leadership.clone());
        assert!(runner.is_running());

        tokio::time::sleep(Duration::from_millis(3500)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 3);

        runner.on_stopped_leading();
        assert!(leadership.is_cancelled());
        assert!(!runner.is_running());
        runner.wait_drained().await;

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stubborn_task_gets_no_grace_period() {
        let ticks = Arc::new(AtomicU32::new(0));
        let runner = LeaderTaskRunner::new(Stubborn {
            ticks: ticks.clone(),
        });
        runner.on_started_leading(CancellationToken::new());
        tokio::time::sleep(Duration::from_millis(550)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 5);

        let stopped_at = tokio::time::Instant::now();
        runner.on_stopped_leading();
        runner.wait_drained().await;
        assert_eq!(stopped_at.elapsed(), Duration::ZERO);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 5);
        assert!(!runner.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_finished_handles_are_pruned_across_terms() {
        let runner = LeaderTaskRunner::new(Counter {
            ticks: Arc::new(AtomicU32::new(0)),
        });

        for _ in 0..10 {
            runner.on_started_leading(CancellationToken::new());
            tokio::time::sleep(Duration::from_millis(10)).await;
            runner.on_stopped_leading();
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let retained = runner.stopped.lock().unwrap().len();
        assert!(retained <= 1, "{} handles retained", retained);
    }

    #[tokio::test]
    async fn test_stop_without_start_is_noop() {
        let runner = LeaderTaskRunner::new(Counter {
            ticks: Arc::new(AtomicU32::new(0)),
        });
        runner.on_stopped_leading();
        runner.wait_drained().await;
        assert!(!runner.is_running());
    }
}
