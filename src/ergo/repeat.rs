//! Cancellable repeat-with-wait loop.
//!
//! A [`RepeatTimer`] runs an async action over a list of items, cycle after
//! cycle, sleeping between cycles. Cancellation is cooperative: it is observed
//! before each action and during the inter-cycle sleep, never in the middle of
//! an action.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::Result;

/// Repeat parameters supplied by the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepeatOptions {
    /// Number of cycles; `None` repeats until cancelled.
    pub count: Option<u32>,
    /// Pause between cycles; `None` or zero uses the dispatcher default.
    pub wait: Option<Duration>,
}

impl RepeatOptions {
    pub fn new(count: Option<u32>, wait: Option<Duration>) -> Self {
        Self { count, wait }
    }

    /// Neither a count nor a non-zero wait was given.
    pub fn is_unset(&self) -> bool {
        self.count.is_none() && self.wait.is_none_or(|wait| wait.is_zero())
    }

    /// The pause to use between cycles, falling back to `default` when the
    /// wait is absent or zero.
    pub fn wait_or(&self, default: Duration) -> Duration {
        self.wait.filter(|wait| !wait.is_zero()).unwrap_or(default)
    }
}

/// How a repeat loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepeatOutcome {
    Completed,
    Cancelled,
    Failed,
}

/// Handle to a running repeat loop.
pub struct RepeatTimer {
    cancel_tx: watch::Sender<bool>,
    done_rx: watch::Receiver<Option<RepeatOutcome>>,
    task: JoinHandle<()>,
}

impl RepeatTimer {
    /// Spawn the loop on the current runtime.
    ///
    /// `action` is awaited once per item, in order, for each cycle. If it
    /// fails the loop stops without retrying. `on_finish` runs after the loop
    /// ends on its own (completed or failed), not after cancellation.
    pub fn spawn<T, A, AF, F, FF>(items: Vec<T>, count: Option<u32>, wait: Duration, action: A, on_finish: F) -> Self
    where
        T: Clone + Send + Sync + 'static,
        A: FnMut(T) -> AF + Send + 'static,
        AF: Future<Output = Result<()>> + Send + 'static,
        F: FnOnce() -> FF + Send + 'static,
        FF: Future<Output = ()> + Send + 'static,
    {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let (done_tx, done_rx) = watch::channel(None);

        let task = tokio::spawn(async move {
            let outcome = run_cycles(items, count, wait, action, cancel_rx).await;
            debug!("Repeat loop ended: {outcome:?}");
            if outcome != RepeatOutcome::Cancelled {
                on_finish().await;
            }
            done_tx.send_replace(Some(outcome));
        });

        Self {
            cancel_tx,
            done_rx,
            task,
        }
    }

    /// Whether the loop has already stopped.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Receiver that yields the outcome once the loop has stopped.
    pub fn subscribe(&self) -> watch::Receiver<Option<RepeatOutcome>> {
        self.done_rx.clone()
    }

    /// Ask the loop to stop without waiting for it.
    pub fn request_cancel(&self) {
        let _ = self.cancel_tx.send(true);
    }

    /// Request cancellation and wait for the loop to stop.
    ///
    /// An in-flight action is allowed to complete. Cancelling a loop that has
    /// already finished is a no-op.
    pub async fn cancel(self) {
        let _ = self.cancel_tx.send(true);
        if let Err(e) = self.task.await {
            warn!("Repeat task ended abnormally: {e}");
        }
    }
}

fn is_cancelled(rx: &watch::Receiver<bool>) -> bool {
    if rx.has_changed().is_err() {
        return true;
    }
    *rx.borrow()
}

async fn run_cycles<T, A, AF>(
    items: Vec<T>,
    count: Option<u32>,
    wait: Duration,
    mut action: A,
    mut cancel_rx: watch::Receiver<bool>,
) -> RepeatOutcome
where
    T: Clone,
    A: FnMut(T) -> AF,
    AF: Future<Output = Result<()>>,
{
    let mut cycles: u32 = 0;
    loop {
        for item in &items {
            if is_cancelled(&cancel_rx) {
                return RepeatOutcome::Cancelled;
            }
            if let Err(e) = action(item.clone()).await {
                warn!("Repeat action failed, stopping: {e}");
                return RepeatOutcome::Failed;
            }
        }

        cycles = cycles.saturating_add(1);
        if count.is_some_and(|limit| cycles >= limit) {
            return RepeatOutcome::Completed;
        }

        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = cancel_rx.wait_for(|cancelled| *cancelled) => return RepeatOutcome::Cancelled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DriverError;
    use std::pin::Pin;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::sync::Mutex;
    use tokio::time::Instant;

    type Log = Arc<Mutex<Vec<(u32, Instant)>>>;

    fn recorder(log: Log) -> impl FnMut(u32) -> Pin<Box<dyn Future<Output = Result<()>> + Send>> + Send + 'static {
        move |item| {
            let log = log.clone();
            Box::pin(async move {
                log.lock().await.push((item, Instant::now()));
                Ok(())
            })
        }
    }

    #[test]
    fn test_options_unset() {
        assert!(RepeatOptions::default().is_unset());
        assert!(!RepeatOptions::new(Some(1), None).is_unset());
        assert!(!RepeatOptions::new(None, Some(Duration::from_millis(1))).is_unset());
    }

    #[test]
    fn test_zero_wait_counts_as_unset() {
        assert!(RepeatOptions::new(None, Some(Duration::ZERO)).is_unset());
        assert!(!RepeatOptions::new(Some(3), Some(Duration::ZERO)).is_unset());
    }

    #[test]
    fn test_wait_or_default() {
        let default = Duration::from_millis(300);
        assert_eq!(RepeatOptions::default().wait_or(default), default);
        assert_eq!(RepeatOptions::new(None, Some(Duration::ZERO)).wait_or(default), default);
        assert_eq!(
            RepeatOptions::new(None, Some(Duration::from_secs(2))).wait_or(default),
            Duration::from_secs(2)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_bounded_cycles_with_wait() {
        let log: Log = Arc::default();
        let finished = Arc::new(AtomicBool::new(false));
        let flag = finished.clone();

        let timer = RepeatTimer::spawn(
            vec![1, 2, 3],
            Some(2),
            Duration::from_millis(500),
            recorder(log.clone()),
            move || async move { flag.store(true, Ordering::SeqCst) },
        );
        let mut done = timer.subscribe();
        done.wait_for(|o| o.is_some()).await.unwrap();

        let log = log.lock().await;
        let items: Vec<u32> = log.iter().map(|(i, _)| *i).collect();
        assert_eq!(items, vec![1, 2, 3, 1, 2, 3]);
        let pause = log[3].1 - log[2].1;
        assert!(pause >= Duration::from_millis(500) && pause < Duration::from_millis(600));
        assert_eq!(log[2].1 - log[0].1, Duration::ZERO);
        assert!(finished.load(Ordering::SeqCst));
        assert_eq!(*done.borrow(), Some(RepeatOutcome::Completed));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_wait_stops_next_write() {
        let log: Log = Arc::default();
        let timer = RepeatTimer::spawn(vec![9], None, Duration::from_secs(10), recorder(log.clone()), || async {});

        tokio::time::sleep(Duration::from_secs(15)).await;
        timer.cancel().await;
        let writes = log.lock().await.len();
        assert_eq!(writes, 2);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(log.lock().await.len(), writes);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_lets_in_flight_action_finish() {
        let log: Log = Arc::default();
        let slow_log = log.clone();
        let timer = RepeatTimer::spawn(
            vec![1, 2],
            None,
            Duration::ZERO,
            move |item| {
                let log = slow_log.clone();
                async move {
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    log.lock().await.push((item, Instant::now()));
                    Ok::<(), DriverError>(())
                }
            },
            || async {},
        );

        tokio::time::sleep(Duration::from_millis(500)).await;
        timer.cancel().await;

        let items: Vec<u32> = log.lock().await.iter().map(|(i, _)| *i).collect();
        assert_eq!(items, vec![1]);
    }

    #[tokio::test]
    async fn test_cancel_after_completion_is_noop() {
        let log: Log = Arc::default();
        let timer = RepeatTimer::spawn(vec![1], Some(1), Duration::ZERO, recorder(log.clone()), || async {});
        timer.subscribe().wait_for(|o| o.is_some()).await.unwrap();
        assert!(timer.is_finished());
        timer.cancel().await;
        assert_eq!(log.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn test_failure_stops_loop() {
        let attempts = Arc::new(Mutex::new(0u32));
        let counter = attempts.clone();
        let finished = Arc::new(AtomicBool::new(false));
        let flag = finished.clone();

        let timer = RepeatTimer::spawn(
            vec![1, 2, 3],
            None,
            Duration::ZERO,
            move |_| {
                let counter = counter.clone();
                async move {
                    *counter.lock().await += 1;
                    Err::<(), _>(DriverError::ConnectionFailed("closed".to_string()))
                }
            },
            move || async move { flag.store(true, Ordering::SeqCst) },
        );
        let mut done = timer.subscribe();
        done.wait_for(|o| o.is_some()).await.unwrap();

        assert_eq!(*attempts.lock().await, 1);
        assert_eq!(*done.borrow(), Some(RepeatOutcome::Failed));
        assert!(finished.load(Ordering::SeqCst));
    }
}
