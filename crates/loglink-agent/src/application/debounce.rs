//! Timer-based coalescing buffer for rapid repeated inputs.
//!
//! The enabled toggle is wired to a UI switch, and users flick switches.
//! Starting and stopping mDNS browsing on every intermediate flick would
//! thrash the network stack, so submissions are coalesced: last value wins,
//! delivered once after a quiet window with no newer submission.
//!
//! Single task, no shared mutable state; the worker owns the pending value
//! and the timer, callers only send.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Coalesces bursts of values into one delayed action call.
pub struct Debouncer<T: Send + 'static> {
    tx: mpsc::UnboundedSender<T>,
    worker: JoinHandle<()>,
}

impl<T: Send + 'static> Debouncer<T> {
    /// Spawns the worker.  `action` runs on the tokio runtime with the most
    /// recent value once `quiet` elapses without a newer submission.
    pub fn new<F>(quiet: Duration, mut action: F) -> Self
    where
        F: FnMut(T) + Send + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<T>();
        let worker = tokio::spawn(async move {
            while let Some(mut latest) = rx.recv().await {
                loop {
                    match tokio::time::timeout(quiet, rx.recv()).await {
                        // A newer value arrived inside the window: restart it.
                        Ok(Some(newer)) => latest = newer,
                        // Channel closed: flush what we have and exit.
                        Ok(None) => {
                            action(latest);
                            return;
                        }
                        // Quiet window elapsed: deliver.
                        Err(_) => {
                            action(latest);
                            break;
                        }
                    }
                }
            }
        });
        Self { tx, worker }
    }

    /// Submits a value.  Any value already pending is silently replaced.
    pub fn submit(&self, value: T) {
        // Send only fails when the worker is gone, i.e. during teardown.
        let _ = self.tx.send(value);
    }
}

impl<T: Send + 'static> Drop for Debouncer<T> {
    fn drop(&mut self) {
        self.worker.abort();
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    #[tokio::test]
    async fn test_single_submission_is_delivered() {
        let delivered = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&delivered);
        let debouncer = Debouncer::new(Duration::from_millis(20), move |v: u32| {
            sink.lock().unwrap().push(v);
        });

        debouncer.submit(7);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(*delivered.lock().unwrap(), vec![7]);
    }

    #[tokio::test]
    async fn test_burst_collapses_to_last_value() {
        let delivered = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&delivered);
        let debouncer = Debouncer::new(Duration::from_millis(50), move |v: bool| {
            sink.lock().unwrap().push(v);
        });

        // Three toggles well inside one quiet window.
        debouncer.submit(true);
        debouncer.submit(false);
        debouncer.submit(true);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(
            *delivered.lock().unwrap(),
            vec![true],
            "exactly one action, matching the last submission"
        );
    }

    #[tokio::test]
    async fn test_separate_bursts_deliver_separately() {
        let count = Arc::new(AtomicUsize::new(0));
        let sink = Arc::clone(&count);
        let debouncer = Debouncer::new(Duration::from_millis(20), move |_: u32| {
            sink.fetch_add(1, Ordering::SeqCst);
        });

        debouncer.submit(1);
        tokio::time::sleep(Duration::from_millis(80)).await;
        debouncer.submit(2);
        tokio::time::sleep(Duration::from_millis(80)).await;

        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_submission_inside_window_restarts_it() {
        let delivered = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&delivered);
        let debouncer = Debouncer::new(Duration::from_millis(60), move |v: u32| {
            sink.lock().unwrap().push(v);
        });

        debouncer.submit(1);
        tokio::time::sleep(Duration::from_millis(30)).await;
        // Still inside the window: replaces the pending value, restarts timer.
        debouncer.submit(2);
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(
            delivered.lock().unwrap().is_empty(),
            "window restarted, nothing delivered yet"
        );

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(*delivered.lock().unwrap(), vec![2]);
    }
}
