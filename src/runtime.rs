//! Timing primitives for the selector's async boundaries.
//!
//! Everything runs on one cooperative event loop; the only timers are the
//! search debounce and the map's settle delay. Both must be cancellable so
//! nothing fires after the selector is torn down.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::oneshot;

/// Locks a mutex, recovering the data if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Installs `env_logger` as the `log` backend, honouring `RUST_LOG` and
/// defaulting to `default_filter`. Safe to call more than once.
#[cfg(feature = "debug")]
pub fn init_logging(default_filter: &str) {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .try_init();
}

/// A pending debounce slot: its generation and the signal that cancels it.
struct Pending {
    generation: u64,
    cancel: oneshot::Sender<()>,
}

/// Explicit cancellable debounce timer.
///
/// Each [`Debouncer::wait`] cancels the wait still pending from an earlier
/// call before starting its own quiet window, so only the last call in a
/// burst resolves to `true`.
pub struct Debouncer {
    window: Duration,
    pending: Mutex<Option<Pending>>,
    generation: Mutex<u64>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: Mutex::new(None),
            generation: Mutex::new(0),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Waits out the quiet window. Returns `false` if a later `wait` or a
    /// [`Debouncer::cancel`] superseded this one before it elapsed.
    pub async fn wait(&self) -> bool {
        let (cancel_tx, cancel_rx) = oneshot::channel::<()>();
        let generation = {
            let mut counter = lock(&self.generation);
            *counter += 1;
            *counter
        };

        if let Some(previous) = lock(&self.pending).replace(Pending {
            generation,
            cancel: cancel_tx,
        }) {
            log::trace!("debounce: cancelling pending wait #{}", previous.generation);
            let _ = previous.cancel.send(());
        }

        tokio::select! {
            biased;
            _ = cancel_rx => false,
            _ = tokio::time::sleep(self.window) => {
                let mut pending = lock(&self.pending);
                if pending.as_ref().map(|p| p.generation) == Some(generation) {
                    pending.take();
                }
                true
            }
        }
    }

    /// Cancels the pending wait, if any.
    pub fn cancel(&self) {
        if let Some(pending) = lock(&self.pending).take() {
            log::debug!("debounce: cancelled wait #{}", pending.generation);
            let _ = pending.cancel.send(());
        }
    }

    pub fn is_pending(&self) -> bool {
        lock(&self.pending).is_some()
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_single_wait_elapses() {
        let debouncer = Debouncer::new(Duration::from_millis(300));
        assert!(debouncer.wait().await);
        assert!(!debouncer.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_later_wait_supersedes_earlier() {
        let debouncer = Debouncer::new(Duration::from_millis(300));

        let first = debouncer.wait();
        let second = async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            debouncer.wait().await
        };

        let (first, second) = tokio::join!(first, second);
        assert!(!first);
        assert!(second);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_pending_wait() {
        let debouncer = Debouncer::new(Duration::from_millis(300));

        let waiting = debouncer.wait();
        let cancel = async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            debouncer.cancel();
        };

        let (fired, ()) = tokio::join!(waiting, cancel);
        assert!(!fired);
        assert!(!debouncer.is_pending());
    }
}
