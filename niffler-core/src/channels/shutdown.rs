//! Level-triggered shutdown signal shared by every worker.

use tokio::sync::watch;

/// Broadcasts a single level-triggered "shutting down" flag. Unlike a
/// one-shot channel, every subscriber created before or after shutdown was
/// signaled observes the current value, so a worker that starts late never
/// misses it.
#[derive(Clone)]
pub struct Shutdown {
    tx: watch::Sender<bool>,
}

impl Shutdown {
    pub fn new() -> (Self, ShutdownHandle) {
        let (tx, rx) = watch::channel(false);
        let handle = ShutdownHandle { rx: rx.clone() };
        (Self { tx }, handle)
    }

    /// Signals shutdown. Idempotent; later calls are no-ops.
    pub fn trigger(&self) {
        let _ = self.tx.send(true);
    }

    pub fn handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            rx: self.tx.subscribe(),
        }
    }
}

/// A worker's read-only view of the shutdown flag.
#[derive(Clone)]
pub struct ShutdownHandle {
    rx: watch::Receiver<bool>,
}

impl ShutdownHandle {
    pub fn is_shutting_down(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once shutdown has been signaled. Safe to call repeatedly
    /// and to race against a mailbox receive in `tokio::select!`.
    pub async fn wait(&mut self) {
        loop {
            if *self.rx.borrow() {
                return;
            }
            if self.rx.changed().await.is_err() {
                // Sender dropped: treat as shutdown so workers don't spin forever.
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn handle_created_after_trigger_observes_shutdown() {
        let (signal, _first) = Shutdown::new();
        signal.trigger();
        let handle = signal.handle();
        assert!(handle.is_shutting_down());
    }

    #[tokio::test]
    async fn wait_resolves_once_triggered() {
        let (signal, mut handle) = Shutdown::new();
        let waiter = tokio::spawn(async move {
            handle.wait().await;
        });
        signal.trigger();
        tokio::time::timeout(std::time::Duration::from_secs(1), waiter)
            .await
            .expect("wait should resolve promptly")
            .unwrap();
    }
}
