//! Pause / shutdown signal pair shared by every task.
//!
//! Both flags are `tokio::sync::watch` channels so tasks can either poll
//! them at the top of a pass or await a change. Pause stops new passes
//! from starting; in-flight work always completes. Shutdown makes each
//! loop exit after its current pass.

use tokio::sync::watch;

#[derive(Clone)]
pub struct Controls {
    pause_rx: watch::Receiver<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

pub struct ControlHandle {
    pause_tx: watch::Sender<bool>,
    shutdown_tx: watch::Sender<bool>,
}

pub fn controls() -> (ControlHandle, Controls) {
    let (pause_tx, pause_rx) = watch::channel(false);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    (
        ControlHandle {
            pause_tx,
            shutdown_tx,
        },
        Controls {
            pause_rx,
            shutdown_rx,
        },
    )
}

impl Controls {
    pub fn is_paused(&self) -> bool {
        *self.pause_rx.borrow()
    }

    pub fn is_shutdown(&self) -> bool {
        *self.shutdown_rx.borrow()
    }

    /// Resolves when shutdown is signalled. Used inside `tokio::select!`
    /// against interval sleeps so shutdown is not delayed by a full tick.
    pub async fn shutdown_signalled(&mut self) {
        while !*self.shutdown_rx.borrow() {
            if self.shutdown_rx.changed().await.is_err() {
                return;
            }
        }
    }
}

impl ControlHandle {
    pub fn pause(&self) {
        let _ = self.pause_tx.send(true);
    }

    pub fn resume(&self) {
        let _ = self.pause_tx.send(false);
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_start_cleared() {
        let (_handle, controls) = controls();
        assert!(!controls.is_paused());
        assert!(!controls.is_shutdown());
    }

    #[test]
    fn pause_resume_roundtrip() {
        let (handle, controls) = controls();
        handle.pause();
        assert!(controls.is_paused());
        handle.resume();
        assert!(!controls.is_paused());
    }

    #[tokio::test]
    async fn shutdown_wakes_waiters() {
        let (handle, controls) = controls();
        let mut waiter = controls.clone();
        let task = tokio::spawn(async move { waiter.shutdown_signalled().await });
        handle.shutdown();
        task.await.unwrap();
        assert!(controls.is_shutdown());
    }
}
