//! Supervised periodic task loops.
//!
//! Every long-running pipeline runs as one spawned task executing a pass
//! on a fixed cadence. A pass that returns an error is logged and the
//! loop keeps going; repeated consecutive failures back the loop off
//! (bounded), so a venue outage cannot turn into a hot retry spin. Pause
//! is checked before each pass, shutdown between passes.

use crate::control::Controls;
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

const MAX_BACKOFF: Duration = Duration::from_secs(300);

/// Spawn a named supervised loop. `pass` is invoked once per tick and
/// may fail without killing the loop.
pub fn spawn_loop<F, Fut, E>(
    name: &'static str,
    every: Duration,
    start_delay: Duration,
    mut controls: Controls,
    mut pass: F,
) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), E>> + Send,
    E: std::fmt::Display,
{
    tokio::spawn(async move {
        if !start_delay.is_zero() {
            tokio::select! {
                _ = tokio::time::sleep(start_delay) => {}
                _ = controls.shutdown_signalled() => {}
            }
        }
        let mut failures: u32 = 0;
        loop {
            if controls.is_shutdown() {
                info!(task = name, "shutdown, loop exiting");
                return;
            }
            if controls.is_paused() {
                debug!(task = name, "paused, skipping pass");
            } else {
                match pass().await {
                    Ok(()) => failures = 0,
                    Err(e) => {
                        failures = failures.saturating_add(1);
                        error!(task = name, failures, error = %e, "pass failed");
                    }
                }
            }
            let wait = backoff_delay(every, failures);
            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = controls.shutdown_signalled() => {}
            }
        }
    })
}

/// Base cadence stretched by consecutive failures, capped.
fn backoff_delay(every: Duration, failures: u32) -> Duration {
    if failures == 0 {
        return every;
    }
    let factor = 1u32 << failures.min(4);
    (every * factor).min(MAX_BACKOFF.max(every))
}
