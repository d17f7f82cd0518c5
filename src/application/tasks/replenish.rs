//! Replenishment after exits.
//!
//! Every completed exit sends a freed-slot event; this task batches
//! whatever is queued and refills the candidate pool from the universe
//! slice with the breakout predicate, bounded by `freed × factor` and by
//! remaining tracking capacity.

use crate::application::tasks::discovery::scan_breakout;
use crate::application::TradingDeps;
use crate::control::Controls;
use crate::domain::errors::GatewayError;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

pub fn spawn(
    deps: TradingDeps,
    mut events: UnboundedReceiver<usize>,
    mut controls: Controls,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let freed = tokio::select! {
                _ = controls.shutdown_signalled() => return,
                event = events.recv() => match event {
                    Some(freed) => freed,
                    None => return,
                },
            };
            let mut freed = freed;
            while let Ok(more) = events.try_recv() {
                freed += more;
            }
            if controls.is_paused() {
                debug!(freed, "paused, replenish event dropped");
                continue;
            }
            if let Err(e) = replenish_pass(&deps, freed).await {
                error!(error = %e, "replenish pass failed");
            }
        }
    })
}

pub async fn replenish_pass(deps: &TradingDeps, freed: usize) -> Result<(), GatewayError> {
    let cfg = deps.config.snapshot();
    let capacity_remaining = cfg.max_tracked.saturating_sub(deps.registry.len());
    let to_add = (freed.saturating_mul(cfg.replenish_factor)).min(capacity_remaining);
    if to_add == 0 {
        return Ok(());
    }
    let added = scan_breakout(deps, to_add).await?;
    info!(freed, to_add, added, "candidate pool replenished");
    Ok(())
}
