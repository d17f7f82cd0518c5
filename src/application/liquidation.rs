//! Best-effort shutdown liquidation.
//!
//! On shutdown every open position is closed through the normal exit
//! path. Failures are logged and skipped; this must never block process
//! exit indefinitely.

use crate::application::services::exit_executor::{execute_exit, ExitOutcome};
use crate::application::TradingDeps;
use crate::domain::entities::symbol_record::SymbolState;
use tracing::{error, info, warn};

const LIQUIDATION_LABEL: &str = "LIQUIDATION";

pub async fn liquidate_all(deps: &TradingDeps) {
    let symbols = deps.registry.tracked_symbols();
    let mut sold = 0usize;
    for symbol in symbols {
        match deps.registry.get(&symbol) {
            Some(SymbolState::Bought(_)) => {}
            _ => continue,
        }
        let claimed = deps
            .registry
            .update_bought(&symbol, |pos| {
                if pos.exit_in_flight {
                    false
                } else {
                    pos.exit_in_flight = true;
                    true
                }
            })
            .unwrap_or(false);
        if !claimed {
            continue;
        }
        match execute_exit(deps, &symbol, LIQUIDATION_LABEL, None).await {
            Ok(ExitOutcome::Sold) => sold += 1,
            Ok(outcome) => warn!(symbol, ?outcome, "liquidation did not sell"),
            Err(e) => error!(symbol, error = %e, "liquidation sell failed"),
        }
    }
    info!(sold, "shutdown liquidation finished");
    if sold > 0 {
        if let Err(e) = deps
            .notifier
            .send(&format!("🛑 shutdown: liquidated {sold} position(s)"))
            .await
        {
            warn!(error = %e, "notification dropped");
        }
    }
}
