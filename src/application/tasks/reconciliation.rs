//! Balance reconciliation.
//!
//! The venue's account balance is authoritative. Each pass enumerates
//! non-quote holdings and merges them into the registry: dust and
//! non-tradable assets shed their candidate records, tracked positions
//! are re-checked against the stop engine with the externally observed
//! quantity, and sizeable untracked holdings are adopted as protected
//! positions rather than left unmanaged.

use crate::application::services::exit_executor::execute_exit;
use crate::application::tasks::monitor::trend_reference;
use crate::application::TradingDeps;
use crate::config::TradingConfig;
use crate::domain::entities::balance::AssetBalance;
use crate::domain::entities::symbol_record::{OpenPosition, SymbolState};
use crate::domain::errors::GatewayError;
use crate::domain::services::stop_engine::decide_exit;
use tracing::{debug, info, warn};

/// Holdings below this quote value are treated as dust.
const DUST_VALUE: f64 = 1.0;

/// Fee-reserve asset, never reconciled into a position.
const FEE_ASSET: &str = "BNB";

pub async fn reconcile_pass(deps: &TradingDeps) -> Result<(), GatewayError> {
    let cfg = deps.config.snapshot();
    let balances = deps.gateway.balances().await?;

    for balance in balances {
        if balance.asset == cfg.quote_asset || balance.asset == FEE_ASSET {
            continue;
        }
        if let Err(e) = reconcile_asset(deps, &cfg, &balance).await {
            warn!(asset = %balance.asset, error = %e, "asset reconciliation failed, continuing");
        }
    }
    Ok(())
}

async fn reconcile_asset(
    deps: &TradingDeps,
    cfg: &TradingConfig,
    balance: &AssetBalance,
) -> Result<(), GatewayError> {
    let symbol = format!("{}{}", balance.asset, cfg.quote_asset);

    // A cooling-off symbol (rejected sell, fresh exit) must not be
    // re-adopted until the exclusion lapses.
    if deps.exclusions.is_excluded(&symbol) {
        return Ok(());
    }

    let tradable = deps.gateway.symbol_info(&symbol).await?.is_some();
    if !tradable {
        if deps.registry.drop_candidate(&symbol) {
            debug!(symbol, "non-tradable, candidate dropped");
        }
        return Ok(());
    }

    let price = deps.gateway.last_price(&symbol).await?;
    // Locked amounts (open orders) still belong to the holding.
    let observed_qty = balance.total();
    let value = observed_qty * price;

    if value < DUST_VALUE {
        if deps.registry.drop_candidate(&symbol) {
            debug!(symbol, value, "dust holding, candidate dropped");
        }
        return Ok(());
    }

    match deps.registry.get(&symbol) {
        Some(SymbolState::Bought(_)) => {
            // Same stop contract as the monitor, but sized by what the
            // venue actually holds.
            let trend_ref = trend_reference(deps, cfg, &symbol).await;
            let triggered = deps
                .registry
                .update_bought(&symbol, |pos| {
                    if pos.exit_in_flight {
                        return None;
                    }
                    let decision = decide_exit(pos, observed_qty, price, trend_ref, &cfg.stops);
                    if let Some(reason) = decision {
                        pos.exit_in_flight = true;
                        pos.exit_reason = Some(reason);
                    }
                    decision
                })
                .flatten();
            if let Some(reason) = triggered {
                execute_exit(deps, &symbol, &reason.to_string(), Some(observed_qty)).await?;
            }
        }
        Some(SymbolState::Buying { .. }) => {}
        Some(_) => {}
        None => {
            if value < cfg.min_sync_value {
                return Ok(());
            }
            let position = match OpenPosition::adopted(price, observed_qty, cfg.stops.delta) {
                Ok(pos) => pos,
                Err(e) => {
                    warn!(symbol, error = %e, "unadoptable holding, skipping");
                    return Ok(());
                }
            };
            if deps.registry.adopt_position(&symbol, position) {
                info!(symbol, value, "untracked holding adopted as position");
                if let Err(e) = deps
                    .notifier
                    .send(&format!(
                        "🔄 {symbol}: untracked holding worth {value:.2} {} adopted, stop armed",
                        cfg.quote_asset
                    ))
                    .await
                {
                    warn!(error = %e, "notification dropped");
                }
            }
        }
    }
    Ok(())
}

/// Periodic liveness line with the registry's shape.
pub async fn heartbeat_pass(deps: &TradingDeps) -> Result<(), GatewayError> {
    info!(
        tracked = deps.registry.len(),
        open = deps.registry.bought_count(),
        slots = deps.registry.open_slots(),
        excluded = deps.exclusions.len(),
        "heartbeat"
    );
    Ok(())
}
