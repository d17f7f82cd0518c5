//! The shared sell sequence.
//!
//! Monitor, reconciliation, and shutdown liquidation all close positions
//! through this one path so the safety rules cannot drift apart: re-derive
//! the sellable quantity from the venue's free balance, round to the lot
//! step, refuse dust, and on completion notify, persist, remove, and arm
//! the re-discovery cooldown.

use crate::application::services::fees::fees_in_quote;
use crate::application::TradingDeps;
use crate::domain::entities::symbol_record::SymbolState;
use crate::domain::errors::GatewayError;
use crate::domain::repositories::SaleRecord;
use crate::domain::value_objects::quantity::round_down_to_step;
use chrono::Utc;
use tracing::{error, info, warn};

/// What happened to the position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitOutcome {
    Sold,
    /// Below lot-step/notional minimums; record dropped, nothing sold.
    AbortedDust,
    /// Record was not an open position (already closed elsewhere).
    NotOpen,
}

/// Close the position behind `symbol`. `observed_quantity` overrides the
/// tracked quantity when the caller has fresher balance data
/// (reconciliation). Errors bubble up to the caller's next pass; any
/// error releases the in-flight guard first, so a failed step can never
/// leave the position permanently unsellable.
pub async fn execute_exit(
    deps: &TradingDeps,
    symbol: &str,
    reason_label: &str,
    observed_quantity: Option<f64>,
) -> Result<ExitOutcome, GatewayError> {
    let result = run_exit(deps, symbol, reason_label, observed_quantity).await;
    if result.is_err() {
        // The record stays open; clear the guard so the next cycle
        // re-evaluates the stop and retries the sell.
        deps.registry.update_bought(symbol, |p| p.exit_in_flight = false);
    }
    result
}

async fn run_exit(
    deps: &TradingDeps,
    symbol: &str,
    reason_label: &str,
    observed_quantity: Option<f64>,
) -> Result<ExitOutcome, GatewayError> {
    let cfg = deps.config.snapshot();

    let position = match deps.registry.get(symbol) {
        Some(SymbolState::Bought(pos)) => pos,
        _ => return Ok(ExitOutcome::NotOpen),
    };
    let tracked_qty = observed_quantity.unwrap_or(position.quantity);

    let info = match deps.gateway.symbol_info(symbol).await? {
        Some(info) => info,
        None => {
            warn!(symbol, "symbol no longer tradable, dropping position record");
            deps.registry.remove(symbol);
            deps.exclusions.exclude_for(symbol, cfg.exclusion_cooldown());
            return Ok(ExitOutcome::AbortedDust);
        }
    };

    // Never trust only the in-memory quantity.
    let free = deps.gateway.free_balance(&info.base_asset).await?;
    let sellable = round_down_to_step(tracked_qty.min(free), info.step_size);
    let price = deps.gateway.last_price(symbol).await?;

    if sellable <= 0.0 || sellable * price < info.min_notional {
        warn!(
            symbol,
            sellable,
            price,
            min_notional = info.min_notional,
            "sell below venue minimums, dropping record"
        );
        notify(deps, &format!("⚠️ {symbol}: holding too small to sell, dropped")).await;
        deps.registry.remove(symbol);
        deps.exclusions.exclude_for(symbol, cfg.exclusion_cooldown());
        return Ok(ExitOutcome::AbortedDust);
    }

    let fill = match deps.gateway.market_sell(symbol, sellable).await {
        Ok(fill) => fill,
        Err(e) if e.is_transient() => return Err(e),
        Err(e) => {
            error!(symbol, error = %e, "venue rejected sell, dropping record");
            notify(deps, &format!("❌ {symbol}: sell rejected ({e}), dropped")).await;
            deps.registry.remove(symbol);
            deps.exclusions.exclude_for(symbol, cfg.exclusion_cooldown());
            return Ok(ExitOutcome::AbortedDust);
        }
    };

    let proceeds = fill.cumulative_quote;
    let fees = match fees_in_quote(deps.gateway.as_ref(), &fill.fills, &cfg.quote_asset).await {
        Ok(f) => f,
        Err(e) => {
            warn!(symbol, error = %e, "fee conversion failed, booking zero fees");
            0.0
        }
    };
    let pnl = proceeds - fees - position.entry_cost;
    let pnl_pct = if position.entry_cost > 0.0 {
        pnl / position.entry_cost * 100.0
    } else {
        0.0
    };

    info!(
        symbol,
        reason = reason_label,
        proceeds,
        fees,
        pnl,
        pnl_pct,
        "position closed"
    );
    notify(
        deps,
        &format!(
            "💰 {symbol} sold ({reason_label}): {proceeds:.2} {q}, PnL {pnl:+.2} {q} ({pnl_pct:+.2}%)",
            q = cfg.quote_asset
        ),
    )
    .await;

    let record = SaleRecord {
        symbol: symbol.to_string(),
        quantity: fill.executed_quantity,
        entry_cost: position.entry_cost,
        proceeds,
        fees_quote: fees,
        pnl,
        reason: reason_label.to_string(),
        synced: position.synced,
        executed_at: Utc::now(),
    };
    if let Err(e) = deps.ledger.record_sale(&record).await {
        error!(symbol, error = %e, "failed to append sale to ledger");
    }

    deps.registry.remove(symbol);
    deps.exclusions.exclude_for(symbol, cfg.exclusion_cooldown());
    let _ = deps.replenish.send(1);
    Ok(ExitOutcome::Sold)
}

async fn notify(deps: &TradingDeps, text: &str) {
    if let Err(e) = deps.notifier.send(text).await {
        warn!(error = %e, "notification dropped");
    }
}
