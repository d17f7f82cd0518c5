//! Entry/exit engine.
//!
//! One pass walks every tracked symbol: reserved records get the entry
//! rule, open positions get the stop-decision engine. Per-symbol failures
//! are contained so one bad symbol never starves the rest of the pass.

use crate::application::services::exit_executor::execute_exit;
use crate::application::services::fees::fees_in_quote;
use crate::application::TradingDeps;
use crate::config::TradingConfig;
use crate::domain::entities::candle::closes;
use crate::domain::entities::symbol_record::{OpenPosition, SymbolState};
use crate::domain::errors::GatewayError;
use crate::domain::services::indicators::ema;
use crate::domain::services::registry::AdmitOutcome;
use crate::domain::services::stop_engine::decide_exit;
use crate::domain::services::strategies::{entry_signal, EntrySignal};
use futures_util::stream::{self, StreamExt};
use tracing::{debug, info, warn};

/// In-flight sub-evaluations per pass. The gateway's call gate still
/// bounds actual venue traffic; this only caps future buildup.
const FANOUT: usize = 8;

pub async fn monitor_pass(deps: &TradingDeps) -> Result<(), GatewayError> {
    let cfg = deps.config.snapshot();
    let symbols = deps.registry.tracked_symbols();
    stream::iter(symbols)
        .for_each_concurrent(FANOUT, |symbol| {
            let cfg = &cfg;
            async move {
                let result = match deps.registry.get(&symbol) {
                    Some(state) if state.is_reserved() => {
                        evaluate_entry(deps, cfg, &symbol).await
                    }
                    Some(SymbolState::Bought(_)) => evaluate_exit(deps, cfg, &symbol).await,
                    _ => Ok(()),
                };
                if let Err(e) = result {
                    warn!(symbol, error = %e, "symbol evaluation failed, continuing pass");
                }
            }
        })
        .await;
    Ok(())
}

async fn evaluate_entry(
    deps: &TradingDeps,
    cfg: &TradingConfig,
    symbol: &str,
) -> Result<(), GatewayError> {
    if deps.entry_throttle.is_active() {
        return Ok(());
    }
    let params = &cfg.entry;
    let bars = deps
        .gateway
        .klines(symbol, &cfg.entry_interval, params.min_bars + 10)
        .await?;

    match entry_signal(&bars, params) {
        EntrySignal::Wait => return Ok(()),
        EntrySignal::Purge => {
            debug!(symbol, "trend filter failed, purging candidate");
            deps.registry.remove(symbol);
            return Ok(());
        }
        EntrySignal::Enter => {}
    }

    let info = match deps.gateway.symbol_info(symbol).await? {
        Some(info) => info,
        None => {
            warn!(symbol, "candidate no longer tradable, purging");
            deps.registry.remove(symbol);
            return Ok(());
        }
    };
    if cfg.entry_quote < info.min_notional {
        warn!(
            symbol,
            entry_quote = cfg.entry_quote,
            min_notional = info.min_notional,
            "entry size cannot satisfy venue minimum, purging"
        );
        deps.registry.remove(symbol);
        return Ok(());
    }

    match deps.registry.try_admit(symbol, cfg.max_open) {
        AdmitOutcome::Admitted => {}
        AdmitOutcome::CapacityFull => {
            debug!(symbol, "open-position ceiling reached, candidate waits");
            return Ok(());
        }
        AdmitOutcome::NotReserved => return Ok(()),
    }

    match deps.gateway.market_buy_quote(symbol, cfg.entry_quote).await {
        Ok(fill) => {
            let fees = match fees_in_quote(deps.gateway.as_ref(), &fill.fills, &cfg.quote_asset)
                .await
            {
                Ok(f) => f,
                Err(e) => {
                    warn!(symbol, error = %e, "fee conversion failed, booking zero fees");
                    0.0
                }
            };
            let entry_cost = fill.cumulative_quote + fees;
            let position = match OpenPosition::opened(
                fill.average_price(),
                entry_cost,
                fill.executed_quantity,
                cfg.stops.delta,
            ) {
                Ok(pos) => pos,
                Err(e) => {
                    warn!(symbol, error = %e, "unusable fill, dropping record");
                    deps.registry.remove(symbol);
                    return Ok(());
                }
            };
            info!(
                symbol,
                price = position.entry_price,
                cost = entry_cost,
                quantity = position.quantity,
                "position opened"
            );
            notify(
                deps,
                &format!(
                    "🟢 {symbol} bought: {:.6} @ {:.6}, cost {entry_cost:.2} {}",
                    position.quantity, position.entry_price, cfg.quote_asset
                ),
            )
            .await;
            deps.registry.confirm_buy(symbol, position);
            Ok(())
        }
        Err(GatewayError::InsufficientBalance) => {
            warn!(symbol, "insufficient balance, pausing entries venue-wide");
            deps.registry.remove(symbol);
            deps.entry_throttle.arm(cfg.no_balance_cooldown);
            notify(
                deps,
                &format!(
                    "⛔ {symbol}: insufficient balance, entries paused {}s",
                    cfg.no_balance_cooldown.as_secs()
                ),
            )
            .await;
            Ok(())
        }
        Err(e) if e.is_transient() => {
            deps.registry.rollback_admit(symbol);
            Err(e)
        }
        Err(e) => {
            warn!(symbol, error = %e, "venue rejected buy, purging candidate");
            deps.registry.remove(symbol);
            deps.exclusions.exclude_for(symbol, cfg.exclusion_cooldown());
            notify(deps, &format!("❌ {symbol}: buy rejected ({e})")).await;
            Ok(())
        }
    }
}

async fn evaluate_exit(
    deps: &TradingDeps,
    cfg: &TradingConfig,
    symbol: &str,
) -> Result<(), GatewayError> {
    let price = deps.gateway.last_price(symbol).await?;
    let trend_ref = trend_reference(deps, cfg, symbol).await;

    // Decision and in-flight guard are taken in one registry critical
    // section; a concurrent reconciliation pass sees exit_in_flight set.
    let triggered = deps
        .registry
        .update_bought(symbol, |pos| {
            if pos.exit_in_flight {
                return None;
            }
            let quantity = pos.quantity;
            let decision = decide_exit(pos, quantity, price, trend_ref, &cfg.stops);
            if let Some(reason) = decision {
                pos.exit_in_flight = true;
                pos.exit_reason = Some(reason);
            }
            decision
        })
        .flatten();

    if let Some(reason) = triggered {
        execute_exit(deps, symbol, &reason.to_string(), None).await?;
    }
    Ok(())
}

/// Latest pullback EMA, shared with reconciliation so both exit paths
/// apply the same trend rule. `None` when bars are unavailable; stops
/// still run on price alone.
pub(crate) async fn trend_reference(
    deps: &TradingDeps,
    cfg: &TradingConfig,
    symbol: &str,
) -> Option<f64> {
    match deps
        .gateway
        .klines(symbol, &cfg.entry_interval, cfg.entry.min_bars)
        .await
    {
        Ok(bars) if !bars.is_empty() => ema(&closes(&bars), cfg.entry.pullback_ema).last().copied(),
        Ok(_) => None,
        Err(e) => {
            warn!(symbol, error = %e, "trend reference unavailable this cycle");
            None
        }
    }
}

async fn notify(deps: &TradingDeps, text: &str) {
    if let Err(e) = deps.notifier.send(text).await {
        warn!(error = %e, "notification dropped");
    }
}
