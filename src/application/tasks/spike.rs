//! Buy-spike discovery.
//!
//! Looks only at the most recent bar of each universe symbol: heavy quote
//! volume dominated by taker buys reserves the symbol as a fresh-listing
//! style candidate. A per-symbol re-trigger cooldown stops the same spike
//! from reserving, exiting, and reserving again in quick succession.

use crate::application::TradingDeps;
use crate::domain::entities::symbol_record::SymbolState;
use crate::domain::errors::GatewayError;
use crate::domain::services::registry::ExclusionList;
use crate::domain::services::strategies::{is_buy_spike, SpikeParams, StrategyKind};
use std::sync::Arc;
use tracing::{info, warn};

pub async fn spike_pass(
    deps: &TradingDeps,
    recent_triggers: &Arc<ExclusionList>,
) -> Result<(), GatewayError> {
    let cfg = deps.config.snapshot();
    if !cfg.strategies.contains(&StrategyKind::BuySpike) {
        return Ok(());
    }
    let params = SpikeParams {
        min_quote_volume: cfg.spike_min_quote_volume,
        min_buy_ratio: cfg.spike_min_taker_ratio,
    };
    let universe = deps.gateway.universe().await?;

    for symbol in universe.iter().take(cfg.universe_top) {
        if deps.registry.contains(symbol)
            || deps.exclusions.is_excluded(symbol)
            || recent_triggers.is_excluded(symbol)
        {
            continue;
        }
        let bars = match deps.gateway.klines(symbol, &cfg.entry_interval, 1).await {
            Ok(bars) => bars,
            Err(e) => {
                warn!(symbol, error = %e, "kline fetch failed, skipping symbol");
                continue;
            }
        };
        let last = match bars.last() {
            Some(bar) => bar,
            None => continue,
        };
        if !is_buy_spike(last, &params) {
            continue;
        }
        recent_triggers.exclude_for(symbol, cfg.spike_retrigger_cooldown);
        if deps
            .registry
            .insert_candidate(symbol, SymbolState::ReservedNew, cfg.max_tracked)
        {
            info!(symbol, quote_volume = last.quote_volume, "buy spike reserved");
            if let Err(e) = deps
                .notifier
                .send(&format!("🚀 {symbol}: taker-buy spike, reserved for entry"))
                .await
            {
                warn!(error = %e, "notification dropped");
            }
        }
    }
    Ok(())
}
