//! Two-stage moving-average crossover discovery.
//!
//! Stage one scans a slow timeframe for fast lines climbing toward the
//! slow line from below and parks them as `PreCross`. Stage two re-checks
//! tracked pre-cross symbols on a faster timeframe and promotes them to
//! `Reserved` once the cross has actually printed within the freshness
//! window. The confirm stage also watches a small top-of-universe slice
//! so a cross on an untracked symbol is not missed between stage-one
//! passes; those enter as `PreCross` and promote on the next pass.

use crate::application::TradingDeps;
use crate::domain::entities::candle::closes;
use crate::domain::entities::symbol_record::SymbolState;
use crate::domain::errors::GatewayError;
use crate::domain::services::strategies::{crossover_signal, CrossSignal, CrossoverParams, StrategyKind};
use tracing::{debug, info, warn};

pub async fn pre_cross_pass(deps: &TradingDeps) -> Result<(), GatewayError> {
    let cfg = deps.config.snapshot();
    if !cfg.strategies.contains(&StrategyKind::Crossover) {
        return Ok(());
    }
    let params = &cfg.crossover;
    let universe = deps.gateway.universe().await?;

    for symbol in universe.iter().take(cfg.universe_top) {
        if deps.registry.contains(symbol) || deps.exclusions.is_excluded(symbol) {
            continue;
        }
        let signal = match signal_for(deps, symbol, &cfg.pre_cross_interval, params).await {
            Some(s) => s,
            None => continue,
        };
        if signal == CrossSignal::Approaching
            && deps
                .registry
                .insert_candidate(symbol, SymbolState::PreCross, cfg.max_tracked)
        {
            debug!(symbol, "pre-cross tracked");
        }
    }
    Ok(())
}

pub async fn confirm_pass(deps: &TradingDeps) -> Result<(), GatewayError> {
    let cfg = deps.config.snapshot();
    if !cfg.strategies.contains(&StrategyKind::Crossover) {
        return Ok(());
    }
    let params = &cfg.crossover;

    // Tracked pre-cross symbols first: promote or keep waiting.
    for symbol in deps.registry.symbols_in_pre_cross() {
        match signal_for(deps, &symbol, &cfg.confirm_interval, params).await {
            Some(CrossSignal::Crossed { bars_ago }) => {
                if deps.registry.promote_pre_cross(&symbol) {
                    info!(symbol, bars_ago, "crossover confirmed, reserved");
                    if let Err(e) = deps
                        .notifier
                        .send(&format!("✳️ {symbol}: crossover confirmed, reserved"))
                        .await
                    {
                        warn!(error = %e, "notification dropped");
                    }
                }
            }
            _ => {}
        }
    }

    // Fresh crosses on untracked symbols near the top of the universe.
    let universe = deps.gateway.universe().await?;
    for symbol in universe.iter().take(cfg.confirm_slice) {
        if deps.registry.contains(symbol) || deps.exclusions.is_excluded(symbol) {
            continue;
        }
        if let Some(CrossSignal::Crossed { .. }) =
            signal_for(deps, symbol, &cfg.confirm_interval, params).await
        {
            if deps
                .registry
                .insert_candidate(symbol, SymbolState::PreCross, cfg.max_tracked)
            {
                debug!(symbol, "fresh cross on untracked symbol, tracking");
            }
        }
    }
    Ok(())
}

async fn signal_for(
    deps: &TradingDeps,
    symbol: &str,
    interval: &str,
    params: &CrossoverParams,
) -> Option<CrossSignal> {
    let bars = match deps
        .gateway
        .klines(symbol, interval, params.min_bars + 10)
        .await
    {
        Ok(bars) => bars,
        Err(e) => {
            warn!(symbol, error = %e, "kline fetch failed, skipping symbol");
            return None;
        }
    };
    Some(crossover_signal(&closes(&bars), params))
}
