//! Breakout discovery scan.
//!
//! Walks the ranked universe slice and reserves symbols whose latest bar
//! breaks above the upper Bollinger band on elevated volume. The same
//! scan, bounded, is reused by replenishment after an exit frees a slot.

use crate::application::TradingDeps;
use crate::domain::entities::symbol_record::SymbolState;
use crate::domain::errors::GatewayError;
use crate::domain::services::strategies::{is_breakout, StrategyKind};
use tracing::{info, warn};

pub async fn breakout_pass(deps: &TradingDeps) -> Result<(), GatewayError> {
    let cfg = deps.config.snapshot();
    if !cfg.strategies.contains(&StrategyKind::Breakout) {
        return Ok(());
    }
    scan_breakout(deps, usize::MAX).await?;
    Ok(())
}

/// Scan the universe slice for breakouts, inserting at most `max_new`
/// reserved records. Returns how many were inserted. Per-symbol fetch
/// errors are logged and skipped so one bad symbol cannot abort the scan.
pub async fn scan_breakout(deps: &TradingDeps, max_new: usize) -> Result<usize, GatewayError> {
    let cfg = deps.config.snapshot();
    let params = &cfg.breakout;
    let universe = deps.gateway.universe().await?;
    let mut inserted = 0usize;

    for symbol in universe.iter().take(cfg.universe_top) {
        if inserted >= max_new {
            break;
        }
        if deps.registry.contains(symbol) || deps.exclusions.is_excluded(symbol) {
            continue;
        }
        let bars = match deps
            .gateway
            .klines(symbol, &cfg.breakout_interval, params.min_bars + 5)
            .await
        {
            Ok(bars) => bars,
            Err(e) if e.is_transient() => {
                warn!(symbol, error = %e, "kline fetch failed, skipping symbol");
                continue;
            }
            Err(e) => {
                warn!(symbol, error = %e, "venue refused klines, skipping symbol");
                continue;
            }
        };
        if !is_breakout(&bars, params) {
            continue;
        }
        if deps
            .registry
            .insert_candidate(symbol, SymbolState::Reserved, cfg.max_tracked)
        {
            inserted += 1;
            info!(symbol, "breakout candidate reserved");
            if let Err(e) = deps
                .notifier
                .send(&format!("📈 {symbol}: breakout, reserved for entry"))
                .await
            {
                warn!(error = %e, "notification dropped");
            }
        }
    }
    Ok(inserted)
}
