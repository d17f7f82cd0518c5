//! Manual candidate overrides.
//!
//! Operators drop symbols into a plain text file (one per line, `#`
//! comments allowed); the watcher re-reads it whenever its mtime changes
//! and inserts the lines as reserved records. Operator entries bypass the
//! tracking-capacity ceiling but still respect exclusion cooldowns.

use crate::application::TradingDeps;
use std::io;
use std::sync::{Mutex, PoisonError};
use std::time::SystemTime;
use tracing::{info, warn};

#[derive(Default)]
pub struct ManualWatchState {
    last_mtime: Mutex<Option<SystemTime>>,
}

pub async fn manual_watch_pass(
    deps: &TradingDeps,
    state: &ManualWatchState,
) -> Result<(), io::Error> {
    let cfg = deps.config.snapshot();

    let mtime = match tokio::fs::metadata(&cfg.manual_file).await {
        Ok(meta) => meta.modified()?,
        // No file is the normal case.
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };
    {
        let mut last = state.last_mtime.lock().unwrap_or_else(PoisonError::into_inner);
        if *last == Some(mtime) {
            return Ok(());
        }
        *last = Some(mtime);
    }

    let content = tokio::fs::read_to_string(&cfg.manual_file).await?;
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut symbol = line.to_ascii_uppercase();
        if !symbol.ends_with(&cfg.quote_asset) {
            symbol.push_str(&cfg.quote_asset);
        }
        if deps.exclusions.is_excluded(&symbol) {
            warn!(symbol, "manual candidate still in cooldown, skipped");
            continue;
        }
        if deps.registry.force_reserved(&symbol) {
            info!(symbol, "manual candidate reserved");
        }
    }
    Ok(())
}
