pub mod liquidation;
pub mod services;
pub mod tasks;

use crate::config::SharedConfig;
use crate::domain::repositories::{Notifier, TradeLedger};
use crate::domain::services::registry::{EntryThrottle, ExclusionList, SymbolRegistry};
use services::market_gateway::RateLimitedGateway;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Everything a pipeline pass needs. Cheap to clone; tasks receive their
/// own copy at spawn time.
#[derive(Clone)]
pub struct TradingDeps {
    pub gateway: Arc<RateLimitedGateway>,
    pub registry: Arc<SymbolRegistry>,
    pub exclusions: Arc<ExclusionList>,
    pub entry_throttle: Arc<EntryThrottle>,
    pub notifier: Arc<dyn Notifier>,
    pub ledger: Arc<dyn TradeLedger>,
    pub config: SharedConfig,
    /// Freed-slot events consumed by the replenishment task.
    pub replenish: mpsc::UnboundedSender<usize>,
}
