use crate::domain::errors::LedgerError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// One completed sale, fees already normalized to quote currency.
#[derive(Debug, Clone)]
pub struct SaleRecord {
    pub symbol: String,
    pub quantity: f64,
    pub entry_cost: f64,
    /// Quote received from the sell, before fees.
    pub proceeds: f64,
    pub fees_quote: f64,
    /// `proceeds - fees_quote - entry_cost`.
    pub pnl: f64,
    pub reason: String,
    /// True when the position was adopted from the venue balance rather
    /// than opened by the entry engine.
    pub synced: bool,
    pub executed_at: DateTime<Utc>,
}

/// Durable sale history.
#[async_trait]
pub trait TradeLedger: Send + Sync {
    async fn record_sale(&self, sale: &SaleRecord) -> Result<(), LedgerError>;

    /// Most recent sales, newest first.
    async fn recent_sales(&self, limit: usize) -> Result<Vec<SaleRecord>, LedgerError>;
}
