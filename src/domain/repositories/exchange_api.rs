use crate::domain::entities::balance::AssetBalance;
use crate::domain::entities::candle::Candle;
use crate::domain::entities::order::OrderFill;
use crate::domain::entities::symbol_info::SymbolInfo;
use crate::domain::errors::GatewayError;
use async_trait::async_trait;

/// Venue access seam. The production implementation signs requests and
/// talks to the spot REST API; tests swap in an in-memory double.
#[async_trait]
pub trait ExchangeApi: Send + Sync {
    /// Full exchange symbol table with trading rules.
    async fn exchange_symbols(&self) -> Result<Vec<SymbolInfo>, GatewayError>;

    /// Most recent `limit` closed bars for `symbol` at `interval`
    /// (venue interval string, e.g. "5m").
    async fn klines(
        &self,
        symbol: &str,
        interval: &str,
        limit: usize,
    ) -> Result<Vec<Candle>, GatewayError>;

    async fn last_price(&self, symbol: &str) -> Result<f64, GatewayError>;

    /// Rolling 24h quote volume per symbol, used to rank the universe.
    async fn day_quote_volumes(&self) -> Result<Vec<(String, f64)>, GatewayError>;

    /// Non-zero account balances.
    async fn balances(&self) -> Result<Vec<AssetBalance>, GatewayError>;

    async fn free_balance(&self, asset: &str) -> Result<f64, GatewayError>;

    /// Market buy spending `quote_amount` of the quote currency.
    async fn market_buy_quote(
        &self,
        symbol: &str,
        quote_amount: f64,
    ) -> Result<OrderFill, GatewayError>;

    /// Market sell of `quantity` base units (already step-rounded).
    async fn market_sell(&self, symbol: &str, quantity: f64) -> Result<OrderFill, GatewayError>;
}
