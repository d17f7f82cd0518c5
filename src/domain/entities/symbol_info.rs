/// Trading rules for one venue symbol, taken from the exchange-info
/// endpoint.
#[derive(Debug, Clone)]
pub struct SymbolInfo {
    pub symbol: String,
    pub base_asset: String,
    pub quote_asset: String,
    /// Lot-size step; sell quantities must be rounded down to it.
    pub step_size: f64,
    /// Smallest order value the venue accepts, in quote currency.
    pub min_notional: f64,
    pub trading_enabled: bool,
}

impl SymbolInfo {
    pub fn is_spot_usdt(&self) -> bool {
        self.trading_enabled && self.quote_asset == "USDT"
    }
}
