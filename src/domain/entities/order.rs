/// One partial fill of a market order.
#[derive(Debug, Clone)]
pub struct Fill {
    pub price: f64,
    pub quantity: f64,
    pub commission: f64,
    pub commission_asset: String,
}

/// Result of a settled market order.
#[derive(Debug, Clone)]
pub struct OrderFill {
    pub symbol: String,
    pub executed_quantity: f64,
    /// Quote currency actually moved, before fees.
    pub cumulative_quote: f64,
    pub fills: Vec<Fill>,
}

impl OrderFill {
    /// Volume-weighted average fill price.
    pub fn average_price(&self) -> f64 {
        if self.executed_quantity > 0.0 {
            self.cumulative_quote / self.executed_quantity
        } else {
            0.0
        }
    }
}
