//! Commission normalization.
//!
//! The venue charges commissions in whatever asset it pleases: the quote
//! currency, the base asset just traded, or the fee-discount asset (BNB).
//! PnL accounting needs everything in quote currency.

use crate::domain::entities::order::Fill;
use crate::domain::errors::GatewayError;
use crate::application::services::market_gateway::RateLimitedGateway;

const FEE_DISCOUNT_ASSET: &str = "BNB";

/// Total commission of an order in quote currency.
///
/// Quote-asset commissions count as-is; BNB converts at the BNBUSDT spot
/// price; anything else (normally the base asset) converts at that
/// fill's own price.
pub async fn fees_in_quote(
    gateway: &RateLimitedGateway,
    fills: &[Fill],
    quote_asset: &str,
) -> Result<f64, GatewayError> {
    let mut total = 0.0;
    let mut discount_price: Option<f64> = None;
    for fill in fills {
        if fill.commission == 0.0 {
            continue;
        }
        if fill.commission_asset == quote_asset {
            total += fill.commission;
        } else if fill.commission_asset == FEE_DISCOUNT_ASSET {
            let price = match discount_price {
                Some(p) => p,
                None => {
                    let p = gateway
                        .last_price(&format!("{FEE_DISCOUNT_ASSET}{quote_asset}"))
                        .await?;
                    discount_price = Some(p);
                    p
                }
            };
            total += fill.commission * price;
        } else {
            total += fill.commission * fill.price;
        }
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::balance::AssetBalance;
    use crate::domain::entities::candle::Candle;
    use crate::domain::entities::order::OrderFill;
    use crate::domain::entities::symbol_info::SymbolInfo;
    use crate::domain::repositories::ExchangeApi;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::time::Duration;

    struct PriceOnly(f64);

    #[async_trait]
    impl ExchangeApi for PriceOnly {
        async fn exchange_symbols(&self) -> Result<Vec<SymbolInfo>, GatewayError> {
            Ok(vec![])
        }
        async fn klines(
            &self,
            _s: &str,
            _i: &str,
            _l: usize,
        ) -> Result<Vec<Candle>, GatewayError> {
            Ok(vec![])
        }
        async fn last_price(&self, _s: &str) -> Result<f64, GatewayError> {
            Ok(self.0)
        }
        async fn day_quote_volumes(&self) -> Result<Vec<(String, f64)>, GatewayError> {
            Ok(vec![])
        }
        async fn balances(&self) -> Result<Vec<AssetBalance>, GatewayError> {
            Ok(vec![])
        }
        async fn free_balance(&self, _a: &str) -> Result<f64, GatewayError> {
            Ok(0.0)
        }
        async fn market_buy_quote(
            &self,
            _s: &str,
            _q: f64,
        ) -> Result<OrderFill, GatewayError> {
            Err(GatewayError::InsufficientBalance)
        }
        async fn market_sell(&self, _s: &str, _q: f64) -> Result<OrderFill, GatewayError> {
            Err(GatewayError::InsufficientBalance)
        }
    }

    fn gateway(bnb_price: f64) -> RateLimitedGateway {
        RateLimitedGateway::new(
            Arc::new(PriceOnly(bnb_price)),
            5,
            Duration::from_secs(60),
            Duration::from_secs(60),
        )
    }

    fn fill(price: f64, commission: f64, asset: &str) -> Fill {
        Fill {
            price,
            quantity: 1.0,
            commission,
            commission_asset: asset.to_string(),
        }
    }

    #[tokio::test]
    async fn quote_commission_counts_as_is() {
        let gw = gateway(600.0);
        let fees = fees_in_quote(&gw, &[fill(2.0, 0.02, "USDT")], "USDT")
            .await
            .unwrap();
        assert!((fees - 0.02).abs() < 1e-12);
    }

    #[tokio::test]
    async fn discount_asset_converts_at_its_own_price() {
        let gw = gateway(600.0);
        let fees = fees_in_quote(&gw, &[fill(2.0, 0.0001, "BNB")], "USDT")
            .await
            .unwrap();
        assert!((fees - 0.06).abs() < 1e-12);
    }

    #[tokio::test]
    async fn base_commission_converts_at_fill_price() {
        let gw = gateway(600.0);
        let fees = fees_in_quote(&gw, &[fill(2.5, 0.4, "AAA")], "USDT")
            .await
            .unwrap();
        assert!((fees - 1.0).abs() < 1e-12);
    }

    #[tokio::test]
    async fn mixed_fills_sum() {
        let gw = gateway(500.0);
        let fills = vec![
            fill(2.0, 0.02, "USDT"),
            fill(2.0, 0.0001, "BNB"),
            fill(2.0, 0.0, "AAA"),
        ];
        let fees = fees_in_quote(&gw, &fills, "USDT").await.unwrap();
        assert!((fees - (0.02 + 0.05)).abs() < 1e-12);
    }
}
