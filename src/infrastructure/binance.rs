//! Binance spot REST client.
//!
//! Implements the exchange seam with signed requests (HMAC-SHA256 over
//! the query string, `X-MBX-APIKEY` header). In dry-run mode order
//! placement is simulated from the current ticker price with zero fees;
//! all read endpoints stay real so signals and stops see live data.

use crate::domain::entities::balance::AssetBalance;
use crate::domain::entities::candle::Candle;
use crate::domain::entities::order::{Fill, OrderFill};
use crate::domain::entities::symbol_info::SymbolInfo;
use crate::domain::errors::GatewayError;
use crate::domain::repositories::ExchangeApi;
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::info;

type HmacSha256 = Hmac<Sha256>;

const RECV_WINDOW_MS: u64 = 5_000;

pub struct BinanceClient {
    client: Client,
    base: String,
    api_key: String,
    api_secret: String,
    dry_run: bool,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: i64,
    msg: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExchangeInfoResponse {
    symbols: Vec<SymbolDto>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SymbolDto {
    symbol: String,
    base_asset: String,
    quote_asset: String,
    status: String,
    #[serde(default)]
    is_spot_trading_allowed: bool,
    #[serde(default)]
    filters: Vec<FilterDto>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FilterDto {
    filter_type: String,
    #[serde(default)]
    step_size: Option<String>,
    #[serde(default)]
    min_notional: Option<String>,
    #[serde(default)]
    notional: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TickerPrice {
    price: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DayTicker {
    symbol: String,
    quote_volume: String,
}

#[derive(Debug, Deserialize)]
struct AccountResponse {
    balances: Vec<BalanceDto>,
}

#[derive(Debug, Deserialize)]
struct BalanceDto {
    asset: String,
    free: String,
    locked: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderResponse {
    executed_qty: String,
    cummulative_quote_qty: String,
    #[serde(default)]
    fills: Vec<FillDto>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FillDto {
    price: String,
    qty: String,
    commission: String,
    commission_asset: String,
}

impl BinanceClient {
    pub fn new(base: &str, api_key: &str, api_secret: &str, dry_run: bool) -> Self {
        BinanceClient {
            client: Client::builder()
                .timeout(Duration::from_secs(15))
                .build()
                .unwrap_or_else(|_| Client::new()),
            base: base.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            api_secret: api_secret.to_string(),
            dry_run,
        }
    }

    fn timestamp_ms() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }

    fn sign(&self, query: &str) -> Result<String, GatewayError> {
        let mut mac = HmacSha256::new_from_slice(self.api_secret.as_bytes())
            .map_err(|_| GatewayError::MalformedResponse("invalid api secret".to_string()))?;
        mac.update(query.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    async fn get_public(&self, path: &str, query: &[(&str, String)]) -> Result<Value, GatewayError> {
        let response = self
            .client
            .get(format!("{}{}", self.base, path))
            .query(query)
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn request_signed(
        &self,
        method: reqwest::Method,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<Value, GatewayError> {
        let mut query: Vec<String> = params
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        query.push(format!("timestamp={}", Self::timestamp_ms()));
        query.push(format!("recvWindow={RECV_WINDOW_MS}"));
        let query = query.join("&");
        let signature = self.sign(&query)?;
        let url = format!("{}{}?{}&signature={}", self.base, path, query, signature);

        let response = self
            .client
            .request(method, url)
            .header("X-MBX-APIKEY", &self.api_key)
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn decode(response: reqwest::Response) -> Result<Value, GatewayError> {
        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS || status.as_u16() == 418 {
            return Err(GatewayError::RateLimited);
        }
        let body = response.text().await?;
        if !status.is_success() {
            if let Ok(err) = serde_json::from_str::<ApiError>(&body) {
                return Err(map_api_error(err));
            }
            return Err(GatewayError::Rejected {
                code: status.as_u16() as i64,
                message: body,
            });
        }
        serde_json::from_str(&body).map_err(|e| GatewayError::MalformedResponse(e.to_string()))
    }

    fn parse<T: serde::de::DeserializeOwned>(value: Value) -> Result<T, GatewayError> {
        serde_json::from_value(value).map_err(|e| GatewayError::MalformedResponse(e.to_string()))
    }

    async fn simulated_fill(
        &self,
        symbol: &str,
        quantity: f64,
        quote: f64,
    ) -> Result<OrderFill, GatewayError> {
        info!(symbol, quantity, quote, "dry-run order simulated");
        Ok(OrderFill {
            symbol: symbol.to_string(),
            executed_quantity: quantity,
            cumulative_quote: quote,
            fills: vec![],
        })
    }
}

fn map_api_error(err: ApiError) -> GatewayError {
    match err.code {
        -2010 => GatewayError::InsufficientBalance,
        -1013 => GatewayError::BelowMinNotional,
        code => GatewayError::Rejected {
            code,
            message: err.msg,
        },
    }
}

fn field_f64(s: &str, field: &str) -> Result<f64, GatewayError> {
    s.parse()
        .map_err(|_| GatewayError::MalformedResponse(format!("bad {field}: {s}")))
}

fn kline_f64(row: &[Value], idx: usize) -> Result<f64, GatewayError> {
    row.get(idx)
        .and_then(Value::as_str)
        .ok_or_else(|| GatewayError::MalformedResponse(format!("kline field {idx} missing")))?
        .parse()
        .map_err(|_| GatewayError::MalformedResponse(format!("kline field {idx} not numeric")))
}

#[async_trait]
impl ExchangeApi for BinanceClient {
    async fn exchange_symbols(&self) -> Result<Vec<SymbolInfo>, GatewayError> {
        let value = self.get_public("/api/v3/exchangeInfo", &[]).await?;
        let info: ExchangeInfoResponse = Self::parse(value)?;
        let mut out = Vec::with_capacity(info.symbols.len());
        for dto in info.symbols {
            let mut step_size = 0.0;
            let mut min_notional = 0.0;
            for filter in &dto.filters {
                match filter.filter_type.as_str() {
                    "LOT_SIZE" => {
                        if let Some(step) = &filter.step_size {
                            step_size = field_f64(step, "stepSize")?;
                        }
                    }
                    "NOTIONAL" | "MIN_NOTIONAL" => {
                        if let Some(min) = filter.min_notional.as_ref().or(filter.notional.as_ref())
                        {
                            min_notional = field_f64(min, "minNotional")?;
                        }
                    }
                    _ => {}
                }
            }
            out.push(SymbolInfo {
                symbol: dto.symbol,
                base_asset: dto.base_asset,
                quote_asset: dto.quote_asset,
                step_size,
                min_notional,
                trading_enabled: dto.status == "TRADING" && dto.is_spot_trading_allowed,
            });
        }
        Ok(out)
    }

    async fn klines(
        &self,
        symbol: &str,
        interval: &str,
        limit: usize,
    ) -> Result<Vec<Candle>, GatewayError> {
        let value = self
            .get_public(
                "/api/v3/klines",
                &[
                    ("symbol", symbol.to_string()),
                    ("interval", interval.to_string()),
                    ("limit", limit.to_string()),
                ],
            )
            .await?;
        let rows: Vec<Vec<Value>> = Self::parse(value)?;
        let mut candles = Vec::with_capacity(rows.len());
        for row in &rows {
            let open_time = row
                .first()
                .and_then(Value::as_i64)
                .ok_or_else(|| GatewayError::MalformedResponse("kline open time missing".into()))?;
            let candle = Candle::new(
                open_time,
                kline_f64(row, 1)?,
                kline_f64(row, 2)?,
                kline_f64(row, 3)?,
                kline_f64(row, 4)?,
                kline_f64(row, 5)?,
                kline_f64(row, 7)?,
                kline_f64(row, 10)?,
            )
            .map_err(|e| GatewayError::MalformedResponse(e.to_string()))?;
            candles.push(candle);
        }
        Ok(candles)
    }

    async fn last_price(&self, symbol: &str) -> Result<f64, GatewayError> {
        let value = self
            .get_public("/api/v3/ticker/price", &[("symbol", symbol.to_string())])
            .await?;
        let ticker: TickerPrice = Self::parse(value)?;
        field_f64(&ticker.price, "price")
    }

    async fn day_quote_volumes(&self) -> Result<Vec<(String, f64)>, GatewayError> {
        let value = self.get_public("/api/v3/ticker/24hr", &[]).await?;
        let tickers: Vec<DayTicker> = Self::parse(value)?;
        let mut out = Vec::with_capacity(tickers.len());
        for t in tickers {
            out.push((t.symbol, field_f64(&t.quote_volume, "quoteVolume")?));
        }
        Ok(out)
    }

    async fn balances(&self) -> Result<Vec<AssetBalance>, GatewayError> {
        let value = self
            .request_signed(reqwest::Method::GET, "/api/v3/account", &[])
            .await?;
        let account: AccountResponse = Self::parse(value)?;
        let mut out = Vec::new();
        for b in account.balances {
            let free = field_f64(&b.free, "free")?;
            let locked = field_f64(&b.locked, "locked")?;
            if free > 0.0 || locked > 0.0 {
                out.push(AssetBalance {
                    asset: b.asset,
                    free,
                    locked,
                });
            }
        }
        Ok(out)
    }

    async fn free_balance(&self, asset: &str) -> Result<f64, GatewayError> {
        Ok(self
            .balances()
            .await?
            .into_iter()
            .find(|b| b.asset == asset)
            .map(|b| b.free)
            .unwrap_or(0.0))
    }

    async fn market_buy_quote(
        &self,
        symbol: &str,
        quote_amount: f64,
    ) -> Result<OrderFill, GatewayError> {
        if self.dry_run {
            let price = self.last_price(symbol).await?;
            if price <= 0.0 {
                return Err(GatewayError::MalformedResponse("zero price".into()));
            }
            return self
                .simulated_fill(symbol, quote_amount / price, quote_amount)
                .await;
        }
        let value = self
            .request_signed(
                reqwest::Method::POST,
                "/api/v3/order",
                &[
                    ("symbol", symbol.to_string()),
                    ("side", "BUY".to_string()),
                    ("type", "MARKET".to_string()),
                    ("quoteOrderQty", format!("{quote_amount:.8}")),
                ],
            )
            .await?;
        let order: OrderResponse = Self::parse(value)?;
        decode_order(symbol, order)
    }

    async fn market_sell(&self, symbol: &str, quantity: f64) -> Result<OrderFill, GatewayError> {
        if self.dry_run {
            let price = self.last_price(symbol).await?;
            return self.simulated_fill(symbol, quantity, quantity * price).await;
        }
        let value = self
            .request_signed(
                reqwest::Method::POST,
                "/api/v3/order",
                &[
                    ("symbol", symbol.to_string()),
                    ("side", "SELL".to_string()),
                    ("type", "MARKET".to_string()),
                    ("quantity", format!("{quantity}")),
                ],
            )
            .await?;
        let order: OrderResponse = Self::parse(value)?;
        decode_order(symbol, order)
    }
}

fn decode_order(symbol: &str, order: OrderResponse) -> Result<OrderFill, GatewayError> {
    let mut fills = Vec::with_capacity(order.fills.len());
    for f in order.fills {
        fills.push(Fill {
            price: field_f64(&f.price, "fill price")?,
            quantity: field_f64(&f.qty, "fill qty")?,
            commission: field_f64(&f.commission, "commission")?,
            commission_asset: f.commission_asset,
        });
    }
    Ok(OrderFill {
        symbol: symbol.to_string(),
        executed_quantity: field_f64(&order.executed_qty, "executedQty")?,
        cumulative_quote: field_f64(&order.cummulative_quote_qty, "cummulativeQuoteQty")?,
        fills,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_mapping() {
        let insufficient = ApiError {
            code: -2010,
            msg: "Account has insufficient balance".into(),
        };
        assert!(matches!(
            map_api_error(insufficient),
            GatewayError::InsufficientBalance
        ));

        let notional = ApiError {
            code: -1013,
            msg: "Filter failure: NOTIONAL".into(),
        };
        assert!(matches!(
            map_api_error(notional),
            GatewayError::BelowMinNotional
        ));

        let other = ApiError {
            code: -1021,
            msg: "Timestamp outside recvWindow".into(),
        };
        assert!(matches!(
            map_api_error(other),
            GatewayError::Rejected { code: -1021, .. }
        ));
    }

    #[test]
    fn signature_is_deterministic_hex() {
        let client = BinanceClient::new("https://x", "key", "secret", true);
        let a = client.sign("symbol=BTCUSDT&timestamp=1").unwrap();
        let b = client.sign("symbol=BTCUSDT&timestamp=1").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn kline_row_decoding() {
        let row: Vec<Value> = serde_json::from_str(
            r#"[1700000000000,"1.0","2.0","0.5","1.5","100.0",1700000299999,"150.0",42,"120.0","118.0","0"]"#,
        )
        .unwrap();
        assert_eq!(kline_f64(&row, 4).unwrap(), 1.5);
        assert_eq!(kline_f64(&row, 7).unwrap(), 150.0);
        assert_eq!(kline_f64(&row, 10).unwrap(), 120.0);
        assert!(kline_f64(&row, 20).is_err());
    }

    #[test]
    fn order_decoding_carries_fills() {
        let order = OrderResponse {
            executed_qty: "2.0".into(),
            cummulative_quote_qty: "20.0".into(),
            fills: vec![FillDto {
                price: "10.0".into(),
                qty: "2.0".into(),
                commission: "0.002".into(),
                commission_asset: "AAA".into(),
            }],
        };
        let fill = decode_order("AAAUSDT", order).unwrap();
        assert_eq!(fill.average_price(), 10.0);
        assert_eq!(fill.fills.len(), 1);
        assert_eq!(fill.fills[0].commission_asset, "AAA");
    }
}
