//! Shared test doubles: a scripted in-memory exchange, a recording
//! notifier, and an in-memory ledger.

use async_trait::async_trait;
use candela::application::services::market_gateway::RateLimitedGateway;
use candela::application::TradingDeps;
use candela::config::{SharedConfig, TradingConfig};
use candela::domain::entities::balance::AssetBalance;
use candela::domain::entities::candle::Candle;
use candela::domain::entities::order::OrderFill;
use candela::domain::entities::symbol_info::SymbolInfo;
use candela::domain::errors::{GatewayError, LedgerError, NotifyError};
use candela::domain::repositories::{ExchangeApi, Notifier, SaleRecord, TradeLedger};
use candela::domain::services::registry::{EntryThrottle, ExclusionList, SymbolRegistry};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::UnboundedReceiver;

#[derive(Default)]
pub struct MockExchange {
    pub symbols: Mutex<Vec<SymbolInfo>>,
    /// Bars per symbol; every interval serves the same series.
    pub klines: Mutex<HashMap<String, Vec<Candle>>>,
    pub prices: Mutex<HashMap<String, f64>>,
    pub day_volumes: Mutex<Vec<(String, f64)>>,
    /// Free balance per asset.
    pub free: Mutex<HashMap<String, f64>>,
    /// Locked balance per asset (open orders).
    pub locked: Mutex<HashMap<String, f64>>,
    pub buy_attempts: AtomicUsize,
    pub buys: Mutex<Vec<(String, f64)>>,
    pub sells: Mutex<Vec<(String, f64)>>,
    pub fail_buy_with: Mutex<Option<GatewayError>>,
    /// One-shot failure for the next free-balance lookup.
    pub fail_free_with: Mutex<Option<GatewayError>>,
}

impl MockExchange {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn list_symbol(&self, symbol: &str, base: &str) {
        self.symbols.lock().unwrap().push(SymbolInfo {
            symbol: symbol.to_string(),
            base_asset: base.to_string(),
            quote_asset: "USDT".to_string(),
            step_size: 0.001,
            min_notional: 5.0,
            trading_enabled: true,
        });
        self.day_volumes
            .lock()
            .unwrap()
            .push((symbol.to_string(), 1_000_000.0));
    }

    pub fn set_price(&self, symbol: &str, price: f64) {
        self.prices.lock().unwrap().insert(symbol.to_string(), price);
    }

    pub fn set_klines(&self, symbol: &str, bars: Vec<Candle>) {
        self.klines.lock().unwrap().insert(symbol.to_string(), bars);
    }

    pub fn set_free(&self, asset: &str, amount: f64) {
        self.free.lock().unwrap().insert(asset.to_string(), amount);
    }

    pub fn set_locked(&self, asset: &str, amount: f64) {
        self.locked.lock().unwrap().insert(asset.to_string(), amount);
    }

    pub fn fail_next_buys(&self, error: GatewayError) {
        *self.fail_buy_with.lock().unwrap() = Some(error);
    }

    pub fn fail_next_free(&self, error: GatewayError) {
        *self.fail_free_with.lock().unwrap() = Some(error);
    }
}

#[async_trait]
impl ExchangeApi for MockExchange {
    async fn exchange_symbols(&self) -> Result<Vec<SymbolInfo>, GatewayError> {
        Ok(self.symbols.lock().unwrap().clone())
    }

    async fn klines(
        &self,
        symbol: &str,
        _interval: &str,
        limit: usize,
    ) -> Result<Vec<Candle>, GatewayError> {
        let bars = self
            .klines
            .lock()
            .unwrap()
            .get(symbol)
            .cloned()
            .unwrap_or_default();
        let start = bars.len().saturating_sub(limit);
        Ok(bars[start..].to_vec())
    }

    async fn last_price(&self, symbol: &str) -> Result<f64, GatewayError> {
        self.prices
            .lock()
            .unwrap()
            .get(symbol)
            .copied()
            .ok_or_else(|| GatewayError::MalformedResponse(format!("no price for {symbol}")))
    }

    async fn day_quote_volumes(&self) -> Result<Vec<(String, f64)>, GatewayError> {
        Ok(self.day_volumes.lock().unwrap().clone())
    }

    async fn balances(&self) -> Result<Vec<AssetBalance>, GatewayError> {
        let mut merged: HashMap<String, (f64, f64)> = HashMap::new();
        for (asset, free) in self.free.lock().unwrap().iter() {
            merged.entry(asset.clone()).or_insert((0.0, 0.0)).0 = *free;
        }
        for (asset, locked) in self.locked.lock().unwrap().iter() {
            merged.entry(asset.clone()).or_insert((0.0, 0.0)).1 = *locked;
        }
        Ok(merged
            .into_iter()
            .map(|(asset, (free, locked))| AssetBalance { asset, free, locked })
            .collect())
    }

    async fn free_balance(&self, asset: &str) -> Result<f64, GatewayError> {
        if let Some(err) = self.fail_free_with.lock().unwrap().take() {
            return Err(err);
        }
        Ok(self.free.lock().unwrap().get(asset).copied().unwrap_or(0.0))
    }

    async fn market_buy_quote(
        &self,
        symbol: &str,
        quote_amount: f64,
    ) -> Result<OrderFill, GatewayError> {
        self.buy_attempts.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.fail_buy_with.lock().unwrap().clone() {
            return Err(err);
        }
        let price = self.last_price(symbol).await?;
        let quantity = quote_amount / price;
        self.buys.lock().unwrap().push((symbol.to_string(), quantity));
        Ok(OrderFill {
            symbol: symbol.to_string(),
            executed_quantity: quantity,
            cumulative_quote: quote_amount,
            fills: vec![],
        })
    }

    async fn market_sell(&self, symbol: &str, quantity: f64) -> Result<OrderFill, GatewayError> {
        let price = self.last_price(symbol).await?;
        self.sells.lock().unwrap().push((symbol.to_string(), quantity));
        Ok(OrderFill {
            symbol: symbol.to_string(),
            executed_quantity: quantity,
            cumulative_quote: quantity * price,
            fills: vec![],
        })
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn containing(&self, needle: &str) -> usize {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.contains(needle))
            .count()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, text: &str) -> Result<(), NotifyError> {
        self.messages.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryLedger {
    pub sales: Mutex<Vec<SaleRecord>>,
}

#[async_trait]
impl TradeLedger for MemoryLedger {
    async fn record_sale(&self, sale: &SaleRecord) -> Result<(), LedgerError> {
        self.sales.lock().unwrap().push(sale.clone());
        Ok(())
    }

    async fn recent_sales(&self, limit: usize) -> Result<Vec<SaleRecord>, LedgerError> {
        let sales = self.sales.lock().unwrap();
        Ok(sales.iter().rev().take(limit).cloned().collect())
    }
}

pub struct Harness {
    pub deps: TradingDeps,
    pub exchange: Arc<MockExchange>,
    pub notifier: Arc<RecordingNotifier>,
    pub ledger: Arc<MemoryLedger>,
    pub replenish_rx: UnboundedReceiver<usize>,
}

pub fn harness(cfg: TradingConfig) -> Harness {
    let exchange = Arc::new(MockExchange::new());
    let notifier = Arc::new(RecordingNotifier::default());
    let ledger = Arc::new(MemoryLedger::default());
    let gateway = Arc::new(RateLimitedGateway::new(
        exchange.clone(),
        cfg.call_permits,
        cfg.universe_ttl,
        cfg.klines_ttl,
    ));
    let (replenish_tx, replenish_rx) = tokio::sync::mpsc::unbounded_channel();
    let deps = TradingDeps {
        gateway,
        registry: Arc::new(SymbolRegistry::new()),
        exclusions: Arc::new(ExclusionList::new()),
        entry_throttle: Arc::new(EntryThrottle::new()),
        notifier: notifier.clone(),
        ledger: ledger.clone(),
        config: SharedConfig::new(cfg),
        replenish: replenish_tx,
    };
    Harness {
        deps,
        exchange,
        notifier,
        ledger,
        replenish_rx,
    }
}

/// Steady uptrend bars: prior low between EMA(9) and the upper band,
/// last close above the prior close, so the entry rule reads `Enter`.
pub fn entry_ready_bars(n: usize, start: f64, step: f64) -> Vec<Candle> {
    (0..n)
        .map(|i| {
            let close = start + i as f64 * step;
            Candle::new(
                i as i64,
                close - step,
                close + 0.01,
                close - 0.05,
                close,
                10.0,
                10.0 * close,
                5.0 * close,
            )
            .unwrap()
        })
        .collect()
}

/// Flat series ending in a breakout bar over the upper band on 5x volume.
pub fn breakout_bars() -> Vec<Candle> {
    let mut bars: Vec<Candle> = (0..29)
        .map(|i| Candle::new(i as i64, 10.0, 10.05, 9.95, 10.0, 10.0, 100.0, 50.0).unwrap())
        .collect();
    bars.push(Candle::new(29, 10.0, 15.2, 10.0, 15.0, 50.0, 750.0, 700.0).unwrap());
    bars
}
