//! Rate-limited, caching front to the exchange.
//!
//! Every outbound call passes through one process-wide semaphore: at most
//! `call_permits` requests are in flight at once, regardless of which
//! task initiated them. Read-mostly results are cached with a TTL so the
//! periodic pipelines do not hammer the venue with identical requests.

use crate::domain::entities::balance::AssetBalance;
use crate::domain::entities::candle::Candle;
use crate::domain::entities::order::OrderFill;
use crate::domain::entities::symbol_info::SymbolInfo;
use crate::domain::errors::GatewayError;
use crate::domain::repositories::ExchangeApi;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;

/// Asset bases never traded even when the venue lists them as USDT pairs.
const STABLE_BASES: &[&str] = &[
    "BUSD", "USDC", "TUSD", "USDP", "DAI", "FDUSD", "PAX", "PAXG", "EUR", "GBP", "AEUR", "USTC",
];

struct TtlSlot<V> {
    fetched_at: Instant,
    value: V,
}

struct TtlCache<K, V> {
    slots: Mutex<HashMap<K, TtlSlot<V>>>,
}

impl<K: std::hash::Hash + Eq, V: Clone> TtlCache<K, V> {
    fn new() -> Self {
        TtlCache {
            slots: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<K, TtlSlot<V>>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn get_fresh(&self, key: &K, ttl: Duration) -> Option<V> {
        let slots = self.lock();
        slots
            .get(key)
            .filter(|slot| slot.fetched_at.elapsed() < ttl)
            .map(|slot| slot.value.clone())
    }

    fn put(&self, key: K, value: V) {
        self.lock().insert(
            key,
            TtlSlot {
                fetched_at: Instant::now(),
                value,
            },
        );
    }
}

pub struct RateLimitedGateway {
    inner: Arc<dyn ExchangeApi>,
    permits: Arc<Semaphore>,
    /// Ranked tradable-universe cache (symbol names, volume-descending).
    universe: TtlCache<(), Vec<String>>,
    /// Symbol trading rules, effectively immutable intraday.
    filters: TtlCache<(), HashMap<String, SymbolInfo>>,
    /// Kline windows keyed by (symbol, interval); value keeps the fetch
    /// size so a larger request bypasses a smaller cached window.
    klines: TtlCache<(String, String), Vec<Candle>>,
    universe_ttl: Duration,
    klines_ttl: Duration,
}

impl RateLimitedGateway {
    pub fn new(
        inner: Arc<dyn ExchangeApi>,
        call_permits: usize,
        universe_ttl: Duration,
        klines_ttl: Duration,
    ) -> Self {
        RateLimitedGateway {
            inner,
            permits: Arc::new(Semaphore::new(call_permits.max(1))),
            universe: TtlCache::new(),
            filters: TtlCache::new(),
            klines: TtlCache::new(),
            universe_ttl,
            klines_ttl,
        }
    }

    async fn permit(&self) -> Result<tokio::sync::SemaphorePermit<'_>, GatewayError> {
        self.permits
            .acquire()
            .await
            .map_err(|_| GatewayError::Network("call gate closed".to_string()))
    }

    async fn symbol_table(&self) -> Result<HashMap<String, SymbolInfo>, GatewayError> {
        if let Some(table) = self.filters.get_fresh(&(), self.universe_ttl) {
            return Ok(table);
        }
        let infos = {
            let _permit = self.permit().await?;
            self.inner.exchange_symbols().await?
        };
        let table: HashMap<String, SymbolInfo> =
            infos.into_iter().map(|i| (i.symbol.clone(), i)).collect();
        self.filters.put((), table.clone());
        Ok(table)
    }

    /// Trading rules for one symbol. `None` when the venue does not list
    /// it (delisted or never existed).
    pub async fn symbol_info(&self, symbol: &str) -> Result<Option<SymbolInfo>, GatewayError> {
        Ok(self.symbol_table().await?.get(symbol).cloned())
    }

    /// Tradable spot USDT pairs, stablecoin bases removed, ranked by 24h
    /// quote volume descending. Cached.
    pub async fn universe(&self) -> Result<Vec<String>, GatewayError> {
        if let Some(ranked) = self.universe.get_fresh(&(), self.universe_ttl) {
            return Ok(ranked);
        }
        let table = self.symbol_table().await?;
        let volumes: HashMap<String, f64> = {
            let _permit = self.permit().await?;
            self.inner.day_quote_volumes().await?.into_iter().collect()
        };
        let mut ranked: Vec<(String, f64)> = table
            .values()
            .filter(|info| info.is_spot_usdt())
            .filter(|info| !STABLE_BASES.contains(&info.base_asset.as_str()))
            .map(|info| {
                let vol = volumes.get(&info.symbol).copied().unwrap_or(0.0);
                (info.symbol.clone(), vol)
            })
            .collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        let ranked: Vec<String> = ranked.into_iter().map(|(s, _)| s).collect();
        self.universe.put((), ranked.clone());
        Ok(ranked)
    }

    /// Most recent `limit` bars. A fresh cached window at least as large
    /// is served (tail-sliced) without touching the venue.
    pub async fn klines(
        &self,
        symbol: &str,
        interval: &str,
        limit: usize,
    ) -> Result<Vec<Candle>, GatewayError> {
        let key = (symbol.to_string(), interval.to_string());
        if let Some(cached) = self.klines.get_fresh(&key, self.klines_ttl) {
            if cached.len() >= limit {
                return Ok(cached[cached.len() - limit..].to_vec());
            }
        }
        let bars = {
            let _permit = self.permit().await?;
            self.inner.klines(symbol, interval, limit).await?
        };
        self.klines.put(key, bars.clone());
        Ok(bars)
    }

    /// Spot price, never cached: stop decisions need the current value.
    pub async fn last_price(&self, symbol: &str) -> Result<f64, GatewayError> {
        let _permit = self.permit().await?;
        self.inner.last_price(symbol).await
    }

    pub async fn balances(&self) -> Result<Vec<AssetBalance>, GatewayError> {
        let _permit = self.permit().await?;
        self.inner.balances().await
    }

    pub async fn free_balance(&self, asset: &str) -> Result<f64, GatewayError> {
        let _permit = self.permit().await?;
        self.inner.free_balance(asset).await
    }

    pub async fn market_buy_quote(
        &self,
        symbol: &str,
        quote_amount: f64,
    ) -> Result<OrderFill, GatewayError> {
        let _permit = self.permit().await?;
        self.inner.market_buy_quote(symbol, quote_amount).await
    }

    pub async fn market_sell(
        &self,
        symbol: &str,
        quantity: f64,
    ) -> Result<OrderFill, GatewayError> {
        let _permit = self.permit().await?;
        self.inner.market_sell(symbol, quantity).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingExchange {
        kline_calls: AtomicUsize,
        info_calls: AtomicUsize,
    }

    impl CountingExchange {
        fn new() -> Self {
            CountingExchange {
                kline_calls: AtomicUsize::new(0),
                info_calls: AtomicUsize::new(0),
            }
        }

        fn info(symbol: &str, base: &str) -> SymbolInfo {
            SymbolInfo {
                symbol: symbol.to_string(),
                base_asset: base.to_string(),
                quote_asset: "USDT".to_string(),
                step_size: 0.001,
                min_notional: 5.0,
                trading_enabled: true,
            }
        }
    }

    #[async_trait]
    impl ExchangeApi for CountingExchange {
        async fn exchange_symbols(&self) -> Result<Vec<SymbolInfo>, GatewayError> {
            self.info_calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![
                Self::info("AAAUSDT", "AAA"),
                Self::info("BBBUSDT", "BBB"),
                Self::info("BUSDUSDT", "BUSD"),
            ])
        }

        async fn klines(
            &self,
            _symbol: &str,
            _interval: &str,
            limit: usize,
        ) -> Result<Vec<Candle>, GatewayError> {
            self.kline_calls.fetch_add(1, Ordering::SeqCst);
            Ok((0..limit)
                .map(|i| Candle::new(i as i64, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 0.5).unwrap())
                .collect())
        }

        async fn last_price(&self, _symbol: &str) -> Result<f64, GatewayError> {
            Ok(1.0)
        }

        async fn day_quote_volumes(&self) -> Result<Vec<(String, f64)>, GatewayError> {
            Ok(vec![
                ("AAAUSDT".to_string(), 10.0),
                ("BBBUSDT".to_string(), 99.0),
                ("BUSDUSDT".to_string(), 500.0),
            ])
        }

        async fn balances(&self) -> Result<Vec<AssetBalance>, GatewayError> {
            Ok(vec![])
        }

        async fn free_balance(&self, _asset: &str) -> Result<f64, GatewayError> {
            Ok(0.0)
        }

        async fn market_buy_quote(
            &self,
            _symbol: &str,
            _quote_amount: f64,
        ) -> Result<OrderFill, GatewayError> {
            Err(GatewayError::InsufficientBalance)
        }

        async fn market_sell(
            &self,
            _symbol: &str,
            _quantity: f64,
        ) -> Result<OrderFill, GatewayError> {
            Err(GatewayError::InsufficientBalance)
        }
    }

    fn gateway(inner: Arc<CountingExchange>) -> RateLimitedGateway {
        RateLimitedGateway::new(
            inner,
            5,
            Duration::from_secs(1800),
            Duration::from_secs(120),
        )
    }

    #[tokio::test]
    async fn universe_is_ranked_and_filters_stables() {
        let inner = Arc::new(CountingExchange::new());
        let gw = gateway(inner.clone());
        let universe = gw.universe().await.unwrap();
        assert_eq!(universe, vec!["BBBUSDT".to_string(), "AAAUSDT".to_string()]);
    }

    #[tokio::test]
    async fn symbol_table_is_cached() {
        let inner = Arc::new(CountingExchange::new());
        let gw = gateway(inner.clone());
        gw.symbol_info("AAAUSDT").await.unwrap();
        gw.symbol_info("BBBUSDT").await.unwrap();
        gw.universe().await.unwrap();
        assert_eq!(inner.info_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn klines_cache_serves_tail_of_larger_window() {
        let inner = Arc::new(CountingExchange::new());
        let gw = gateway(inner.clone());
        let full = gw.klines("AAAUSDT", "15m", 30).await.unwrap();
        assert_eq!(full.len(), 30);
        let tail = gw.klines("AAAUSDT", "15m", 10).await.unwrap();
        assert_eq!(tail.len(), 10);
        assert_eq!(tail[9].open_time_ms, full[29].open_time_ms);
        assert_eq!(inner.kline_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn larger_kline_request_refetches() {
        let inner = Arc::new(CountingExchange::new());
        let gw = gateway(inner.clone());
        gw.klines("AAAUSDT", "15m", 10).await.unwrap();
        gw.klines("AAAUSDT", "15m", 30).await.unwrap();
        assert_eq!(inner.kline_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn unknown_symbol_has_no_info() {
        let inner = Arc::new(CountingExchange::new());
        let gw = gateway(inner);
        assert!(gw.symbol_info("ZZZUSDT").await.unwrap().is_none());
    }
}
