//! Runtime configuration.
//!
//! Everything is read once from the environment at startup (with
//! `.env` support) and falls back to documented defaults when a variable
//! is missing or unparsable. A `SharedConfig` handle hands out immutable
//! snapshots so a pass never sees a knob change mid-computation; the
//! command surface swaps in a new snapshot between passes.

use crate::domain::services::stop_engine::StopParams;
use crate::domain::services::strategies::{BreakoutParams, CrossoverParams, EntryParams, StrategyKind};
use std::str::FromStr;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct TradingConfig {
    // Venue credentials. Empty in dry-run.
    pub api_key: String,
    pub api_secret: String,
    pub rest_base: String,

    // Telegram notifier. Disabled when unset.
    pub telegram_token: Option<String>,
    pub telegram_chat_id: Option<String>,

    /// Simulate orders instead of sending them.
    pub dry_run: bool,

    pub quote_asset: String,
    /// Fixed quote amount spent per entry.
    pub entry_quote: f64,
    /// Untracked holdings below this value are ignored by reconciliation.
    pub min_sync_value: f64,

    pub stops: StopParams,

    /// Open-position ceiling (BOUGHT plus in-flight buys).
    pub max_open: usize,
    /// Total tracked-record ceiling, any state.
    pub max_tracked: usize,
    /// Freed slots are replenished with up to `freed × factor` candidates.
    pub replenish_factor: usize,

    /// Post-exit re-discovery ban, measured in entry-timeframe bars.
    pub cooldown_candles: u32,
    /// Venue-wide entry pause after an insufficient-balance rejection.
    pub no_balance_cooldown: Duration,

    // Discovery strategy set and thresholds. The param blocks travel in
    // the snapshot so the command surface can retune them at runtime.
    pub strategies: Vec<StrategyKind>,
    pub breakout: BreakoutParams,
    pub crossover: CrossoverParams,
    pub entry: EntryParams,
    pub spike_min_quote_volume: f64,
    pub spike_min_taker_ratio: f64,
    pub spike_retrigger_cooldown: Duration,

    // Timeframes (venue interval strings).
    pub breakout_interval: String,
    pub pre_cross_interval: String,
    pub confirm_interval: String,
    pub entry_interval: String,

    /// Universe slice scanned by discovery and replenishment.
    pub universe_top: usize,
    /// Smaller top-of-universe slice watched by the confirm scan.
    pub confirm_slice: usize,

    // Gateway limits and cache TTLs.
    pub call_permits: usize,
    pub universe_ttl: Duration,
    pub klines_ttl: Duration,

    // Task cadences.
    pub breakout_scan_every: Duration,
    pub pre_cross_scan_every: Duration,
    pub confirm_scan_every: Duration,
    pub spike_scan_every: Duration,
    pub monitor_every: Duration,
    pub reconcile_every: Duration,
    pub reconcile_start_delay: Duration,
    pub manual_watch_every: Duration,
    pub heartbeat_every: Duration,

    pub manual_file: String,
    pub database_url: String,
}

impl Default for TradingConfig {
    fn default() -> Self {
        TradingConfig {
            api_key: String::new(),
            api_secret: String::new(),
            rest_base: "https://api.binance.com".to_string(),
            telegram_token: None,
            telegram_chat_id: None,
            dry_run: true,
            quote_asset: "USDT".to_string(),
            entry_quote: 20.0,
            min_sync_value: 10.0,
            stops: StopParams::default(),
            max_open: 10,
            max_tracked: 20,
            replenish_factor: 4,
            cooldown_candles: 2,
            no_balance_cooldown: Duration::from_secs(600),
            strategies: vec![
                StrategyKind::Breakout,
                StrategyKind::Crossover,
                StrategyKind::BuySpike,
            ],
            breakout: BreakoutParams::default(),
            crossover: CrossoverParams::default(),
            entry: EntryParams::default(),
            spike_min_quote_volume: 250_000.0,
            spike_min_taker_ratio: 0.85,
            spike_retrigger_cooldown: Duration::from_secs(3600),
            breakout_interval: "4h".to_string(),
            pre_cross_interval: "30m".to_string(),
            confirm_interval: "15m".to_string(),
            entry_interval: "15m".to_string(),
            universe_top: 200,
            confirm_slice: 60,
            call_permits: 5,
            universe_ttl: Duration::from_secs(1800),
            klines_ttl: Duration::from_secs(120),
            breakout_scan_every: Duration::from_secs(900),
            pre_cross_scan_every: Duration::from_secs(300),
            confirm_scan_every: Duration::from_secs(180),
            spike_scan_every: Duration::from_secs(120),
            monitor_every: Duration::from_secs(30),
            reconcile_every: Duration::from_secs(300),
            reconcile_start_delay: Duration::from_secs(30),
            manual_watch_every: Duration::from_secs(30),
            heartbeat_every: Duration::from_secs(600),
            manual_file: "manual_candidates.txt".to_string(),
            database_url: "sqlite://candela.db?mode=rwc".to_string(),
        }
    }
}

impl TradingConfig {
    /// Build from the environment, defaulting every missing or malformed
    /// value and warning about the latter.
    pub fn from_env() -> Self {
        let d = TradingConfig::default();
        let stops = StopParams {
            delta: env_parse("STOP_DELTA", d.stops.delta),
            arm_margin: env_parse("STOP_ARM_MARGIN", d.stops.arm_margin),
            abs_floor: env_parse("STOP_ABS_FLOOR", d.stops.abs_floor),
            high_price_threshold: env_parse("STOP_HIGH_PRICE_THRESHOLD", d.stops.high_price_threshold),
            high_price_factor: env_parse("STOP_HIGH_PRICE_FACTOR", d.stops.high_price_factor),
        };
        let breakout = BreakoutParams {
            bollinger_period: env_parse("BREAKOUT_BB_PERIOD", d.breakout.bollinger_period),
            bollinger_k: env_parse("BREAKOUT_BB_K", d.breakout.bollinger_k),
            rsi_period: env_parse("BREAKOUT_RSI_PERIOD", d.breakout.rsi_period),
            rsi_min: env_parse("BREAKOUT_RSI_MIN", d.breakout.rsi_min),
            volume_multiple: env_parse("BREAKOUT_VOLUME_MULTIPLE", d.breakout.volume_multiple),
            min_bars: env_parse("BREAKOUT_MIN_BARS", d.breakout.min_bars),
        };
        let crossover = CrossoverParams {
            fast_period: env_parse("CROSS_FAST_PERIOD", d.crossover.fast_period),
            slow_period: env_parse("CROSS_SLOW_PERIOD", d.crossover.slow_period),
            min_bars: env_parse("CROSS_MIN_BARS", d.crossover.min_bars),
            approach_slope_cap: env_parse("CROSS_APPROACH_SLOPE_CAP", d.crossover.approach_slope_cap),
            confirm_max_bars_ago: env_parse("CROSS_CONFIRM_MAX_BARS_AGO", d.crossover.confirm_max_bars_ago),
            slope_lookback: env_parse("CROSS_SLOPE_LOOKBACK", d.crossover.slope_lookback),
        };
        let entry = EntryParams {
            trend_fast: env_parse("ENTRY_TREND_FAST", d.entry.trend_fast),
            trend_slow: env_parse("ENTRY_TREND_SLOW", d.entry.trend_slow),
            pullback_ema: env_parse("ENTRY_PULLBACK_EMA", d.entry.pullback_ema),
            bollinger_period: env_parse("ENTRY_BB_PERIOD", d.entry.bollinger_period),
            bollinger_k: env_parse("ENTRY_BB_K", d.entry.bollinger_k),
            min_bars: env_parse("ENTRY_MIN_BARS", d.entry.min_bars),
        };
        TradingConfig {
            api_key: env_string("BINANCE_API_KEY", &d.api_key),
            api_secret: env_string("BINANCE_API_SECRET", &d.api_secret),
            rest_base: env_string("BINANCE_REST_BASE", &d.rest_base),
            telegram_token: std::env::var("TELEGRAM_BOT_TOKEN").ok().filter(|s| !s.is_empty()),
            telegram_chat_id: std::env::var("TELEGRAM_CHAT_ID").ok().filter(|s| !s.is_empty()),
            dry_run: env_parse("DRY_RUN", d.dry_run),
            quote_asset: env_string("QUOTE_ASSET", &d.quote_asset),
            entry_quote: env_parse("ENTRY_QUOTE", d.entry_quote),
            min_sync_value: env_parse("MIN_SYNC_VALUE", d.min_sync_value),
            stops,
            max_open: env_parse("MAX_OPEN_POSITIONS", d.max_open),
            max_tracked: env_parse("MAX_TRACKED_SYMBOLS", d.max_tracked),
            replenish_factor: env_parse("REPLENISH_FACTOR", d.replenish_factor),
            cooldown_candles: env_parse("COOLDOWN_CANDLES", d.cooldown_candles),
            no_balance_cooldown: env_secs("INSUFFICIENT_BALANCE_COOLDOWN", d.no_balance_cooldown),
            strategies: env_strategies("STRATEGIES", &d.strategies),
            breakout,
            crossover,
            entry,
            spike_min_quote_volume: env_parse("SPIKE_MIN_QUOTE_VOLUME", d.spike_min_quote_volume),
            spike_min_taker_ratio: env_parse("SPIKE_MIN_TAKER_RATIO", d.spike_min_taker_ratio),
            spike_retrigger_cooldown: env_secs("SPIKE_RETRIGGER_COOLDOWN", d.spike_retrigger_cooldown),
            breakout_interval: env_string("BREAKOUT_INTERVAL", &d.breakout_interval),
            pre_cross_interval: env_string("PRE_CROSS_INTERVAL", &d.pre_cross_interval),
            confirm_interval: env_string("CONFIRM_INTERVAL", &d.confirm_interval),
            entry_interval: env_string("ENTRY_INTERVAL", &d.entry_interval),
            universe_top: env_parse("UNIVERSE_TOP", d.universe_top),
            confirm_slice: env_parse("CONFIRM_SLICE", d.confirm_slice),
            call_permits: env_parse("CALL_PERMITS", d.call_permits).max(1),
            universe_ttl: env_secs("UNIVERSE_TTL", d.universe_ttl),
            klines_ttl: env_secs("KLINES_TTL", d.klines_ttl),
            breakout_scan_every: env_secs("BREAKOUT_SCAN_SECS", d.breakout_scan_every),
            pre_cross_scan_every: env_secs("PRE_CROSS_SCAN_SECS", d.pre_cross_scan_every),
            confirm_scan_every: env_secs("CONFIRM_SCAN_SECS", d.confirm_scan_every),
            spike_scan_every: env_secs("SPIKE_SCAN_SECS", d.spike_scan_every),
            monitor_every: env_secs("MONITOR_SECS", d.monitor_every),
            reconcile_every: env_secs("RECONCILE_SECS", d.reconcile_every),
            reconcile_start_delay: env_secs("RECONCILE_START_DELAY", d.reconcile_start_delay),
            manual_watch_every: env_secs("MANUAL_WATCH_SECS", d.manual_watch_every),
            heartbeat_every: env_secs("HEARTBEAT_SECS", d.heartbeat_every),
            manual_file: env_string("MANUAL_CANDIDATES_FILE", &d.manual_file),
            database_url: env_string("DATABASE_URL", &d.database_url),
        }
    }

    /// Exclusion cooldown as wall-clock time: `cooldown_candles` bars of
    /// the entry timeframe.
    pub fn exclusion_cooldown(&self) -> Duration {
        interval_duration(&self.entry_interval) * self.cooldown_candles
    }

    pub fn live_trading(&self) -> bool {
        !self.dry_run
    }
}

/// Parse a venue interval string ("15m", "4h", "1d") into a duration.
/// Unknown suffixes fall back to minutes of the numeric prefix, or 15m
/// when nothing parses.
pub fn interval_duration(interval: &str) -> Duration {
    let (num, unit) = interval.split_at(interval.len().saturating_sub(1));
    let n: u64 = num.parse().unwrap_or(0);
    if n == 0 {
        return Duration::from_secs(15 * 60);
    }
    match unit {
        "s" => Duration::from_secs(n),
        "m" => Duration::from_secs(n * 60),
        "h" => Duration::from_secs(n * 3600),
        "d" => Duration::from_secs(n * 86_400),
        _ => Duration::from_secs(n * 60),
    }
}

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key).ok().filter(|s| !s.is_empty()).unwrap_or_else(|| default.to_string())
}

fn env_parse<T: FromStr + Copy>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(key, value = %raw, "unparsable env var, using default");
            default
        }),
        Err(_) => default,
    }
}

fn env_secs(key: &str, default: Duration) -> Duration {
    Duration::from_secs(env_parse(key, default.as_secs()))
}

fn env_strategies(key: &str, default: &[StrategyKind]) -> Vec<StrategyKind> {
    match std::env::var(key) {
        Ok(raw) => {
            let parsed: Vec<StrategyKind> = raw
                .split(',')
                .filter_map(|s| {
                    let s = s.trim();
                    if s.is_empty() {
                        return None;
                    }
                    match s.parse() {
                        Ok(k) => Some(k),
                        Err(_) => {
                            warn!(key, strategy = s, "unknown strategy name, skipping");
                            None
                        }
                    }
                })
                .collect();
            if parsed.is_empty() {
                default.to_vec()
            } else {
                parsed
            }
        }
        Err(_) => default.to_vec(),
    }
}

/// Swappable configuration handle. Reads are lock-cheap clones of an
/// `Arc`; writers replace the whole snapshot.
#[derive(Clone)]
pub struct SharedConfig {
    inner: Arc<RwLock<Arc<TradingConfig>>>,
}

impl SharedConfig {
    pub fn new(config: TradingConfig) -> Self {
        SharedConfig {
            inner: Arc::new(RwLock::new(Arc::new(config))),
        }
    }

    pub fn snapshot(&self) -> Arc<TradingConfig> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn replace(&self, config: TradingConfig) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(config);
    }
}
