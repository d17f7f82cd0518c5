//! Discovery and entry predicates.
//!
//! Three discovery families coexist; which ones run is a configuration
//! choice, not a hidden default. All predicates are pure: they never
//! mutate registry state and treat a too-short bar window as "not a
//! candidate" rather than as an error.

use crate::domain::entities::candle::{closes, volumes, Candle};
use crate::domain::services::indicators;
use std::str::FromStr;

/// Discovery strategy families that can be enabled independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    /// Close above the upper Bollinger band with elevated volume and RSI.
    Breakout,
    /// Two-stage moving-average crossover (pre-cross, then confirmation).
    Crossover,
    /// Single-bar taker-buy volume spike.
    BuySpike,
}

impl FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "breakout" => Ok(StrategyKind::Breakout),
            "crossover" => Ok(StrategyKind::Crossover),
            "spike" | "buyspike" | "buy_spike" => Ok(StrategyKind::BuySpike),
            other => Err(format!("unknown strategy: {}", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BreakoutParams {
    pub bollinger_period: usize,
    pub bollinger_k: f64,
    pub rsi_period: usize,
    pub rsi_min: f64,
    pub volume_multiple: f64,
    pub min_bars: usize,
}

impl Default for BreakoutParams {
    fn default() -> Self {
        BreakoutParams {
            bollinger_period: 20,
            bollinger_k: 2.0,
            rsi_period: 14,
            rsi_min: 50.0,
            volume_multiple: 2.0,
            min_bars: 25,
        }
    }
}

/// Breakout: last close above the upper Bollinger band, last volume at
/// least `volume_multiple` times the window average, RSI above the floor.
pub fn is_breakout(candles: &[Candle], p: &BreakoutParams) -> bool {
    if candles.len() < p.min_bars {
        return false;
    }
    let close = closes(candles);
    let volume = volumes(candles);

    let bands = indicators::bollinger(&close, p.bollinger_period, p.bollinger_k);
    let rsi = indicators::rsi(&close, p.rsi_period);
    let last_rsi = match rsi.last() {
        Some(v) => *v,
        None => return false,
    };

    let last_close = close[close.len() - 1];
    let last_volume = volume[volume.len() - 1];
    let vol_avg = indicators::volume_average(&volume);

    last_close > bands.upper[close.len() - 1]
        && last_volume >= p.volume_multiple * vol_avg
        && last_rsi > p.rsi_min
}

#[derive(Debug, Clone)]
pub struct CrossoverParams {
    /// Hull moving average period (the fast line).
    pub fast_period: usize,
    /// EMA period (the slow line).
    pub slow_period: usize,
    pub min_bars: usize,
    /// A pre-cross needs the fast line rising, but with a slope below
    /// this fraction of the slow line's level (too steep means the cross
    /// already happened or is a one-bar outlier).
    pub approach_slope_cap: f64,
    /// How many bars back a cross still counts as fresh.
    pub confirm_max_bars_ago: usize,
    pub slope_lookback: usize,
}

impl Default for CrossoverParams {
    fn default() -> Self {
        CrossoverParams {
            fast_period: 8,
            slow_period: 24,
            min_bars: 30,
            approach_slope_cap: 0.002,
            confirm_max_bars_ago: 1,
            slope_lookback: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrossSignal {
    None,
    /// Fast line still under the slow line but climbing toward it.
    Approaching,
    /// Fast line crossed above the slow line `bars_ago` bars back.
    Crossed { bars_ago: usize },
}

/// Evaluate the fast/slow crossover state over a close series.
pub fn crossover_signal(close: &[f64], p: &CrossoverParams) -> CrossSignal {
    if close.len() < p.min_bars {
        return CrossSignal::None;
    }
    let fast = indicators::hull(close, p.fast_period);
    let slow = indicators::ema(close, p.slow_period);
    let diff: Vec<f64> = fast.iter().zip(slow.iter()).map(|(f, s)| f - s).collect();

    if let Some(bars_ago) = last_upward_cross(&diff) {
        if bars_ago <= p.confirm_max_bars_ago {
            return CrossSignal::Crossed { bars_ago };
        }
    }

    let last_diff = diff[diff.len() - 1];
    if last_diff < 0.0 {
        let slope = tail_slope(&fast, p.slope_lookback);
        let cap = slow[slow.len() - 1].abs() * p.approach_slope_cap;
        if slope > 0.0 && slope < cap {
            return CrossSignal::Approaching;
        }
    }
    CrossSignal::None
}

/// Bars since the most recent sign flip of `diff` from ≤0 to >0.
fn last_upward_cross(diff: &[f64]) -> Option<usize> {
    for i in (1..diff.len()).rev() {
        if diff[i] > 0.0 && diff[i - 1] <= 0.0 {
            return Some(diff.len() - 1 - i);
        }
    }
    None
}

/// Mean of the last `lookback` first-differences of a series.
fn tail_slope(series: &[f64], lookback: usize) -> f64 {
    if series.len() < 2 || lookback == 0 {
        return 0.0;
    }
    let start = series.len().saturating_sub(lookback + 1);
    let window = &series[start..];
    let mut sum = 0.0;
    for i in 1..window.len() {
        sum += window[i] - window[i - 1];
    }
    sum / (window.len() - 1) as f64
}

#[derive(Debug, Clone)]
pub struct SpikeParams {
    pub min_quote_volume: f64,
    pub min_buy_ratio: f64,
}

impl Default for SpikeParams {
    fn default() -> Self {
        SpikeParams {
            min_quote_volume: 250_000.0,
            min_buy_ratio: 0.85,
        }
    }
}

/// A single bar with heavy quote volume dominated by taker buys.
pub fn is_buy_spike(bar: &Candle, p: &SpikeParams) -> bool {
    bar.quote_volume >= p.min_quote_volume && bar.taker_buy_ratio() >= p.min_buy_ratio
}

#[derive(Debug, Clone)]
pub struct EntryParams {
    pub trend_fast: usize,
    pub trend_slow: usize,
    pub pullback_ema: usize,
    pub bollinger_period: usize,
    pub bollinger_k: f64,
    pub min_bars: usize,
}

impl Default for EntryParams {
    fn default() -> Self {
        EntryParams {
            trend_fast: 8,
            trend_slow: 24,
            pullback_ema: 9,
            bollinger_period: 20,
            bollinger_k: 2.0,
            min_bars: 30,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntrySignal {
    /// Trend filter failed; the candidate should be purged.
    Purge,
    /// Pullback pattern not present yet; re-evaluate next cycle.
    Wait,
    /// Trend and pullback both hold; eligible to buy.
    Enter,
}

/// Entry rule: trend filter (fast trend average above slow), then a
/// pullback into the zone between the short EMA and the upper Bollinger
/// band followed by a close higher than the prior bar.
pub fn entry_signal(candles: &[Candle], p: &EntryParams) -> EntrySignal {
    if candles.len() < p.min_bars {
        return EntrySignal::Wait;
    }
    let close = closes(candles);
    let n = close.len();

    let fast = indicators::hull(&close, p.trend_fast);
    let slow = indicators::ema(&close, p.trend_slow);
    if fast[n - 1] <= slow[n - 1] {
        return EntrySignal::Purge;
    }

    let short_ema = indicators::ema(&close, p.pullback_ema);
    let bands = indicators::bollinger(&close, p.bollinger_period, p.bollinger_k);

    let pull_low = candles[n - 2].low.value();
    let in_zone = short_ema[n - 2] <= pull_low && pull_low <= bands.upper[n - 2];
    let rebound = close[n - 1] > close[n - 2];

    if in_zone && rebound {
        EntrySignal::Enter
    } else {
        EntrySignal::Wait
    }
}
