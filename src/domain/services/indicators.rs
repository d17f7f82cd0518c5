//! Technical indicator arithmetic.
//!
//! All functions are pure and stateless. Series-producing functions
//! return a vector aligned to the input length; warm-up entries are
//! computed from the partial window that is available, which keeps the
//! tail values (the only ones the strategies read) exact.

use crate::domain::entities::candle::Candle;

/// Exponential moving average, seeded with the first value.
pub fn ema(values: &[f64], period: usize) -> Vec<f64> {
    if values.is_empty() || period == 0 {
        return vec![];
    }
    let multiplier = 2.0 / (period as f64 + 1.0);
    let mut out = Vec::with_capacity(values.len());
    let mut current = values[0];
    out.push(current);
    for &v in &values[1..] {
        current = (v - current) * multiplier + current;
        out.push(current);
    }
    out
}

/// Weighted moving average with linearly increasing weights. Warm-up
/// entries use the partial window.
pub fn wma(values: &[f64], period: usize) -> Vec<f64> {
    if values.is_empty() || period == 0 {
        return vec![];
    }
    let mut out = Vec::with_capacity(values.len());
    for i in 0..values.len() {
        let start = (i + 1).saturating_sub(period);
        let window = &values[start..=i];
        let mut num = 0.0;
        let mut den = 0.0;
        for (j, &v) in window.iter().enumerate() {
            let w = (j + 1) as f64;
            num += v * w;
            den += w;
        }
        out.push(num / den);
    }
    out
}

/// Hull moving average: WMA(2·WMA(n/2) − WMA(n), √n).
pub fn hull(values: &[f64], period: usize) -> Vec<f64> {
    if values.is_empty() || period == 0 {
        return vec![];
    }
    let half = (period / 2).max(1);
    let root = (period as f64).sqrt().round().max(1.0) as usize;
    let fast = wma(values, half);
    let slow = wma(values, period);
    let raw: Vec<f64> = fast
        .iter()
        .zip(slow.iter())
        .map(|(f, s)| 2.0 * f - s)
        .collect();
    wma(&raw, root)
}

/// Relative strength index with Wilder smoothing. The output starts after
/// the warm-up, so its length is `values.len() - period` (empty when the
/// series is too short).
pub fn rsi(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.len() < period + 1 {
        return vec![];
    }
    let mut gains = 0.0;
    let mut losses = 0.0;
    for i in 1..=period {
        let change = values[i] - values[i - 1];
        if change > 0.0 {
            gains += change;
        } else {
            losses += -change;
        }
    }
    let mut avg_gain = gains / period as f64;
    let mut avg_loss = losses / period as f64;
    let mut out = Vec::with_capacity(values.len() - period);
    out.push(rsi_value(avg_gain, avg_loss));
    for i in (period + 1)..values.len() {
        let change = values[i] - values[i - 1];
        let (gain, loss) = if change > 0.0 {
            (change, 0.0)
        } else {
            (0.0, -change)
        };
        avg_gain = (avg_gain * (period as f64 - 1.0) + gain) / period as f64;
        avg_loss = (avg_loss * (period as f64 - 1.0) + loss) / period as f64;
        out.push(rsi_value(avg_gain, avg_loss));
    }
    out
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        100.0
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    }
}

/// Bollinger bands (SMA ± k·σ), aligned to the input length.
pub struct BollingerBands {
    pub upper: Vec<f64>,
    pub middle: Vec<f64>,
    pub lower: Vec<f64>,
}

pub fn bollinger(values: &[f64], period: usize, k: f64) -> BollingerBands {
    let mut bands = BollingerBands {
        upper: Vec::with_capacity(values.len()),
        middle: Vec::with_capacity(values.len()),
        lower: Vec::with_capacity(values.len()),
    };
    if period == 0 {
        return bands;
    }
    for i in 0..values.len() {
        let start = (i + 1).saturating_sub(period);
        let window = &values[start..=i];
        let mean = window.iter().sum::<f64>() / window.len() as f64;
        let var = window.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / window.len() as f64;
        let sd = var.sqrt();
        bands.middle.push(mean);
        bands.upper.push(mean + k * sd);
        bands.lower.push(mean - k * sd);
    }
    bands
}

/// Average true range over the last `period` bars. `None` when the window
/// is too short.
pub fn atr(candles: &[Candle], period: usize) -> Option<f64> {
    if period == 0 || candles.len() < period + 1 {
        return None;
    }
    let mut trs = Vec::with_capacity(candles.len() - 1);
    for i in 1..candles.len() {
        let high = candles[i].high.value();
        let low = candles[i].low.value();
        let prev_close = candles[i - 1].close.value();
        let tr = (high - low)
            .max((high - prev_close).abs())
            .max((low - prev_close).abs());
        trs.push(tr);
    }
    let tail = &trs[trs.len() - period..];
    Some(tail.iter().sum::<f64>() / period as f64)
}

/// Mean volume of the window excluding the most recent bar, which is the
/// bar being compared against the average.
pub fn volume_average(volumes: &[f64]) -> f64 {
    if volumes.len() < 2 {
        return 0.0;
    }
    let head = &volumes[..volumes.len() - 1];
    head.iter().sum::<f64>() / head.len() as f64
}
