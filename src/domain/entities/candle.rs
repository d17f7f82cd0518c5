use crate::domain::errors::ValidationError;
use crate::domain::value_objects::price::Price;

/// One kline bar as returned by the venue.
///
/// Quote volume and taker-buy quote volume are carried because the
/// buy-spike discovery strategy needs the taker buy ratio of a single bar.
#[derive(Debug, Clone)]
pub struct Candle {
    pub open_time_ms: i64,
    pub open: Price,
    pub high: Price,
    pub low: Price,
    pub close: Price,
    pub volume: f64,
    pub quote_volume: f64,
    pub taker_buy_quote_volume: f64,
}

impl Candle {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        open_time_ms: i64,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
        quote_volume: f64,
        taker_buy_quote_volume: f64,
    ) -> Result<Self, ValidationError> {
        Ok(Candle {
            open_time_ms,
            open: Price::new(open)?,
            high: Price::new(high)?,
            low: Price::new(low)?,
            close: Price::new(close)?,
            volume,
            quote_volume,
            taker_buy_quote_volume,
        })
    }

    /// Share of the bar's quote volume that came from taker buys.
    pub fn taker_buy_ratio(&self) -> f64 {
        if self.quote_volume > 0.0 {
            self.taker_buy_quote_volume / self.quote_volume
        } else {
            0.0
        }
    }
}

/// Close series extracted from a bar window.
pub fn closes(candles: &[Candle]) -> Vec<f64> {
    candles.iter().map(|c| c.close.value()).collect()
}

/// Volume series extracted from a bar window.
pub fn volumes(candles: &[Candle]) -> Vec<f64> {
    candles.iter().map(|c| c.volume).collect()
}
