//! Stop-decision engine.
//!
//! Pure decision logic over an open position and the latest price.
//! Triggers are evaluated in fixed priority order: trend-reversal exit,
//! trailing Δ-stop, absolute floor. The first trigger wins; reasons are
//! never stacked.

use crate::domain::entities::symbol_record::{ExitReason, OpenPosition};

#[derive(Debug, Clone)]
pub struct StopParams {
    /// Trailing drawdown allowance in quote currency.
    pub delta: f64,
    /// Extra profit (beyond δ) required before the trailing stop arms.
    pub arm_margin: f64,
    /// Absolute position-value floor in quote currency.
    pub abs_floor: f64,
    /// Above this per-unit price the absolute floor scales with quantity
    /// instead, so high-priced assets do not stop out at dust level.
    pub high_price_threshold: f64,
    pub high_price_factor: f64,
}

impl Default for StopParams {
    fn default() -> Self {
        StopParams {
            delta: 1.0,
            arm_margin: 1.0,
            abs_floor: 18.0,
            high_price_threshold: 55.0,
            high_price_factor: 51.0,
        }
    }
}

/// Evaluate exit triggers for one position.
///
/// Mutates the trailing state (`max_value`, `stop_floor`, `trailing_armed`)
/// as a side effect; both ratchet monotonically upward. `quantity` is
/// passed separately because reconciliation evaluates the externally
/// observed quantity, not the tracked one.
pub fn decide_exit(
    pos: &mut OpenPosition,
    quantity: f64,
    last_price: f64,
    trend_ref: Option<f64>,
    p: &StopParams,
) -> Option<ExitReason> {
    if let Some(reference) = trend_ref {
        if last_price <= reference {
            return Some(ExitReason::TrendExit);
        }
    }

    let value = quantity * last_price;

    if value > pos.max_value {
        pos.max_value = value;
    }
    if !pos.trailing_armed && value >= pos.entry_cost + p.delta + p.arm_margin {
        pos.trailing_armed = true;
    }
    if pos.trailing_armed {
        let candidate = pos.max_value - p.delta;
        if candidate > pos.stop_floor {
            pos.stop_floor = candidate;
        }
        if value <= pos.stop_floor {
            return Some(ExitReason::DeltaStop);
        }
    }

    let abs_floor = if last_price >= p.high_price_threshold {
        p.high_price_factor * quantity
    } else {
        p.abs_floor
    };
    if value <= abs_floor {
        return Some(ExitReason::AbsStop);
    }

    None
}
