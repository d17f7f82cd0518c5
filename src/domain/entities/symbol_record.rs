//! Per-symbol lifecycle record.
//!
//! A symbol is either absent from the registry (untracked) or carries one
//! of the states below. The open-position payload only exists in the
//! `Bought` variant, so "reserved" records cannot be read as positions by
//! mistake.

use crate::domain::errors::ValidationError;
use std::fmt;

/// Why a position was closed. Set transiently on the record when a stop
/// trigger fires and cleared when the record is removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// Price closed back below the reference moving average.
    TrendExit,
    /// Trailing Δ-stop fired: value fell to the ratcheted floor.
    DeltaStop,
    /// Position value fell to the absolute floor.
    AbsStop,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::TrendExit => write!(f, "EMA9-EXIT"),
            ExitReason::DeltaStop => write!(f, "Δ-STOP"),
            ExitReason::AbsStop => write!(f, "ABS-STOP"),
        }
    }
}

/// Payload valid only while a position is open.
#[derive(Debug, Clone)]
pub struct OpenPosition {
    pub entry_price: f64,
    /// Quote-currency cost including fees.
    pub entry_cost: f64,
    pub quantity: f64,
    /// Highest observed position value. Never decreases.
    pub max_value: f64,
    /// Position exits when its value falls to this floor. Never decreases
    /// once trailing is armed.
    pub stop_floor: f64,
    /// The trailing stop only ratchets once the arming threshold
    /// (`entry_cost + δ + margin`) has been reached.
    pub trailing_armed: bool,
    /// True for positions adopted from the venue balance rather than
    /// opened by the entry engine.
    pub synced: bool,
    /// Guards against two passes selling the same position.
    pub exit_in_flight: bool,
    pub exit_reason: Option<ExitReason>,
}

impl OpenPosition {
    /// A position opened by the entry engine. Trailing starts disarmed;
    /// the initial floor sits δ under the entry cost.
    pub fn opened(
        entry_price: f64,
        entry_cost: f64,
        quantity: f64,
        delta: f64,
    ) -> Result<Self, ValidationError> {
        if !(entry_cost > 0.0 && quantity > 0.0) {
            return Err(ValidationError::EmptyPosition);
        }
        Ok(OpenPosition {
            entry_price,
            entry_cost,
            quantity,
            max_value: entry_cost,
            stop_floor: entry_cost - delta,
            trailing_armed: false,
            synced: false,
            exit_in_flight: false,
            exit_reason: None,
        })
    }

    /// A position adopted by reconciliation. The current market value acts
    /// as a synthetic entry cost and trailing protection arms immediately.
    pub fn adopted(price: f64, quantity: f64, delta: f64) -> Result<Self, ValidationError> {
        let value = price * quantity;
        if !(value > 0.0 && quantity > 0.0) {
            return Err(ValidationError::EmptyPosition);
        }
        Ok(OpenPosition {
            entry_price: price,
            entry_cost: value,
            quantity,
            max_value: value,
            stop_floor: value - delta,
            trailing_armed: true,
            synced: true,
            exit_in_flight: false,
            exit_reason: None,
        })
    }

    pub fn value_at(&self, price: f64) -> f64 {
        self.quantity * price
    }
}

/// Lifecycle state of a tracked symbol.
#[derive(Debug, Clone)]
pub enum SymbolState {
    /// Early crossover signal, not yet confirmed.
    PreCross,
    /// Confirmed candidate, eligible for entry evaluation.
    Reserved,
    /// Fully-formed breakout/spike candidate, eligible for entry evaluation.
    ReservedNew,
    /// A buy order is in flight. Holds an admission slot so concurrent
    /// passes cannot overshoot the open-position ceiling; remembers which
    /// reserved flavor to restore if the buy is rolled back.
    Buying {
        /// True when admitted from `ReservedNew`.
        reserved_new: bool,
    },
    /// Open position.
    Bought(OpenPosition),
}

impl SymbolState {
    pub fn is_reserved(&self) -> bool {
        matches!(self, SymbolState::Reserved | SymbolState::ReservedNew)
    }

    pub fn is_bought(&self) -> bool {
        matches!(self, SymbolState::Bought(_))
    }

    /// States counted against the open-position ceiling.
    pub fn holds_open_slot(&self) -> bool {
        matches!(self, SymbolState::Buying { .. } | SymbolState::Bought(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            SymbolState::PreCross => "PRE_CROSS",
            SymbolState::Reserved => "RESERVED",
            SymbolState::ReservedNew => "RESERVED_NEW",
            SymbolState::Buying { .. } => "BUYING",
            SymbolState::Bought(_) => "BOUGHT",
        }
    }
}
