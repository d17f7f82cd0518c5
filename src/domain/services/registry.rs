//! Shared symbol registry and exclusion list.
//!
//! The registry is the single source of truth mutated by every pipeline
//! stage. All state transitions happen inside one lock acquisition, so a
//! symbol's read-decide-write sequence is atomic with respect to every
//! other task. Network calls never run under the lock; the `Buying`
//! state holds an admission slot while an order is in flight so that two
//! concurrent passes cannot both fill the last free slot.

use crate::domain::entities::symbol_record::{OpenPosition, SymbolState};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Outcome of an admission attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmitOutcome {
    /// Slot granted; the record is now `Buying`.
    Admitted,
    /// Open-position ceiling reached; the record stays reserved.
    CapacityFull,
    /// The record is not in a reserved state (or not tracked at all).
    NotReserved,
}

#[derive(Default)]
pub struct SymbolRegistry {
    records: Mutex<HashMap<String, SymbolState>>,
}

impl SymbolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, SymbolState>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.lock().contains_key(symbol)
    }

    pub fn get(&self, symbol: &str) -> Option<SymbolState> {
        self.lock().get(symbol).cloned()
    }

    pub fn tracked_symbols(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    pub fn symbols_in_pre_cross(&self) -> Vec<String> {
        self.lock()
            .iter()
            .filter(|(_, s)| matches!(s, SymbolState::PreCross))
            .map(|(k, _)| k.clone())
            .collect()
    }

    /// Number of records holding an open-position slot (`Buying` or
    /// `Bought`).
    pub fn open_slots(&self) -> usize {
        self.lock().values().filter(|s| s.holds_open_slot()).count()
    }

    pub fn bought_count(&self) -> usize {
        self.lock().values().filter(|s| s.is_bought()).count()
    }

    /// Insert a candidate if the symbol is untracked and total tracking
    /// capacity allows. Returns true only when a new record was created,
    /// which makes discovery idempotent: a second identical scan inserts
    /// (and notifies) nothing.
    pub fn insert_candidate(&self, symbol: &str, state: SymbolState, max_tracked: usize) -> bool {
        let mut records = self.lock();
        if records.contains_key(symbol) || records.len() >= max_tracked {
            return false;
        }
        records.insert(symbol.to_string(), state);
        true
    }

    /// Operator override: force a reserved record regardless of tracking
    /// capacity, still refusing to clobber an existing record.
    pub fn force_reserved(&self, symbol: &str) -> bool {
        let mut records = self.lock();
        if records.contains_key(symbol) {
            return false;
        }
        records.insert(symbol.to_string(), SymbolState::Reserved);
        true
    }

    /// `PreCross -> Reserved`, only from `PreCross`.
    pub fn promote_pre_cross(&self, symbol: &str) -> bool {
        let mut records = self.lock();
        match records.get(symbol) {
            Some(SymbolState::PreCross) => {
                records.insert(symbol.to_string(), SymbolState::Reserved);
                true
            }
            _ => false,
        }
    }

    /// Single admission decision: checks the ceiling and claims the slot
    /// in one critical section.
    pub fn try_admit(&self, symbol: &str, ceiling: usize) -> AdmitOutcome {
        let mut records = self.lock();
        let reserved_new = match records.get(symbol) {
            Some(SymbolState::ReservedNew) => true,
            Some(SymbolState::Reserved) => false,
            _ => return AdmitOutcome::NotReserved,
        };
        let open = records.values().filter(|s| s.holds_open_slot()).count();
        if open >= ceiling {
            return AdmitOutcome::CapacityFull;
        }
        records.insert(symbol.to_string(), SymbolState::Buying { reserved_new });
        AdmitOutcome::Admitted
    }

    /// `Buying -> Bought` after the order settled.
    pub fn confirm_buy(&self, symbol: &str, position: OpenPosition) -> bool {
        let mut records = self.lock();
        match records.get(symbol) {
            Some(SymbolState::Buying { .. }) => {
                records.insert(symbol.to_string(), SymbolState::Bought(position));
                true
            }
            _ => false,
        }
    }

    /// Release an admission slot without buying, restoring the reserved
    /// flavor the record held before admission (used when a pre-flight
    /// check fails after admission).
    pub fn rollback_admit(&self, symbol: &str) {
        let mut records = self.lock();
        if let Some(SymbolState::Buying { reserved_new }) = records.get(symbol) {
            let restored = if *reserved_new {
                SymbolState::ReservedNew
            } else {
                SymbolState::Reserved
            };
            records.insert(symbol.to_string(), restored);
        }
    }

    /// Run a closure against the open position of `symbol` under the
    /// registry lock. The closure must not block; network calls belong
    /// outside.
    pub fn update_bought<R>(
        &self,
        symbol: &str,
        f: impl FnOnce(&mut OpenPosition) -> R,
    ) -> Option<R> {
        let mut records = self.lock();
        match records.get_mut(symbol) {
            Some(SymbolState::Bought(pos)) => Some(f(pos)),
            _ => None,
        }
    }

    /// Adopt an externally observed holding as an open position,
    /// replacing whatever non-bought record existed. Returns false if the
    /// symbol is already `Bought` or has a buy in flight.
    pub fn adopt_position(&self, symbol: &str, position: OpenPosition) -> bool {
        let mut records = self.lock();
        match records.get(symbol) {
            Some(SymbolState::Bought(_)) | Some(SymbolState::Buying { .. }) => false,
            _ => {
                records.insert(symbol.to_string(), SymbolState::Bought(position));
                true
            }
        }
    }

    pub fn remove(&self, symbol: &str) -> Option<SymbolState> {
        self.lock().remove(symbol)
    }

    /// Remove a candidate record, leaving open positions (and in-flight
    /// buys) alone. Used when reconciliation finds nothing behind a
    /// not-yet-bought symbol worth keeping.
    pub fn drop_candidate(&self, symbol: &str) -> bool {
        let mut records = self.lock();
        match records.get(symbol) {
            Some(state) if !state.holds_open_slot() => {
                records.remove(symbol);
                true
            }
            _ => false,
        }
    }
}

/// Timed re-discovery bans. A symbol with a live entry is ineligible for
/// discovery and replenishment until the entry expires.
#[derive(Default)]
pub struct ExclusionList {
    entries: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl ExclusionList {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, DateTime<Utc>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn exclude_for(&self, symbol: &str, cooldown: Duration) {
        let expiry = Utc::now()
            + ChronoDuration::from_std(cooldown).unwrap_or_else(|_| ChronoDuration::seconds(0));
        self.lock().insert(symbol.to_string(), expiry);
    }

    pub fn is_excluded(&self, symbol: &str) -> bool {
        let mut entries = self.lock();
        match entries.get(symbol) {
            Some(expiry) if *expiry > Utc::now() => true,
            Some(_) => {
                entries.remove(symbol);
                false
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

/// Venue-wide entry pause armed after an insufficient-balance rejection.
#[derive(Default)]
pub struct EntryThrottle {
    until: Mutex<Option<Instant>>,
}

impl EntryThrottle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arm(&self, cooldown: Duration) {
        let mut until = self.until.lock().unwrap_or_else(PoisonError::into_inner);
        *until = Some(Instant::now() + cooldown);
    }

    pub fn is_active(&self) -> bool {
        let mut until = self.until.lock().unwrap_or_else(PoisonError::into_inner);
        match *until {
            Some(t) if t > Instant::now() => true,
            Some(_) => {
                *until = None;
                false
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::symbol_record::OpenPosition;

    fn position() -> OpenPosition {
        OpenPosition::opened(1.0, 20.0, 20.0, 1.0).unwrap()
    }

    #[test]
    fn insert_candidate_is_idempotent() {
        let reg = SymbolRegistry::new();
        assert!(reg.insert_candidate("AAAUSDT", SymbolState::Reserved, 20));
        assert!(!reg.insert_candidate("AAAUSDT", SymbolState::ReservedNew, 20));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn insert_candidate_respects_tracking_capacity() {
        let reg = SymbolRegistry::new();
        assert!(reg.insert_candidate("AAAUSDT", SymbolState::Reserved, 2));
        assert!(reg.insert_candidate("BBBUSDT", SymbolState::Reserved, 2));
        assert!(!reg.insert_candidate("CCCUSDT", SymbolState::Reserved, 2));
    }

    #[test]
    fn admission_claims_slot_atomically() {
        let reg = SymbolRegistry::new();
        reg.insert_candidate("AAAUSDT", SymbolState::Reserved, 20);
        reg.insert_candidate("BBBUSDT", SymbolState::ReservedNew, 20);

        assert_eq!(reg.try_admit("AAAUSDT", 1), AdmitOutcome::Admitted);
        // The in-flight buy already occupies the only slot.
        assert_eq!(reg.try_admit("BBBUSDT", 1), AdmitOutcome::CapacityFull);
        assert_eq!(reg.open_slots(), 1);

        assert!(reg.confirm_buy("AAAUSDT", position()));
        assert_eq!(reg.bought_count(), 1);
        assert_eq!(reg.try_admit("BBBUSDT", 1), AdmitOutcome::CapacityFull);
    }

    #[test]
    fn admission_requires_reserved_state() {
        let reg = SymbolRegistry::new();
        assert_eq!(reg.try_admit("AAAUSDT", 5), AdmitOutcome::NotReserved);
        reg.insert_candidate("AAAUSDT", SymbolState::PreCross, 20);
        assert_eq!(reg.try_admit("AAAUSDT", 5), AdmitOutcome::NotReserved);
    }

    #[test]
    fn rollback_restores_the_original_reserved_flavor() {
        let reg = SymbolRegistry::new();
        reg.insert_candidate("AAAUSDT", SymbolState::Reserved, 20);
        reg.insert_candidate("BBBUSDT", SymbolState::ReservedNew, 20);
        assert_eq!(reg.try_admit("AAAUSDT", 5), AdmitOutcome::Admitted);
        assert_eq!(reg.try_admit("BBBUSDT", 5), AdmitOutcome::Admitted);

        reg.rollback_admit("AAAUSDT");
        reg.rollback_admit("BBBUSDT");

        assert!(matches!(reg.get("AAAUSDT"), Some(SymbolState::Reserved)));
        assert!(matches!(reg.get("BBBUSDT"), Some(SymbolState::ReservedNew)));
        assert_eq!(reg.open_slots(), 0);
    }

    #[test]
    fn promote_only_from_pre_cross() {
        let reg = SymbolRegistry::new();
        reg.insert_candidate("AAAUSDT", SymbolState::PreCross, 20);
        assert!(reg.promote_pre_cross("AAAUSDT"));
        assert!(matches!(reg.get("AAAUSDT"), Some(SymbolState::Reserved)));
        // Already promoted: a second confirmation is a no-op.
        assert!(!reg.promote_pre_cross("AAAUSDT"));
        assert!(!reg.promote_pre_cross("BBBUSDT"));
    }

    #[test]
    fn update_bought_only_touches_open_positions() {
        let reg = SymbolRegistry::new();
        reg.insert_candidate("AAAUSDT", SymbolState::Reserved, 20);
        assert!(reg.update_bought("AAAUSDT", |p| p.max_value).is_none());

        reg.try_admit("AAAUSDT", 5);
        reg.confirm_buy("AAAUSDT", position());
        let max = reg.update_bought("AAAUSDT", |p| {
            p.max_value = 25.0;
            p.max_value
        });
        assert_eq!(max, Some(25.0));
    }

    #[test]
    fn adopt_never_overwrites_open_position() {
        let reg = SymbolRegistry::new();
        reg.insert_candidate("AAAUSDT", SymbolState::Reserved, 20);
        assert!(reg.adopt_position("AAAUSDT", position()));
        assert!(!reg.adopt_position("AAAUSDT", position()));
        assert_eq!(reg.bought_count(), 1);
    }

    #[test]
    fn drop_candidate_spares_open_positions() {
        let reg = SymbolRegistry::new();
        reg.insert_candidate("AAAUSDT", SymbolState::Reserved, 20);
        reg.insert_candidate("BBBUSDT", SymbolState::PreCross, 20);
        reg.insert_candidate("CCCUSDT", SymbolState::Reserved, 20);
        reg.try_admit("CCCUSDT", 5);
        reg.confirm_buy("CCCUSDT", position());

        assert!(reg.drop_candidate("AAAUSDT"));
        assert!(reg.drop_candidate("BBBUSDT"));
        assert!(!reg.drop_candidate("CCCUSDT"));
        assert!(reg.contains("CCCUSDT"));
        assert!(!reg.contains("AAAUSDT"));
    }

    #[test]
    fn exclusion_expires() {
        let excl = ExclusionList::new();
        excl.exclude_for("AAAUSDT", Duration::from_secs(60));
        assert!(excl.is_excluded("AAAUSDT"));

        excl.exclude_for("BBBUSDT", Duration::from_secs(0));
        assert!(!excl.is_excluded("BBBUSDT"));
        // Expired entries are pruned on check.
        assert_eq!(excl.len(), 1);
    }

    #[test]
    fn throttle_arms_and_expires() {
        let throttle = EntryThrottle::new();
        assert!(!throttle.is_active());
        throttle.arm(Duration::from_secs(60));
        assert!(throttle.is_active());
        throttle.arm(Duration::from_secs(0));
        assert!(!throttle.is_active());
    }
}
