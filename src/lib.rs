//! Candela: an automated spot-trading loop.
//!
//! Independent periodic tasks discover candidate symbols, open positions
//! behind a capacity guard, manage them with a trailing/absolute stop
//! engine, and reconcile the registry against the venue's account
//! balance. All venue traffic funnels through one rate-limited caching
//! gateway; all state transitions go through one shared registry.

pub mod application;
pub mod config;
pub mod control;
pub mod domain;
pub mod infrastructure;
pub mod persistence;
pub mod supervisor;
