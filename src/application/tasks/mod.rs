pub mod crossover;
pub mod discovery;
pub mod manual_watch;
pub mod monitor;
pub mod reconciliation;
pub mod replenish;
pub mod spike;
