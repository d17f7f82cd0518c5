pub mod indicators;
pub mod registry;
pub mod stop_engine;
pub mod strategies;
