pub mod exit_executor;
pub mod fees;
pub mod market_gateway;
