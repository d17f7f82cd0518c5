pub mod exchange_api;
pub mod notifier;
pub mod trade_ledger;

pub use exchange_api::ExchangeApi;
pub use notifier::Notifier;
pub use trade_ledger::{SaleRecord, TradeLedger};
