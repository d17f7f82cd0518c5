pub mod balance;
pub mod candle;
pub mod order;
pub mod symbol_info;
pub mod symbol_record;
