// src/symbols/mod.rs
pub mod stock_symbol;

pub use stock_symbol::{normalize_symbol, provider_symbol};
