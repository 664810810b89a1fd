// Core modules
pub mod api;
pub mod audit;
pub mod config;
pub mod error;
pub mod execution;
pub mod indicators;
pub mod models;

// Re-export commonly used types
pub use api::{BinanceClient, ExchangeTransport};
pub use error::{ExchangeError, TradeError};
pub use models::*;
