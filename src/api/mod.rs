pub mod auth;
pub mod binance;

pub use binance::BinanceClient;

use crate::error::ExchangeError;
use crate::models::{Candle, OrderResult, Side, SymbolRules};
use async_trait::async_trait;
use rust_decimal::Decimal;

/// Signed request/response access to a spot exchange.
///
/// The trading core only talks to the exchange through this trait, so tests
/// can substitute a scripted implementation.
#[async_trait]
pub trait ExchangeTransport: Send + Sync {
    /// Recent candles, oldest first
    async fn get_candles(
        &self,
        symbol: &str,
        interval: &str,
        limit: u32,
    ) -> Result<Vec<Candle>, ExchangeError>;

    /// Precision rules for a symbol, `None` if the exchange does not list it
    async fn get_symbol_rules(&self, symbol: &str) -> Result<Option<SymbolRules>, ExchangeError>;

    /// Free balance of an asset, zero when the account holds none
    async fn get_balance(&self, asset: &str) -> Result<Decimal, ExchangeError>;

    async fn submit_market_order(
        &self,
        symbol: &str,
        side: Side,
        quantity: Decimal,
    ) -> Result<OrderResult, ExchangeError>;

    async fn submit_limit_order(
        &self,
        symbol: &str,
        side: Side,
        quantity: Decimal,
        price: Decimal,
    ) -> Result<OrderResult, ExchangeError>;
}
