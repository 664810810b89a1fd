use crate::api::ExchangeTransport;
use crate::error::TradeError;
use crate::models::Candle;
use rust_decimal::Decimal;
use std::sync::Arc;

/// Fetches candle history and balances for the trading cycle
#[derive(Clone)]
pub struct MarketDataFeed {
    transport: Arc<dyn ExchangeTransport>,
}

impl MarketDataFeed {
    pub fn new(transport: Arc<dyn ExchangeTransport>) -> Self {
        Self { transport }
    }

    /// Fetch the most recent `limit` candles, oldest first
    ///
    /// Fails with `InsufficientData` when fewer than `min_required` come back.
    pub async fn snapshot(
        &self,
        symbol: &str,
        interval: &str,
        limit: u32,
        min_required: usize,
    ) -> Result<Vec<Candle>, TradeError> {
        let candles = self.transport.get_candles(symbol, interval, limit).await?;

        if candles.len() < min_required {
            return Err(TradeError::InsufficientData {
                needed: min_required,
                available: candles.len(),
            });
        }

        if candles.windows(2).any(|w| w[1].open_time < w[0].open_time) {
            return Err(TradeError::InvalidResponse(format!(
                "candles for {} are not sorted by open time",
                symbol
            )));
        }

        tracing::debug!(symbol, count = candles.len(), "Fetched candles");
        Ok(candles)
    }

    /// Close of the most recent candle
    pub fn latest_price(candles: &[Candle]) -> Option<Decimal> {
        candles.last().map(|c| c.close)
    }

    /// Free balance of `asset`; zero when the account does not hold it
    pub async fn available_balance(&self, asset: &str) -> Result<Decimal, TradeError> {
        Ok(self.transport.get_balance(asset).await?)
    }
}
