// Technical indicators module
// Moving-average crossover inputs and the Wilder RSI oscillator

pub mod moving_average;
pub mod rsi;

pub use moving_average::moving_average;
pub use rsi::{oscillator, DEFAULT_OSCILLATOR_PERIOD};

use crate::error::TradeError;
use crate::models::{Candle, IndicatorSnapshot};
use rust_decimal::prelude::ToPrimitive;

/// Extract close prices from candles, oldest first
pub fn closes(candles: &[Candle]) -> Vec<f64> {
    candles
        .iter()
        .filter_map(|c| c.close.to_f64())
        .collect()
}

impl IndicatorSnapshot {
    /// Compute both moving averages and the oscillator over the same closes
    pub fn compute(
        closes: &[f64],
        short_period: usize,
        long_period: usize,
        oscillator_period: usize,
    ) -> Result<Self, TradeError> {
        Ok(Self {
            short_average: moving_average(closes, short_period)?,
            long_average: moving_average(closes, long_period)?,
            oscillator: oscillator(closes, oscillator_period)?,
        })
    }
}
