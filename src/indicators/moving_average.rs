use crate::error::TradeError;

/// Calculate Simple Moving Average (SMA) over the last `period` values
pub fn moving_average(closes: &[f64], period: usize) -> Result<f64, TradeError> {
    if period == 0 || closes.len() < period {
        return Err(TradeError::InsufficientData {
            needed: period.max(1),
            available: closes.len(),
        });
    }

    let sum: f64 = closes.iter().rev().take(period).sum();
    Ok(sum / period as f64)
}
