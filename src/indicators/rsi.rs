use crate::error::TradeError;

pub const DEFAULT_OSCILLATOR_PERIOD: usize = 14;

/// Wilder-smoothed Relative Strength Index (RSI)
///
/// Seeds the average gain/loss with the simple mean of the first `period`
/// deltas, then smooths every later delta with weight `1/period`.
///
/// Values:
/// - RSI > 70: Overbought
/// - RSI < 30: Oversold
///
/// An average loss of exactly zero yields 100.
pub fn oscillator(closes: &[f64], period: usize) -> Result<f64, TradeError> {
    if period == 0 || closes.len() < period + 1 {
        return Err(TradeError::InsufficientData {
            needed: period + 1,
            available: closes.len(),
        });
    }

    let (gains, losses): (Vec<f64>, Vec<f64>) = closes
        .windows(2)
        .map(|pair| {
            let change = pair[1] - pair[0];
            if change > 0.0 {
                (change, 0.0)
            } else {
                (0.0, -change)
            }
        })
        .unzip();

    let period_f = period as f64;
    let mut avg_gain = gains[..period].iter().sum::<f64>() / period_f;
    let mut avg_loss = losses[..period].iter().sum::<f64>() / period_f;

    for (gain, loss) in gains[period..].iter().zip(&losses[period..]) {
        avg_gain = (avg_gain * (period_f - 1.0) + gain) / period_f;
        avg_loss = (avg_loss * (period_f - 1.0) + loss) / period_f;
    }

    if avg_loss == 0.0 {
        return Ok(100.0);
    }

    let rs = avg_gain / avg_loss;
    Ok(100.0 - (100.0 / (1.0 + rs)))
}
