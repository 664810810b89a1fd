use rust_decimal::Decimal;
use thiserror::Error;

/// Failure reported by an [`ExchangeTransport`](crate::api::ExchangeTransport).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExchangeError {
    #[error("network error: {0}")]
    Network(String),

    #[error("exchange error {code}: {message}")]
    Exchange { code: i64, message: String },

    #[error("failed to decode exchange response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for ExchangeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ExchangeError::Decode(err.to_string())
        } else {
            ExchangeError::Network(err.to_string())
        }
    }
}

/// Everything that can end a trading cycle early.
///
/// None of these are fatal: the runner logs them, cools down and moves on.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TradeError {
    #[error("insufficient data: {available} values, need {needed}")]
    InsufficientData { needed: usize, available: usize },

    #[error("symbol {0} not found on exchange")]
    SymbolNotFound(String),

    #[error("exchange rules unavailable for {symbol}: {reason}")]
    RulesUnavailable { symbol: String, reason: String },

    #[error("order too small: notional {notional} below minimum {minimum}")]
    OrderTooSmall { notional: Decimal, minimum: Decimal },

    #[error("order rejected by exchange (code {code}): {message}")]
    OrderRejected { code: i64, message: String },

    #[error("no {asset} balance to sell")]
    NoBalanceToSell { asset: String },

    #[error("network failure: {0}")]
    NetworkFailure(String),

    #[error("exchange error {code}: {message}")]
    Exchange { code: i64, message: String },

    #[error("invalid exchange response: {0}")]
    InvalidResponse(String),
}

impl TradeError {
    /// Exchange error code, when the failure carries one.
    pub fn code(&self) -> Option<i64> {
        match self {
            TradeError::OrderRejected { code, .. } | TradeError::Exchange { code, .. } => {
                Some(*code)
            }
            _ => None,
        }
    }

    /// Converts a transport failure raised while submitting an order.
    pub fn from_order_submission(err: ExchangeError) -> Self {
        match err {
            ExchangeError::Exchange { code, message } => TradeError::OrderRejected { code, message },
            other => other.into(),
        }
    }
}

impl From<ExchangeError> for TradeError {
    fn from(err: ExchangeError) -> Self {
        match err {
            ExchangeError::Network(msg) => TradeError::NetworkFailure(msg),
            ExchangeError::Exchange { code, message } => TradeError::Exchange { code, message },
            ExchangeError::Decode(msg) => TradeError::InvalidResponse(msg),
        }
    }
}
