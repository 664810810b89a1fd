use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// OHLCV candlestick, as returned by the exchange
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Candle {
    pub open_time: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    pub close_time: DateTime<Utc>,
}

/// Price and quantity precision constraints published by the exchange
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SymbolRules {
    pub symbol: String,
    pub tick_size: Decimal, // Minimum price increment
    pub step_size: Decimal, // Minimum quantity increment
    pub min_qty: Decimal,
}

/// Indicator values derived from one candle sequence
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndicatorSnapshot {
    pub short_average: f64,
    pub long_average: f64,
    pub oscillator: f64, // 0-100
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the sequencer wants to trade, built fresh for each decision
#[derive(Debug, Clone, PartialEq)]
pub struct TradeIntent {
    pub symbol: String,
    pub side: Side,
    pub quantity: Decimal,
    pub reference_price: Decimal,
    pub use_entire_balance: bool,
}

impl TradeIntent {
    pub fn buy(symbol: &str, quantity: Decimal, reference_price: Decimal) -> Self {
        Self {
            symbol: symbol.to_string(),
            side: Side::Buy,
            quantity,
            reference_price,
            use_entire_balance: false,
        }
    }

    /// Sell whatever base-asset balance is available at submission time
    pub fn sell_all(symbol: &str, reference_price: Decimal) -> Self {
        Self {
            symbol: symbol.to_string(),
            side: Side::Sell,
            quantity: Decimal::ZERO,
            reference_price,
            use_entire_balance: true,
        }
    }
}

/// Outcome of a single order submission
#[derive(Debug, Clone, PartialEq)]
pub struct OrderResult {
    pub success: bool,
    pub quantity: Decimal,
    pub order_id: Option<String>,
    pub client_order_id: Option<String>,
    pub failure_reason: Option<String>,
}

impl OrderResult {
    pub fn accepted(quantity: Decimal, order_id: String, client_order_id: String) -> Self {
        Self {
            success: true,
            quantity,
            order_id: Some(order_id),
            client_order_id: Some(client_order_id),
            failure_reason: None,
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            quantity: Decimal::ZERO,
            order_id: None,
            client_order_id: None,
            failure_reason: Some(reason.into()),
        }
    }
}

/// Free balance of one asset
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Balance {
    pub asset: String,
    pub free: Decimal,
}

/// Buy that went through without a take-profit order behind it
#[derive(Debug, Clone, PartialEq)]
pub struct UnresolvedPosition {
    pub symbol: String,
    pub entry_price: Decimal,
    pub quantity: Decimal,
    pub reason: String,
}

/// Per-pair state owned by the runner, in memory only
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleState {
    pub entry_price: Option<Decimal>, // Set only after a confirmed buy
    pub consecutive_errors: u32,
    pub unresolved_position: Option<UnresolvedPosition>,
}

impl CycleState {
    pub fn record_success(&mut self) {
        self.consecutive_errors = 0;
    }

    pub fn record_failure(&mut self) -> u32 {
        self.consecutive_errors = self.consecutive_errors.saturating_add(1);
        self.consecutive_errors
    }
}
