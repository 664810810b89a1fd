#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use spotbot::audit::AuditLogger;
use spotbot::config::{PairConfig, Settings};
use spotbot::error::ExchangeError;
use spotbot::models::{Balance, Candle, OrderResult, Side, SymbolRules};
use spotbot::ExchangeTransport;
use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub fn dec(value: &str) -> Decimal {
    Decimal::from_str(value).unwrap()
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubmittedOrder {
    pub symbol: String,
    pub side: Side,
    pub quantity: Decimal,
    pub limit_price: Option<Decimal>,
}

/// In-memory exchange with scripted candles, rules, balances and failures
#[derive(Default)]
pub struct ScriptedExchange {
    candles: Mutex<HashMap<String, Vec<Candle>>>,
    rules: Mutex<HashMap<String, SymbolRules>>,
    balances: Mutex<HashMap<String, Decimal>>,
    failing_candles: Mutex<HashSet<String>>,
    crashing_candles: Mutex<HashSet<String>>,
    candle_requests_by_symbol: Mutex<HashMap<String, usize>>,
    balance_requests: Mutex<Vec<String>>,
    order_rejection: Mutex<Option<(Side, ExchangeError)>>,
    rules_unavailable: Mutex<bool>,
    credit_fills: Mutex<bool>,
    orders: Mutex<Vec<SubmittedOrder>>,
    pub rules_lookups: AtomicUsize,
    pub candle_requests: AtomicUsize,
}

impl ScriptedExchange {
    pub fn new() -> Self {
        let exchange = Self::default();
        *exchange.credit_fills.lock().unwrap() = true;
        exchange
    }

    pub fn with_rules(self, symbol: &str, tick: &str, step: &str, min_qty: &str) -> Self {
        self.rules.lock().unwrap().insert(
            symbol.to_string(),
            SymbolRules {
                symbol: symbol.to_string(),
                tick_size: dec(tick),
                step_size: dec(step),
                min_qty: dec(min_qty),
            },
        );
        self
    }

    pub fn with_balance(self, asset: &str, free: &str) -> Self {
        self.balances
            .lock()
            .unwrap()
            .insert(asset.to_string(), dec(free));
        self
    }

    pub fn with_closes(self, symbol: &str, closes: &[Decimal]) -> Self {
        self.set_closes(symbol, closes);
        self
    }

    pub fn set_closes(&self, symbol: &str, closes: &[Decimal]) {
        self.candles
            .lock()
            .unwrap()
            .insert(symbol.to_string(), candles_from_closes(closes));
    }

    pub fn with_failing_candles(self, symbol: &str) -> Self {
        self.failing_candles
            .lock()
            .unwrap()
            .insert(symbol.to_string());
        self
    }

    /// Candle requests for `symbol` panic, killing the task that made them
    pub fn with_crashing_candles(self, symbol: &str) -> Self {
        self.crashing_candles
            .lock()
            .unwrap()
            .insert(symbol.to_string());
        self
    }

    pub fn candle_requests_for(&self, symbol: &str) -> usize {
        self.candle_requests_by_symbol
            .lock()
            .unwrap()
            .get(symbol)
            .copied()
            .unwrap_or_default()
    }

    pub fn balance_requests(&self) -> Vec<String> {
        self.balance_requests.lock().unwrap().clone()
    }

    pub fn with_order_rejection(self, side: Side, code: i64, message: &str) -> Self {
        *self.order_rejection.lock().unwrap() = Some((
            side,
            ExchangeError::Exchange {
                code,
                message: message.to_string(),
            },
        ));
        self
    }

    /// Bought quantity never shows up in the base balance
    pub fn without_fill_credit(self) -> Self {
        *self.credit_fills.lock().unwrap() = false;
        self
    }

    pub fn with_rules_unavailable(self) -> Self {
        *self.rules_unavailable.lock().unwrap() = true;
        self
    }

    pub fn orders(&self) -> Vec<SubmittedOrder> {
        self.orders.lock().unwrap().clone()
    }

    pub fn balance(&self, asset: &str) -> Decimal {
        self.balances
            .lock()
            .unwrap()
            .get(asset)
            .copied()
            .unwrap_or_default()
    }

    fn fill(
        &self,
        symbol: &str,
        side: Side,
        quantity: Decimal,
        limit_price: Option<Decimal>,
    ) -> Result<OrderResult, ExchangeError> {
        if let Some((rejected_side, err)) = self.order_rejection.lock().unwrap().as_ref() {
            if *rejected_side == side {
                return Err(err.clone());
            }
        }

        let mut orders = self.orders.lock().unwrap();
        orders.push(SubmittedOrder {
            symbol: symbol.to_string(),
            side,
            quantity,
            limit_price,
        });

        if side == Side::Buy && *self.credit_fills.lock().unwrap() {
            let base = symbol.trim_end_matches("USDT").to_string();
            *self.balances.lock().unwrap().entry(base).or_default() += quantity;
        }

        let id = orders.len();
        Ok(OrderResult::accepted(
            quantity,
            id.to_string(),
            format!("scripted-{}", id),
        ))
    }
}

#[async_trait]
impl ExchangeTransport for ScriptedExchange {
    async fn get_candles(
        &self,
        symbol: &str,
        _interval: &str,
        limit: u32,
    ) -> Result<Vec<Candle>, ExchangeError> {
        self.candle_requests.fetch_add(1, Ordering::SeqCst);
        *self
            .candle_requests_by_symbol
            .lock()
            .unwrap()
            .entry(symbol.to_string())
            .or_default() += 1;
        let crash = self.crashing_candles.lock().unwrap().contains(symbol);
        if crash {
            panic!("scripted crash fetching candles for {}", symbol);
        }
        if self.failing_candles.lock().unwrap().contains(symbol) {
            return Err(ExchangeError::Network("connection reset".to_string()));
        }

        let candles = self
            .candles
            .lock()
            .unwrap()
            .get(symbol)
            .cloned()
            .unwrap_or_default();
        let skip = candles.len().saturating_sub(limit as usize);
        Ok(candles.into_iter().skip(skip).collect())
    }

    async fn get_symbol_rules(&self, symbol: &str) -> Result<Option<SymbolRules>, ExchangeError> {
        self.rules_lookups.fetch_add(1, Ordering::SeqCst);
        if *self.rules_unavailable.lock().unwrap() {
            return Err(ExchangeError::Network("exchangeInfo timed out".to_string()));
        }
        Ok(self.rules.lock().unwrap().get(symbol).cloned())
    }

    async fn get_balance(&self, asset: &str) -> Result<Decimal, ExchangeError> {
        self.balance_requests
            .lock()
            .unwrap()
            .push(asset.to_string());
        Ok(self.balance(asset))
    }

    async fn submit_market_order(
        &self,
        symbol: &str,
        side: Side,
        quantity: Decimal,
    ) -> Result<OrderResult, ExchangeError> {
        self.fill(symbol, side, quantity, None)
    }

    async fn submit_limit_order(
        &self,
        symbol: &str,
        side: Side,
        quantity: Decimal,
        price: Decimal,
    ) -> Result<OrderResult, ExchangeError> {
        self.fill(symbol, side, quantity, Some(price))
    }
}

/// Audit logger that keeps every event for assertions
#[derive(Default)]
pub struct RecordingAudit {
    pub actions: Mutex<Vec<(String, String)>>,
    pub trades: Mutex<Vec<(String, Decimal, Decimal, Vec<Balance>)>>,
    pub errors: Mutex<Vec<(String, Option<i64>)>>,
}

impl RecordingAudit {
    pub fn action_names(&self) -> Vec<String> {
        self.actions
            .lock()
            .unwrap()
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }
}

impl AuditLogger for RecordingAudit {
    fn action(&self, name: &str, details: &str) {
        self.actions
            .lock()
            .unwrap()
            .push((name.to_string(), details.to_string()));
    }

    fn trade(&self, action: &str, quantity: Decimal, price: Decimal, balances: &[Balance]) {
        self.trades
            .lock()
            .unwrap()
            .push((action.to_string(), quantity, price, balances.to_vec()));
    }

    fn error(&self, message: &str, code: Option<i64>) {
        self.errors
            .lock()
            .unwrap()
            .push((message.to_string(), code));
    }
}

pub fn candles_from_closes(closes: &[Decimal]) -> Vec<Candle> {
    let start = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, close)| {
            let open_time = start + Duration::minutes(i as i64);
            Candle {
                open_time,
                open: *close,
                high: *close,
                low: *close,
                close: *close,
                volume: Decimal::from(1000),
                close_time: open_time + Duration::seconds(59),
            }
        })
        .collect()
}

/// Flat, then a steady climb, then one sharp drop: oversold while the
/// short average is still above the long one
pub fn oversold_dip_closes() -> Vec<Decimal> {
    let mut closes = vec![Decimal::from(100); 30];
    closes.extend((101..=130).map(Decimal::from));
    closes.push(Decimal::from(100));
    closes
}

pub fn flat_closes(count: usize) -> Vec<Decimal> {
    vec![Decimal::from(100); count]
}

pub fn pair(symbol: &str, base_asset: &str, entry_size: &str) -> PairConfig {
    PairConfig {
        symbol: symbol.to_string(),
        base_asset: base_asset.to_string(),
        interval: "1m".to_string(),
        entry_size: dec(entry_size),
    }
}

/// Settings with every runner delay set to zero
pub fn test_settings(pairs: Vec<PairConfig>) -> Settings {
    let mut settings = Settings::default();
    settings.runner.cycle_sleep_secs = 0;
    settings.runner.error_cooldown_secs = 0;
    settings.runner.restart_delay_secs = 0;
    settings.pairs = pairs;
    settings
}
