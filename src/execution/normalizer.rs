use super::rules::RulesCache;
use crate::audit::AuditLogger;
use crate::error::TradeError;
use crate::models::SymbolRules;
use rust_decimal::{Decimal, RoundingStrategy};
use std::sync::Arc;

/// Clamp up to `min_qty`, then truncate to a multiple of `step_size`
pub fn normalize_quantity(raw: Decimal, rules: &SymbolRules) -> Decimal {
    let quantity = raw.max(rules.min_qty);
    if rules.step_size <= Decimal::ZERO {
        return quantity;
    }

    ((quantity / rules.step_size).trunc() * rules.step_size).normalize()
}

/// Round to the nearest multiple of `tick_size`, at the tick's precision
pub fn normalize_price(raw: Decimal, rules: &SymbolRules) -> Decimal {
    let tick = rules.tick_size;
    if tick <= Decimal::ZERO {
        return raw;
    }

    let ticks = (raw / tick).round_dp_with_strategy(0, RoundingStrategy::MidpointNearestEven);
    (ticks * tick).round_dp(tick.normalize().scale())
}

/// Rounds order values to exchange rules, degrading when rules are unavailable
#[derive(Clone)]
pub struct Normalizer {
    rules: RulesCache,
    audit: Arc<dyn AuditLogger>,
}

impl Normalizer {
    pub fn new(rules: RulesCache, audit: Arc<dyn AuditLogger>) -> Self {
        Self { rules, audit }
    }

    /// Quantity rounded to the symbol's lot size.
    ///
    /// Without rules the quantity is truncated to a whole number, which can
    /// violate the real step size.
    pub async fn quantity(&self, raw: Decimal, symbol: &str) -> Decimal {
        match self.rules.rules(symbol).await {
            Ok(rules) => normalize_quantity(raw, &rules),
            Err(e) => {
                self.report_degraded(symbol, e);
                raw.floor()
            }
        }
    }

    /// Price rounded to the symbol's tick size, unchanged without rules
    pub async fn price(&self, raw: Decimal, symbol: &str) -> Decimal {
        match self.rules.rules(symbol).await {
            Ok(rules) => normalize_price(raw, &rules),
            Err(e) => {
                self.report_degraded(symbol, e);
                raw
            }
        }
    }

    fn report_degraded(&self, symbol: &str, cause: TradeError) {
        let warning = TradeError::RulesUnavailable {
            symbol: symbol.to_string(),
            reason: cause.to_string(),
        };
        tracing::warn!(symbol, "{}; using fallback rounding", warning);
        self.audit.action("RULES UNAVAILABLE", &warning.to_string());
    }
}
