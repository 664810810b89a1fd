use crate::models::Balance;
use rust_decimal::Decimal;

/// Structured audit trail of trading decisions.
///
/// Implementations must never fail or block the trading path.
pub trait AuditLogger: Send + Sync {
    fn action(&self, name: &str, details: &str);

    fn trade(&self, action: &str, quantity: Decimal, price: Decimal, balances: &[Balance]);

    fn error(&self, message: &str, code: Option<i64>);
}

/// Audit logger that emits `tracing` events on the `audit` target
#[derive(Debug, Clone, Default)]
pub struct TracingAuditLogger;

impl AuditLogger for TracingAuditLogger {
    fn action(&self, name: &str, details: &str) {
        tracing::info!(target: "audit", action = name, "{}", details);
    }

    fn trade(&self, action: &str, quantity: Decimal, price: Decimal, balances: &[Balance]) {
        let balances = balances
            .iter()
            .map(|b| format!("{}: {}", b.asset, b.free))
            .collect::<Vec<_>>()
            .join(" | ");

        tracing::info!(
            target: "audit",
            action,
            quantity = %quantity,
            price = %price,
            "{} {} @ {} | {}",
            action,
            quantity,
            price,
            balances
        );
    }

    fn error(&self, message: &str, code: Option<i64>) {
        match code {
            Some(code) => tracing::error!(target: "audit", code, "{}", message),
            None => tracing::error!(target: "audit", "{}", message),
        }
    }
}
