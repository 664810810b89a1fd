use crate::error::TradeError;
use crate::models::TradeIntent;
use rust_decimal::Decimal;

/// Whether submitting this intent requires a fresh base-asset balance
pub fn needs_balance(intent: &TradeIntent) -> bool {
    intent.use_entire_balance
}

/// Raw (pre-normalization) quantity to submit for an intent.
///
/// Sell-all intents take the whole available base balance; every other
/// intent keeps its requested quantity.
pub fn resolve_quantity(
    intent: &TradeIntent,
    available_base: Decimal,
    base_asset: &str,
) -> Result<Decimal, TradeError> {
    if !intent.use_entire_balance {
        return Ok(intent.quantity);
    }

    if available_base <= Decimal::ZERO {
        return Err(TradeError::NoBalanceToSell {
            asset: base_asset.to_string(),
        });
    }

    Ok(available_base)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buy_keeps_requested_quantity() {
        let intent = TradeIntent::buy("PEPEUSDT", Decimal::from(5000), Decimal::new(1, 5));

        assert!(!needs_balance(&intent));
        assert_eq!(
            resolve_quantity(&intent, Decimal::ZERO, "PEPE"),
            Ok(Decimal::from(5000))
        );
    }

    #[test]
    fn test_sell_all_uses_balance() {
        let intent = TradeIntent::sell_all("PEPEUSDT", Decimal::new(1, 5));
        let balance = Decimal::new(1234567, 2);

        assert!(needs_balance(&intent));
        assert_eq!(resolve_quantity(&intent, balance, "PEPE"), Ok(balance));
    }

    #[test]
    fn test_sell_all_without_balance() {
        let intent = TradeIntent::sell_all("PEPEUSDT", Decimal::new(1, 5));

        assert_eq!(
            resolve_quantity(&intent, Decimal::ZERO, "PEPE"),
            Err(TradeError::NoBalanceToSell {
                asset: "PEPE".to_string()
            })
        );
    }
}
