use super::market::MarketDataFeed;
use super::normalizer::Normalizer;
use super::sizing::{needs_balance, resolve_quantity};
use crate::api::ExchangeTransport;
use crate::audit::AuditLogger;
use crate::config::{PairConfig, StrategySettings, TakeProfitOrder};
use crate::error::TradeError;
use crate::models::{
    Balance, CycleState, IndicatorSnapshot, OrderResult, TradeIntent, UnresolvedPosition,
};
use rust_decimal::Decimal;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencerState {
    Idle,
    SignalCheck,
    Buying,
    TakeProfitPending,
    Done,
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EntryDecision {
    pub enter: bool,
    pub reason: String,
}

/// Entry rule: oversold oscillator, short average above long, and enough
/// quote balance to fund the entry
pub fn evaluate_entry(
    strategy: &StrategySettings,
    snapshot: &IndicatorSnapshot,
    quote_balance: Decimal,
    entry_size: Decimal,
) -> EntryDecision {
    if snapshot.oscillator >= strategy.oversold_threshold {
        return EntryDecision {
            enter: false,
            reason: format!(
                "Oscillator {:.2} not below {:.2}",
                snapshot.oscillator, strategy.oversold_threshold
            ),
        };
    }

    if snapshot.short_average <= snapshot.long_average {
        return EntryDecision {
            enter: false,
            reason: format!(
                "Short average {:.8} not above long average {:.8}",
                snapshot.short_average, snapshot.long_average
            ),
        };
    }

    if quote_balance < entry_size {
        return EntryDecision {
            enter: false,
            reason: format!(
                "Quote balance {} below entry size {}",
                quote_balance, entry_size
            ),
        };
    }

    EntryDecision {
        enter: true,
        reason: format!(
            "Oscillator {:.2} oversold with short {:.8} > long {:.8}",
            snapshot.oscillator, snapshot.short_average, snapshot.long_average
        ),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    NoSignal {
        reason: String,
    },
    Completed {
        buy: OrderResult,
        take_profit: OrderResult,
        entry_price: Decimal,
        take_profit_price: Decimal,
    },
    /// The buy filled but the take-profit leg did not go through
    UnresolvedPosition {
        buy: OrderResult,
        entry_price: Decimal,
        reason: TradeError,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SequenceReport {
    pub outcome: CycleOutcome,
    pub states: Vec<SequencerState>,
}

#[derive(Debug, Clone, Copy)]
enum OrderKind {
    Market,
    Limit(Decimal),
}

/// Runs the buy-then-take-profit sequence for one pair
pub struct OrderSequencer {
    transport: Arc<dyn ExchangeTransport>,
    feed: MarketDataFeed,
    normalizer: Normalizer,
    audit: Arc<dyn AuditLogger>,
    strategy: StrategySettings,
}

impl OrderSequencer {
    pub fn new(
        transport: Arc<dyn ExchangeTransport>,
        normalizer: Normalizer,
        audit: Arc<dyn AuditLogger>,
        strategy: StrategySettings,
    ) -> Self {
        Self {
            feed: MarketDataFeed::new(transport.clone()),
            transport,
            normalizer,
            audit,
            strategy,
        }
    }

    /// Evaluate the entry signal and, when it fires, buy and place the
    /// take-profit sell.
    ///
    /// Errors before the buy is confirmed are returned as `Err`. Anything that
    /// goes wrong afterwards is reported as `CycleOutcome::UnresolvedPosition`
    /// and recorded in `state`, since the bought position is real.
    pub async fn run(
        &self,
        pair: &PairConfig,
        snapshot: &IndicatorSnapshot,
        price: Decimal,
        state: &mut CycleState,
    ) -> Result<SequenceReport, TradeError> {
        let mut states = vec![SequencerState::Idle, SequencerState::SignalCheck];

        let quote_balance = self
            .feed
            .available_balance(&self.strategy.quote_asset)
            .await?;
        let base_balance = self.feed.available_balance(&pair.base_asset).await?;
        tracing::info!(
            symbol = %pair.symbol,
            "💰 Balance: {} {} | {} {}",
            self.strategy.quote_asset,
            quote_balance,
            pair.base_asset,
            base_balance
        );

        let decision = evaluate_entry(&self.strategy, snapshot, quote_balance, pair.entry_size);

        tracing::debug!(
            symbol = %pair.symbol,
            oscillator = snapshot.oscillator,
            short = snapshot.short_average,
            long = snapshot.long_average,
            quote_balance = %quote_balance,
            "{}",
            decision.reason
        );

        if !decision.enter {
            states.push(SequencerState::Done);
            return Ok(SequenceReport {
                outcome: CycleOutcome::NoSignal {
                    reason: decision.reason,
                },
                states,
            });
        }

        tracing::info!(symbol = %pair.symbol, price = %price, "📈 Buy signal: {}", decision.reason);
        self.audit.action(
            "SIGNAL DETECTED",
            &format!("{} buy signal at {}: {}", pair.symbol, price, decision.reason),
        );

        states.push(SequencerState::Buying);
        let raw_quantity = pair.entry_size.checked_div(price).filter(|_| price > Decimal::ZERO);
        let Some(raw_quantity) = raw_quantity else {
            return Err(TradeError::InvalidResponse(format!(
                "cannot size a buy of {} at price {}",
                pair.symbol, price
            )));
        };
        let buy_intent = TradeIntent::buy(&pair.symbol, raw_quantity, price);
        let buy = match self
            .submit(pair, &buy_intent, Decimal::ZERO, OrderKind::Market)
            .await
        {
            Ok(buy) => buy,
            Err(e) => {
                self.audit
                    .error(&format!("{} buy failed: {}", pair.symbol, e), e.code());
                return Err(e);
            }
        };

        state.entry_price = Some(price);
        states.push(SequencerState::TakeProfitPending);

        match self.place_take_profit(pair, &buy, price).await {
            Ok((take_profit, take_profit_price)) => {
                state.unresolved_position = None;
                states.push(SequencerState::Done);
                Ok(SequenceReport {
                    outcome: CycleOutcome::Completed {
                        buy,
                        take_profit,
                        entry_price: price,
                        take_profit_price,
                    },
                    states,
                })
            }
            Err(reason) => {
                tracing::error!(
                    symbol = %pair.symbol,
                    quantity = %buy.quantity,
                    entry_price = %price,
                    "⚠️ Bought without take-profit: {}",
                    reason
                );
                self.audit.error(
                    &format!(
                        "{} take-profit failed after buy of {}: {}",
                        pair.symbol, buy.quantity, reason
                    ),
                    reason.code(),
                );

                state.unresolved_position = Some(UnresolvedPosition {
                    symbol: pair.symbol.clone(),
                    entry_price: price,
                    quantity: buy.quantity,
                    reason: reason.to_string(),
                });
                states.push(SequencerState::Failed);
                Ok(SequenceReport {
                    outcome: CycleOutcome::UnresolvedPosition {
                        buy,
                        entry_price: price,
                        reason,
                    },
                    states,
                })
            }
        }
    }

    async fn place_take_profit(
        &self,
        pair: &PairConfig,
        buy: &OrderResult,
        entry_price: Decimal,
    ) -> Result<(OrderResult, Decimal), TradeError> {
        let base_balance = self.feed.available_balance(&pair.base_asset).await?;

        let mut balances = Vec::with_capacity(2);
        match self.feed.available_balance(&self.strategy.quote_asset).await {
            Ok(free) => balances.push(Balance {
                asset: self.strategy.quote_asset.clone(),
                free,
            }),
            // Audit detail only; the take-profit does not depend on it
            Err(e) => tracing::warn!(symbol = %pair.symbol, "Quote balance unavailable after buy: {}", e),
        }
        balances.push(Balance {
            asset: pair.base_asset.clone(),
            free: base_balance,
        });
        self.audit.trade("BUY", buy.quantity, entry_price, &balances);

        let markup = Decimal::ONE + self.strategy.min_profit_margin + self.strategy.fee_rate;
        let take_profit_price = self
            .normalizer
            .price(entry_price * markup, &pair.symbol)
            .await;

        let kind = match self.strategy.take_profit_order {
            TakeProfitOrder::Market => OrderKind::Market,
            TakeProfitOrder::Limit => OrderKind::Limit(take_profit_price),
        };

        let intent = TradeIntent::sell_all(&pair.symbol, take_profit_price);
        let take_profit = self.submit(pair, &intent, base_balance, kind).await?;

        tracing::info!(
            symbol = %pair.symbol,
            quantity = %take_profit.quantity,
            price = %take_profit_price,
            "🎯 Take-profit placed"
        );
        self.audit.action(
            "TAKE PROFIT PLACED",
            &format!(
                "{} sell {} at {}",
                pair.symbol, take_profit.quantity, take_profit_price
            ),
        );

        Ok((take_profit, take_profit_price))
    }

    /// Single submission path: sizing, normalization, notional guard, send
    async fn submit(
        &self,
        pair: &PairConfig,
        intent: &TradeIntent,
        available_base: Decimal,
        kind: OrderKind,
    ) -> Result<OrderResult, TradeError> {
        if needs_balance(intent) {
            tracing::debug!(symbol = %intent.symbol, balance = %available_base, "Selling entire balance");
        }
        let raw = resolve_quantity(intent, available_base, &pair.base_asset)?;
        let quantity = self.normalizer.quantity(raw, &intent.symbol).await;

        let notional = quantity * intent.reference_price;
        if notional < self.strategy.min_notional {
            tracing::warn!(
                symbol = %intent.symbol,
                quantity = %quantity,
                notional = %notional,
                "Order below minimum notional, not sent"
            );
            return Err(TradeError::OrderTooSmall {
                notional,
                minimum: self.strategy.min_notional,
            });
        }

        self.audit.action(
            "EXECUTING ORDER",
            &format!(
                "{} {} {} at ~{}",
                intent.side, quantity, intent.symbol, intent.reference_price
            ),
        );

        let result = match kind {
            OrderKind::Market => {
                self.transport
                    .submit_market_order(&intent.symbol, intent.side, quantity)
                    .await
            }
            OrderKind::Limit(price) => {
                self.transport
                    .submit_limit_order(&intent.symbol, intent.side, quantity, price)
                    .await
            }
        }
        .map_err(TradeError::from_order_submission)?;

        if !result.success {
            // Transport accepted the request but reported no order
            return Err(TradeError::OrderRejected {
                code: 0,
                message: result
                    .failure_reason
                    .unwrap_or_else(|| "order not accepted".to_string()),
            });
        }

        tracing::info!(
            symbol = %intent.symbol,
            side = %intent.side,
            quantity = %result.quantity,
            order_id = ?result.order_id,
            "✅ Order executed"
        );
        self.audit.action(
            "ORDER EXECUTED",
            &format!(
                "{} {} {} (order {})",
                intent.side,
                result.quantity,
                intent.symbol,
                result.order_id.as_deref().unwrap_or("-")
            ),
        );

        Ok(result)
    }
}
