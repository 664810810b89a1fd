use super::market::MarketDataFeed;
use super::normalizer::Normalizer;
use super::rules::RulesCache;
use super::sequencer::{CycleOutcome, OrderSequencer, SequenceReport};
use crate::api::ExchangeTransport;
use crate::audit::AuditLogger;
use crate::config::{PairConfig, Settings};
use crate::error::TradeError;
use crate::indicators;
use crate::models::{CycleState, IndicatorSnapshot};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinSet;

/// Drives one evaluation cycle per configured pair, containing every failure
/// to the pair and cycle it happened in
pub struct PairCycleRunner {
    settings: Settings,
    feed: MarketDataFeed,
    rules: RulesCache,
    sequencer: OrderSequencer,
    audit: Arc<dyn AuditLogger>,
}

impl PairCycleRunner {
    pub fn new(
        settings: Settings,
        transport: Arc<dyn ExchangeTransport>,
        audit: Arc<dyn AuditLogger>,
    ) -> Self {
        let rules = RulesCache::new(transport.clone()).with_ttl(settings.runner.rules_ttl());
        let normalizer = Normalizer::new(rules.clone(), audit.clone());
        let sequencer = OrderSequencer::new(
            transport.clone(),
            normalizer,
            audit.clone(),
            settings.strategy.clone(),
        );

        Self {
            feed: MarketDataFeed::new(transport),
            rules,
            sequencer,
            audit,
            settings,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn rules_cache(&self) -> &RulesCache {
        &self.rules
    }

    /// Log each pair's configuration and resolved precision. Failures here
    /// only produce warnings.
    pub async fn log_startup(&self) {
        let strategy = &self.settings.strategy;
        tracing::info!("📊 Configuration:");
        tracing::info!(
            "  Averages: short {} / long {}, oscillator {} (oversold < {})",
            strategy.short_period,
            strategy.long_period,
            strategy.oscillator_period,
            strategy.oversold_threshold
        );
        tracing::info!(
            "  Take-profit: margin {} + fee {} ({:?})",
            strategy.min_profit_margin,
            strategy.fee_rate,
            strategy.take_profit_order
        );

        for pair in &self.settings.pairs {
            match self.rules.rules(&pair.symbol).await {
                Ok(rules) => tracing::info!(
                    "  {} [{}] entry {} {} | tick {} | step {} | min qty {}",
                    pair.symbol,
                    pair.interval,
                    pair.entry_size,
                    strategy.quote_asset,
                    rules.tick_size,
                    rules.step_size,
                    rules.min_qty
                ),
                Err(e) => tracing::warn!(
                    "  {} [{}] entry {} {} | rules unavailable: {}",
                    pair.symbol,
                    pair.interval,
                    pair.entry_size,
                    strategy.quote_asset,
                    e
                ),
            }
        }
    }

    /// Fetch candles, compute indicators and run the order sequence
    pub async fn run_cycle(
        &self,
        pair: &PairConfig,
        state: &mut CycleState,
    ) -> Result<SequenceReport, TradeError> {
        let strategy = &self.settings.strategy;
        let candles = self
            .feed
            .snapshot(
                &pair.symbol,
                &pair.interval,
                self.settings.runner.candle_limit,
                strategy.min_candles(),
            )
            .await?;

        let price = MarketDataFeed::latest_price(&candles).ok_or(TradeError::InsufficientData {
            needed: 1,
            available: 0,
        })?;
        if price <= Decimal::ZERO {
            return Err(TradeError::InvalidResponse(format!(
                "latest close for {} is {}, expected a positive price",
                pair.symbol, price
            )));
        }

        let closes = indicators::closes(&candles);
        let snapshot = IndicatorSnapshot::compute(
            &closes,
            strategy.short_period,
            strategy.long_period,
            strategy.oscillator_period,
        )?;

        self.sequencer.run(pair, &snapshot, price, state).await
    }

    /// One cycle plus its trailing sleep: `cycle_sleep` after a clean
    /// cycle, `error_cooldown` after a failure or an unresolved position
    pub async fn run_pair_once(
        &self,
        pair: &PairConfig,
        state: &mut CycleState,
    ) -> Result<SequenceReport, TradeError> {
        let result = self.run_cycle(pair, state).await;

        let clean = match &result {
            Ok(report) => match &report.outcome {
                CycleOutcome::NoSignal { reason } => {
                    tracing::debug!(symbol = %pair.symbol, "No entry: {}", reason);
                    true
                }
                CycleOutcome::Completed {
                    entry_price,
                    take_profit_price,
                    ..
                } => {
                    tracing::info!(
                        symbol = %pair.symbol,
                        entry = %entry_price,
                        target = %take_profit_price,
                        "Cycle completed"
                    );
                    true
                }
                CycleOutcome::UnresolvedPosition { reason, .. } => {
                    tracing::warn!(symbol = %pair.symbol, "Unresolved position: {}", reason);
                    false
                }
            },
            Err(e) => {
                tracing::error!(
                    symbol = %pair.symbol,
                    consecutive_errors = state.consecutive_errors + 1,
                    "❌ Cycle failed: {}",
                    e
                );
                self.audit
                    .error(&format!("{} cycle failed: {}", pair.symbol, e), e.code());
                false
            }
        };

        if clean {
            state.record_success();
            tokio::time::sleep(self.settings.runner.cycle_sleep()).await;
        } else {
            let errors = state.record_failure();
            tracing::warn!(
                symbol = %pair.symbol,
                consecutive_errors = errors,
                "Cooling down for {:?}",
                self.settings.runner.error_cooldown()
            );
            tokio::time::sleep(self.settings.runner.error_cooldown()).await;
        }

        result
    }

    /// One sequential pass over every pair, in configuration order
    pub async fn run_pass(
        &self,
        states: &mut HashMap<String, CycleState>,
    ) -> Vec<Result<SequenceReport, TradeError>> {
        let mut results = Vec::with_capacity(self.settings.pairs.len());

        for pair in &self.settings.pairs {
            let state = states.entry(pair.symbol.clone()).or_default();
            results.push(self.run_pair_once(pair, state).await);
        }

        results
    }

    /// Sequential passes forever, `restart_delay` apart
    pub async fn run_forever(&self) {
        let mut states = HashMap::new();

        loop {
            let results = self.run_pass(&mut states).await;
            let failed = results.iter().filter(|r| r.is_err()).count();
            tracing::info!(
                pairs = results.len(),
                failed,
                "Pass complete, restarting in {:?}",
                self.settings.runner.restart_delay()
            );

            tokio::time::sleep(self.settings.runner.restart_delay()).await;
        }
    }

    /// One task per pair, sharing only the rules cache. A pair task that
    /// dies is restarted with fresh state after `restart_delay`; the other
    /// pairs keep running. Never returns on its own.
    pub async fn run_concurrent(self: Arc<Self>) {
        let mut supervisors = JoinSet::new();

        for pair in self.settings.pairs.clone() {
            let runner = Arc::clone(&self);
            supervisors.spawn(async move { runner.supervise_pair(pair).await });
        }

        while let Some(result) = supervisors.join_next().await {
            if let Err(e) = result {
                tracing::error!("Pair supervisor stopped: {}", e);
            }
        }
    }

    async fn supervise_pair(self: Arc<Self>, pair: PairConfig) {
        loop {
            // Dropping the set aborts the worker if this supervisor is cancelled
            let mut worker: JoinSet<()> = JoinSet::new();
            let runner = Arc::clone(&self);
            let task_pair = pair.clone();
            worker.spawn(async move {
                let mut state = CycleState::default();
                loop {
                    let _ = runner.run_pair_once(&task_pair, &mut state).await;
                }
            });

            if let Some(Err(e)) = worker.join_next().await {
                tracing::error!(symbol = %pair.symbol, "❌ Pair task died: {}", e);
                self.audit
                    .error(&format!("{} pair task died: {}", pair.symbol, e), None);
            }

            tracing::warn!(
                symbol = %pair.symbol,
                "Restarting pair task in {:?}",
                self.settings.runner.restart_delay()
            );
            tokio::time::sleep(self.settings.runner.restart_delay()).await;
        }
    }
}
