use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use std::time::Duration;

const ENV_PREFIX: &str = "SPOTBOT";

/// Root configuration, immutable once loaded
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub exchange: ExchangeSettings,
    #[serde(default)]
    pub strategy: StrategySettings,
    #[serde(default)]
    pub runner: RunnerSettings,
    #[serde(default)]
    pub pairs: Vec<PairConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExchangeSettings {
    pub base_url: String,
    pub request_timeout_secs: u64,
    pub requests_per_minute: u32,
    #[serde(skip)]
    pub credentials: Credentials,
}

impl Default for ExchangeSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.binance.com".to_string(),
            request_timeout_secs: 10,
            requests_per_minute: 1200,
            credentials: Credentials::default(),
        }
    }
}

/// API key pair. Never read from the config file, only from the environment.
#[derive(Clone, Default)]
pub struct Credentials {
    pub api_key: String,
    pub api_secret: String,
}

impl Credentials {
    /// `BINANCE_API_KEY`/`BINANCE_API_SECRET`, falling back to `API_KEY`/`API_SECRET`
    pub fn from_env() -> Option<Self> {
        let read = |primary: &str, fallback: &str| {
            std::env::var(primary)
                .or_else(|_| std::env::var(fallback))
                .ok()
                .filter(|v| !v.is_empty())
        };

        Some(Self {
            api_key: read("BINANCE_API_KEY", "API_KEY")?,
            api_secret: read("BINANCE_API_SECRET", "API_SECRET")?,
        })
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"<redacted>")
            .field("api_secret", &"<redacted>")
            .finish()
    }
}

/// How the take-profit leg is sent to the exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TakeProfitOrder {
    #[default]
    Market,
    Limit,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StrategySettings {
    pub short_period: usize,
    pub long_period: usize,
    pub oscillator_period: usize,
    pub oversold_threshold: f64,
    pub min_profit_margin: Decimal,
    pub fee_rate: Decimal,
    pub min_notional: Decimal,
    pub quote_asset: String,
    pub take_profit_order: TakeProfitOrder,
}

impl Default for StrategySettings {
    fn default() -> Self {
        Self {
            short_period: 9,
            long_period: 21,
            oscillator_period: 14,
            oversold_threshold: 30.0,
            min_profit_margin: Decimal::new(1, 2), // 1%
            fee_rate: Decimal::new(1, 3),          // 0.1% per trade
            min_notional: Decimal::ONE,
            quote_asset: "USDT".to_string(),
            take_profit_order: TakeProfitOrder::Market,
        }
    }
}

impl StrategySettings {
    /// Candles needed before a cycle can evaluate the signal
    pub fn min_candles(&self) -> usize {
        self.short_period
            .max(self.long_period)
            .max(self.oscillator_period)
            + 1
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RunnerSettings {
    pub candle_limit: u32,
    pub cycle_sleep_secs: u64,
    pub error_cooldown_secs: u64,
    pub restart_delay_secs: u64,
    pub concurrent: bool,
    pub rules_ttl_secs: Option<u64>,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            candle_limit: 500,
            cycle_sleep_secs: 1,
            error_cooldown_secs: 30,
            restart_delay_secs: 10,
            concurrent: false,
            rules_ttl_secs: None,
        }
    }
}

impl RunnerSettings {
    pub fn cycle_sleep(&self) -> Duration {
        Duration::from_secs(self.cycle_sleep_secs)
    }

    pub fn error_cooldown(&self) -> Duration {
        Duration::from_secs(self.error_cooldown_secs)
    }

    pub fn restart_delay(&self) -> Duration {
        Duration::from_secs(self.restart_delay_secs)
    }

    pub fn rules_ttl(&self) -> Option<Duration> {
        self.rules_ttl_secs.map(Duration::from_secs)
    }
}

/// One traded pair
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct PairConfig {
    pub symbol: String,     // e.g. "PEPEUSDT"
    pub base_asset: String, // e.g. "PEPE"
    #[serde(default = "default_interval")]
    pub interval: String,
    /// Quote-asset amount spent per entry
    pub entry_size: Decimal,
}

fn default_interval() -> String {
    "1m".to_string()
}

impl Settings {
    /// Load settings from an optional TOML file overlaid with `SPOTBOT__*`
    /// environment variables, then attach credentials from the environment.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let builder = ::config::Config::builder()
            .add_source(::config::File::from(path).required(false))
            .add_source(::config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()
            .with_context(|| format!("Failed to read configuration from {}", path.display()))?;

        let mut settings: Settings = builder
            .try_deserialize()
            .context("Failed to parse configuration")?;

        if let Some(credentials) = Credentials::from_env() {
            settings.exchange.credentials = credentials;
        }

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        let strategy = &self.strategy;
        if strategy.short_period == 0 || strategy.long_period == 0 {
            anyhow::bail!("Moving average periods must be greater than zero");
        }
        if strategy.oscillator_period == 0 {
            anyhow::bail!("Oscillator period must be greater than zero");
        }
        if !(0.0..=100.0).contains(&strategy.oversold_threshold) {
            anyhow::bail!(
                "Oversold threshold must be within 0-100, got {}",
                strategy.oversold_threshold
            );
        }
        if strategy.min_profit_margin < Decimal::ZERO || strategy.fee_rate < Decimal::ZERO {
            anyhow::bail!("Profit margin and fee rate cannot be negative");
        }
        if self.runner.candle_limit < strategy.min_candles() as u32 {
            anyhow::bail!(
                "candle_limit {} is below the {} candles the indicators need",
                self.runner.candle_limit,
                strategy.min_candles()
            );
        }
        if self.pairs.is_empty() {
            anyhow::bail!("No trading pairs configured");
        }
        for pair in &self.pairs {
            if pair.entry_size <= Decimal::ZERO {
                anyhow::bail!("Entry size for {} must be positive", pair.symbol);
            }
            if !pair.symbol.starts_with(&pair.base_asset) {
                tracing::warn!(
                    "Pair {} does not start with base asset {}",
                    pair.symbol,
                    pair.base_asset
                );
            }
        }
        Ok(())
    }
}
