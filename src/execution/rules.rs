use crate::api::ExchangeTransport;
use crate::error::TradeError;
use crate::models::SymbolRules;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};

#[derive(Debug, Clone)]
struct CachedRules {
    rules: SymbolRules,
    fetched_at: Instant,
}

/// Per-symbol exchange rules, fetched once and kept in memory
///
/// Hits only take a read lock. Misses are single-flighted through
/// `fetch_guard` so concurrent pair tasks never fetch the same symbol twice.
/// Without a TTL, entries live for the whole process.
#[derive(Clone)]
pub struct RulesCache {
    transport: Arc<dyn ExchangeTransport>,
    entries: Arc<RwLock<HashMap<String, CachedRules>>>,
    fetch_guard: Arc<Mutex<()>>,
    ttl: Option<Duration>,
}

impl RulesCache {
    pub fn new(transport: Arc<dyn ExchangeTransport>) -> Self {
        Self {
            transport,
            entries: Arc::new(RwLock::new(HashMap::new())),
            fetch_guard: Arc::new(Mutex::new(())),
            ttl: None,
        }
    }

    /// Expire cached rules after `ttl`
    pub fn with_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.ttl = ttl;
        self
    }

    /// Rules for a symbol, from cache when possible
    pub async fn rules(&self, symbol: &str) -> Result<SymbolRules, TradeError> {
        if let Some(rules) = self.cached(symbol).await {
            return Ok(rules);
        }

        let _guard = self.fetch_guard.lock().await;

        // Another task may have filled the entry while we waited
        if let Some(rules) = self.cached(symbol).await {
            return Ok(rules);
        }

        let rules = self
            .transport
            .get_symbol_rules(symbol)
            .await?
            .ok_or_else(|| TradeError::SymbolNotFound(symbol.to_string()))?;

        tracing::info!(
            symbol,
            tick_size = %rules.tick_size,
            step_size = %rules.step_size,
            min_qty = %rules.min_qty,
            "Cached exchange rules"
        );

        self.entries.write().await.insert(
            symbol.to_string(),
            CachedRules {
                rules: rules.clone(),
                fetched_at: Instant::now(),
            },
        );

        Ok(rules)
    }

    /// Number of symbols currently cached
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    async fn cached(&self, symbol: &str) -> Option<SymbolRules> {
        let entries = self.entries.read().await;
        let entry = entries.get(symbol)?;

        match self.ttl {
            Some(ttl) if entry.fetched_at.elapsed() >= ttl => None,
            _ => Some(entry.rules.clone()),
        }
    }
}
