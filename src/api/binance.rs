use super::auth::{build_query, sign_request};
use super::ExchangeTransport;
use crate::config::{Credentials, ExchangeSettings};
use crate::error::ExchangeError;
use crate::models::{Candle, OrderResult, Side, SymbolRules};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use governor::{Quota, RateLimiter};
use reqwest::{Client, Method, Response};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::num::NonZeroU32;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

const API_KEY_HEADER: &str = "X-MBX-APIKEY";
const INVALID_SYMBOL_CODE: i64 = -1121;

type BinanceRateLimiter = RateLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Client for the Binance spot REST API
///
/// Cloneable; all clones share the same rate limiter.
#[derive(Clone)]
pub struct BinanceClient {
    client: Client,
    base_url: String,
    credentials: Credentials,
    rate_limiter: Arc<BinanceRateLimiter>,
}

// ============== Response Types ==============

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServerTime {
    server_time: i64,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    code: i64,
    msg: String,
}

#[derive(Debug, Deserialize)]
struct ExchangeInfo {
    symbols: Vec<SymbolInfo>,
}

#[derive(Debug, Deserialize)]
struct SymbolInfo {
    symbol: String,
    filters: Vec<SymbolFilter>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "filterType")]
enum SymbolFilter {
    #[serde(rename = "PRICE_FILTER", rename_all = "camelCase")]
    Price { tick_size: Decimal },
    #[serde(rename = "LOT_SIZE", rename_all = "camelCase")]
    LotSize { step_size: Decimal, min_qty: Decimal },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct AccountInfo {
    balances: Vec<RawBalance>,
}

#[derive(Debug, Deserialize)]
struct RawBalance {
    asset: String,
    free: Decimal,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderResponse {
    order_id: i64,
    client_order_id: String,
    #[serde(default)]
    orig_qty: Option<Decimal>,
    #[serde(default)]
    executed_qty: Option<Decimal>,
}

impl OrderResponse {
    /// Filled quantity for market orders, accepted quantity for resting ones
    fn into_result(self, requested: Decimal) -> OrderResult {
        let quantity = match (self.executed_qty, self.orig_qty) {
            (Some(executed), _) if executed > Decimal::ZERO => executed,
            (_, Some(orig)) => orig,
            _ => requested,
        };
        OrderResult::accepted(quantity, self.order_id.to_string(), self.client_order_id)
    }
}

// ============== Implementation ==============

impl BinanceClient {
    pub fn new(settings: &ExchangeSettings) -> Result<Self, ExchangeError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()?;

        let per_minute = NonZeroU32::new(settings.requests_per_minute).unwrap_or(NonZeroU32::MIN);
        let rate_limiter = Arc::new(RateLimiter::direct(Quota::per_minute(per_minute)));

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            credentials: settings.credentials.clone(),
            rate_limiter,
        })
    }

    /// Exchange clock in milliseconds, used to timestamp signed requests
    pub async fn server_time(&self) -> Result<i64, ExchangeError> {
        let time: ServerTime = self.get_public("/api/v3/time", &[]).await?;
        Ok(time.server_time)
    }

    async fn get_public<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ExchangeError> {
        self.rate_limiter.until_ready().await;

        let url = format!("{}{}", self.base_url, path);
        let response = self.client.get(&url).query(query).send().await?;
        Self::parse_response(response).await
    }

    async fn send_signed<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        mut params: BTreeMap<&str, String>,
    ) -> Result<T, ExchangeError> {
        let timestamp = self.server_time().await?;
        params.insert("timestamp", timestamp.to_string());

        let query_string = build_query(&params);
        let signature = sign_request(&self.credentials.api_secret, &query_string)?;
        let url = format!(
            "{}{}?{}&signature={}",
            self.base_url, path, query_string, signature
        );

        self.rate_limiter.until_ready().await;
        let response = self
            .client
            .request(method, &url)
            .header(API_KEY_HEADER, &self.credentials.api_key)
            .send()
            .await?;
        Self::parse_response(response).await
    }

    async fn parse_response<T: DeserializeOwned>(response: Response) -> Result<T, ExchangeError> {
        let status = response.status();
        let text = response.text().await?;

        if status.is_success() {
            return serde_json::from_str(&text).map_err(|e| ExchangeError::Decode(e.to_string()));
        }

        match serde_json::from_str::<ApiErrorResponse>(&text) {
            Ok(api_error) => Err(ExchangeError::Exchange {
                code: api_error.code,
                message: api_error.msg,
            }),
            Err(_) => Err(ExchangeError::Exchange {
                code: i64::from(status.as_u16()),
                message: text,
            }),
        }
    }

    async fn submit_order(
        &self,
        mut params: BTreeMap<&'static str, String>,
        quantity: Decimal,
    ) -> Result<OrderResult, ExchangeError> {
        let client_order_id = uuid::Uuid::new_v4().simple().to_string();
        params.insert("quantity", format_decimal(quantity));
        params.insert("newClientOrderId", client_order_id);

        let response: OrderResponse = self
            .send_signed(Method::POST, "/api/v3/order", params)
            .await?;

        tracing::debug!(order_id = response.order_id, "Order accepted by Binance");
        Ok(response.into_result(quantity))
    }
}

#[async_trait]
impl ExchangeTransport for BinanceClient {
    async fn get_candles(
        &self,
        symbol: &str,
        interval: &str,
        limit: u32,
    ) -> Result<Vec<Candle>, ExchangeError> {
        let rows: Vec<Vec<Value>> = self
            .get_public(
                "/api/v3/klines",
                &[
                    ("symbol", symbol.to_string()),
                    ("interval", interval.to_string()),
                    ("limit", limit.to_string()),
                ],
            )
            .await?;

        rows.iter().map(|row| parse_kline(row)).collect()
    }

    async fn get_symbol_rules(&self, symbol: &str) -> Result<Option<SymbolRules>, ExchangeError> {
        let info: ExchangeInfo = match self
            .get_public("/api/v3/exchangeInfo", &[("symbol", symbol.to_string())])
            .await
        {
            Ok(info) => info,
            Err(ExchangeError::Exchange { code, .. }) if code == INVALID_SYMBOL_CODE => {
                return Ok(None)
            }
            Err(e) => return Err(e),
        };

        let Some(symbol_info) = info.symbols.into_iter().find(|s| s.symbol == symbol) else {
            return Ok(None);
        };

        let mut tick_size = None;
        let mut lot_size = None;
        for filter in symbol_info.filters {
            match filter {
                SymbolFilter::Price { tick_size: tick } => tick_size = Some(tick),
                SymbolFilter::LotSize { step_size, min_qty } => lot_size = Some((step_size, min_qty)),
                SymbolFilter::Other => {}
            }
        }

        let tick_size = tick_size
            .ok_or_else(|| ExchangeError::Decode(format!("{} has no PRICE_FILTER", symbol)))?;
        let (step_size, min_qty) = lot_size
            .ok_or_else(|| ExchangeError::Decode(format!("{} has no LOT_SIZE filter", symbol)))?;

        Ok(Some(SymbolRules {
            symbol: symbol_info.symbol,
            tick_size,
            step_size,
            min_qty,
        }))
    }

    async fn get_balance(&self, asset: &str) -> Result<Decimal, ExchangeError> {
        let account: AccountInfo = self
            .send_signed(Method::GET, "/api/v3/account", BTreeMap::new())
            .await?;

        Ok(account
            .balances
            .into_iter()
            .find(|b| b.asset == asset)
            .map(|b| b.free)
            .unwrap_or(Decimal::ZERO))
    }

    async fn submit_market_order(
        &self,
        symbol: &str,
        side: Side,
        quantity: Decimal,
    ) -> Result<OrderResult, ExchangeError> {
        let mut params = BTreeMap::new();
        params.insert("symbol", symbol.to_string());
        params.insert("side", side.as_str().to_string());
        params.insert("type", "MARKET".to_string());

        self.submit_order(params, quantity).await
    }

    async fn submit_limit_order(
        &self,
        symbol: &str,
        side: Side,
        quantity: Decimal,
        price: Decimal,
    ) -> Result<OrderResult, ExchangeError> {
        let mut params = BTreeMap::new();
        params.insert("symbol", symbol.to_string());
        params.insert("side", side.as_str().to_string());
        params.insert("type", "LIMIT".to_string());
        params.insert("timeInForce", "GTC".to_string());
        params.insert("price", format_decimal(price));

        self.submit_order(params, quantity).await
    }
}

/// Plain decimal notation without trailing zeros, as Binance expects
pub fn format_decimal(value: Decimal) -> String {
    value.normalize().to_string()
}

/// Parse one row of `/api/v3/klines`:
/// `[openTime, open, high, low, close, volume, closeTime, ...]`
fn parse_kline(row: &[Value]) -> Result<Candle, ExchangeError> {
    if row.len() < 7 {
        return Err(ExchangeError::Decode(format!(
            "kline row has {} fields, expected at least 7",
            row.len()
        )));
    }

    Ok(Candle {
        open_time: parse_millis(&row[0])?,
        open: parse_decimal(&row[1])?,
        high: parse_decimal(&row[2])?,
        low: parse_decimal(&row[3])?,
        close: parse_decimal(&row[4])?,
        volume: parse_decimal(&row[5])?,
        close_time: parse_millis(&row[6])?,
    })
}

fn parse_decimal(value: &Value) -> Result<Decimal, ExchangeError> {
    let raw = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        other => return Err(ExchangeError::Decode(format!("expected decimal, got {}", other))),
    };
    Decimal::from_str(&raw).map_err(|e| ExchangeError::Decode(format!("{}: {}", raw, e)))
}

fn parse_millis(value: &Value) -> Result<DateTime<Utc>, ExchangeError> {
    value
        .as_i64()
        .and_then(DateTime::from_timestamp_millis)
        .ok_or_else(|| ExchangeError::Decode(format!("invalid timestamp {}", value)))
}
