//! Main REST client implementation

use chrono::{Datelike, Local, NaiveDate};
use reqwest::header::{HeaderMap, HeaderValue, ORIGIN, REFERER};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info, warn};

use nepse_auth::{Session, TokenTransform, DEFAULT_BASE_ID, DEFAULT_BASE_URL, PORTAL_USER_AGENT};

use crate::cache::ResponseCache;
use crate::endpoints::security::security_id_pairs;
use crate::endpoints::{FloorsheetEndpoints, MarketEndpoints, SecurityEndpoints};
use crate::error::{RestError, RestResult};
use crate::types::{FloorsheetQuery, FloorsheetRow, IndexSnapshot, MarketStatus, TodayPrice, TopMover};

/// Default request timeout
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default response-cache TTL
const DEFAULT_CACHE_TTL_SECS: u64 = 30;

/// NEPSE portal REST client
///
/// Owns one authenticated [`Session`] and serializes authenticate/refresh
/// behind an async mutex, so sharing the client across tasks never races two
/// authentications.
///
/// # Example
///
/// ```no_run
/// use nepse_auth::WasmTransform;
/// use nepse_rest::NepseRestClient;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let transform = WasmTransform::from_env()?;
///     let client = NepseRestClient::new(transform);
///
///     let status = client.get_market_status().await?;
///     println!("market open: {}", status.open());
///
///     let gainers = client.get_top_gainers(Some(5)).await?;
///     println!("top gainers: {:?}", gainers);
///
///     Ok(())
/// }
/// ```
pub struct NepseRestClient {
    http: Client,
    session: Mutex<Session>,
    cache: Option<ResponseCache>,
    base_url: String,
    security_ids: OnceCell<HashMap<String, i64>>,
}

impl NepseRestClient {
    /// Create a client against the production portal
    pub fn new(transform: impl TokenTransform + Send + Sync + 'static) -> Self {
        Self::with_config(transform, ClientConfig::default())
    }

    /// Create a client with custom configuration
    pub fn with_config(
        transform: impl TokenTransform + Send + Sync + 'static,
        config: ClientConfig,
    ) -> Self {
        let session = Session::with_base_url(transform, config.base_url.clone());
        Self::with_session(session, config)
    }

    /// Create a client around an existing session
    ///
    /// The session's base URL wins over the configured one; use this to
    /// resume from restored credentials.
    pub fn with_session(session: Session, config: ClientConfig) -> Self {
        let base_url = session.base_url().to_string();
        let http = build_http_client(&base_url, &config);

        info!("Created NEPSE REST client");

        Self {
            http,
            session: Mutex::new(session),
            cache: config
                .enable_cache
                .then(|| ResponseCache::new(Duration::from_secs(config.cache_ttl_secs))),
            base_url,
            security_ids: OnceCell::new(),
        }
    }

    /// The configured portal base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Authenticate now instead of lazily on the first request
    pub async fn authenticate(&self) -> RestResult<()> {
        self.session.lock().await.authenticate().await?;
        Ok(())
    }

    /// Exchange the held refresh token for a fresh access token
    pub async fn refresh(&self) -> RestResult<()> {
        self.session.lock().await.refresh().await?;
        Ok(())
    }

    /// Drop all cached responses
    pub fn clear_cache(&self) {
        if let Some(cache) = &self.cache {
            cache.clear();
        }
    }

    // ========================================================================
    // Endpoint Groups
    // ========================================================================

    /// Market overview endpoints
    pub fn market(&self) -> MarketEndpoints<'_> {
        MarketEndpoints::new(self)
    }

    /// Security, listing and disclosure endpoints
    pub fn securities(&self) -> SecurityEndpoints<'_> {
        SecurityEndpoints::new(self)
    }

    /// Signed POST endpoints (today-price, floorsheet)
    pub fn floorsheets(&self) -> FloorsheetEndpoints<'_> {
        FloorsheetEndpoints::new(self)
    }

    // ========================================================================
    // Convenience Methods
    // ========================================================================

    /// Get market open/close status
    pub async fn get_market_status(&self) -> RestResult<MarketStatus> {
        self.market().status().await
    }

    /// Get the market summary
    pub async fn get_market_summary(&self) -> RestResult<Value> {
        self.market().summary().await
    }

    /// Get NEPSE index data
    pub async fn get_nepse_index(&self) -> RestResult<Vec<IndexSnapshot>> {
        self.market().nepse_index().await
    }

    /// Get the top gainers, optionally truncated
    pub async fn get_top_gainers(&self, limit: Option<usize>) -> RestResult<Vec<TopMover>> {
        Ok(truncate(self.market().top_gainers().await?, limit))
    }

    /// Get the top losers, optionally truncated
    pub async fn get_top_losers(&self, limit: Option<usize>) -> RestResult<Vec<TopMover>> {
        Ok(truncate(self.market().top_losers().await?, limit))
    }

    /// Get the live market snapshot
    pub async fn get_live_market(&self) -> RestResult<Value> {
        self.market().live_market().await
    }

    /// Get today's OHLCV rows, or a past session's when a date is given
    pub async fn get_today_price(
        &self,
        business_date: Option<NaiveDate>,
    ) -> RestResult<Vec<TodayPrice>> {
        self.floorsheets().today_price(500, business_date).await
    }

    /// Get floorsheet transactions
    pub async fn get_floorsheet(&self, query: &FloorsheetQuery) -> RestResult<Vec<FloorsheetRow>> {
        self.floorsheets().floorsheet(query).await
    }

    /// Get detailed info for a symbol
    pub async fn get_security_details(&self, symbol: &str) -> RestResult<Value> {
        let security_id = self.security_id(symbol).await?;
        self.securities().security_detail(security_id).await
    }

    /// Resolve a symbol to its portal security id
    ///
    /// The mapping is built once per client from the daily-trade-stat
    /// listing.
    pub async fn security_id(&self, symbol: &str) -> RestResult<i64> {
        let map = self
            .security_ids
            .get_or_try_init(|| async {
                debug!("loading security id map");
                let rows = self.securities().daily_trade_stat().await?;
                Ok::<_, RestError>(security_id_pairs(&rows).collect::<HashMap<_, _>>())
            })
            .await?;

        map.get(&symbol.to_uppercase())
            .copied()
            .ok_or_else(|| RestError::UnknownSymbol(symbol.to_string()))
    }

    // ========================================================================
    // Request Plumbing
    // ========================================================================

    /// Authenticated GET returning the raw JSON body
    pub(crate) async fn get_value(
        &self,
        path_and_query: &str,
        cache: Option<(&str, Duration)>,
    ) -> RestResult<Value> {
        if let (Some(store), Some((key, _))) = (&self.cache, cache) {
            if let Some(hit) = store.get(key) {
                debug!("cache hit for {}", key);
                return Ok(hit);
            }
        }

        let headers = self.session.lock().await.auth_headers().await?;
        let url = format!("{}{}", self.base_url, path_and_query);
        debug!("GET {}", path_and_query);

        let value: Value = self
            .http
            .get(&url)
            .headers(headers)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if let (Some(store), Some((key, ttl))) = (&self.cache, cache) {
            store.insert(key, value.clone(), Some(ttl));
        }
        Ok(value)
    }

    /// Authenticated GET deserialized into `T`
    pub(crate) async fn get_typed<T: DeserializeOwned>(
        &self,
        path_and_query: &str,
        cache: Option<(&str, Duration)>,
    ) -> RestResult<T> {
        let value = self.get_value(path_and_query, cache).await?;
        serde_json::from_value(value).map_err(|e| RestError::Parse(e.to_string()))
    }

    /// Signed POST carrying `{"id": <payload id>}` for the business date
    ///
    /// The payload id derives from a freshly fetched market-status id, the
    /// day of month and the session salts; it is computed per request and
    /// never cached.
    pub(crate) async fn post_signed(
        &self,
        path_and_query: &str,
        business_date: NaiveDate,
    ) -> RestResult<Value> {
        let status = self.market().status().await?;
        let base_id = status.id.unwrap_or(DEFAULT_BASE_ID);

        let (headers, payload_id) = {
            let mut session = self.session.lock().await;
            let headers = session.auth_headers().await?;
            let payload_id = session.payload_id(base_id, business_date.day())?;
            (headers, payload_id)
        };

        let url = format!("{}{}", self.base_url, path_and_query);
        debug!("POST {} (signed)", path_and_query);

        let value: Value = self
            .http
            .post(&url)
            .headers(headers)
            .json(&serde_json::json!({ "id": payload_id }))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(value)
    }

    /// The business date signed requests should target
    ///
    /// Prefers the market-status `asOf` day so requests outside trading
    /// hours hit the last session; falls back to the local calendar day.
    pub(crate) async fn resolve_business_date(&self) -> NaiveDate {
        match self.market().status().await {
            Ok(status) => status
                .as_of_date()
                .unwrap_or_else(|| Local::now().date_naive()),
            Err(e) => {
                warn!("market status unavailable ({}), using today", e);
                Local::now().date_naive()
            }
        }
    }
}

impl std::fmt::Debug for NepseRestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NepseRestClient")
            .field("base_url", &self.base_url)
            .field("cache_enabled", &self.cache.is_some())
            .finish()
    }
}

fn truncate<T>(mut rows: Vec<T>, limit: Option<usize>) -> Vec<T> {
    if let Some(limit) = limit {
        rows.truncate(limit);
    }
    rows
}

fn build_http_client(base_url: &str, config: &ClientConfig) -> Client {
    let mut headers = HeaderMap::new();
    if let Ok(value) = HeaderValue::from_str(base_url) {
        headers.insert(REFERER, value.clone());
        headers.insert(ORIGIN, value);
    }

    Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .user_agent(config.user_agent.as_deref().unwrap_or(PORTAL_USER_AGENT))
        // The portal serves an incomplete certificate chain.
        .danger_accept_invalid_certs(true)
        .default_headers(headers)
        .build()
        .expect("Failed to create HTTP client")
}

/// Client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Portal base URL
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Custom user agent (the portal expects a browser-like one)
    pub user_agent: Option<String>,
    /// Enable the TTL response cache
    pub enable_cache: bool,
    /// Default cache TTL in seconds
    pub cache_ttl_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            user_agent: None,
            enable_cache: true,
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
        }
    }
}

impl ClientConfig {
    /// Create a new configuration builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the portal base URL
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set timeout
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Set user agent
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Enable or disable the response cache
    pub fn with_cache(mut self, enabled: bool) -> Self {
        self.enable_cache = enabled;
        self
    }

    /// Set the default cache TTL
    pub fn with_cache_ttl(mut self, secs: u64) -> Self {
        self.cache_ttl_secs = secs;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nepse_auth::{AuthResult, TokenTransform};

    struct NoopTransform;

    impl TokenTransform for NoopTransform {
        fn invoke(&self, _name: &str, _args: [i64; 5]) -> AuthResult<i64> {
            Ok(0)
        }
    }

    #[test]
    fn test_client_config_builder() {
        let config = ClientConfig::new()
            .with_timeout(60)
            .with_user_agent("test-agent")
            .with_cache(false);

        assert_eq!(config.timeout_secs, 60);
        assert_eq!(config.user_agent, Some("test-agent".to_string()));
        assert!(!config.enable_cache);
    }

    #[test]
    fn test_default_config_targets_the_portal() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert!(config.enable_cache);
    }

    #[test]
    fn test_client_debug_reports_cache_state() {
        let client =
            NepseRestClient::with_config(NoopTransform, ClientConfig::new().with_cache(false));
        let debug = format!("{:?}", client);
        assert!(debug.contains("cache_enabled: false"));
    }

    #[test]
    fn test_truncate_applies_only_with_limit() {
        assert_eq!(truncate(vec![1, 2, 3], None), vec![1, 2, 3]);
        assert_eq!(truncate(vec![1, 2, 3], Some(2)), vec![1, 2]);
    }
}
