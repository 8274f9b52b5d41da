//! Security, listing and disclosure endpoints
//!
//! Listings move slowly and cache for an hour or more; per-security trade
//! data uses the short TTLs. Several of these bodies are passed through as
//! raw JSON — the portal frontend itself treats them as opaque.

use chrono::NaiveDate;
use serde_json::Value;
use std::time::Duration;
use tracing::instrument;

use crate::client::NepseRestClient;
use crate::error::RestResult;

const TTL_LISTING: Duration = Duration::from_secs(3600);
const TTL_STAT: Duration = Duration::from_secs(15);
const TTL_NEWS: Duration = Duration::from_secs(300);
const TTL_CALENDAR: Duration = Duration::from_secs(86_400);
const TTL_GRAPH: Duration = Duration::from_secs(1800);

/// Index code the portal uses for the NEPSE index graph
const NEPSE_INDEX_CODE: i64 = 58;

/// Security and disclosure endpoints
pub struct SecurityEndpoints<'a> {
    client: &'a NepseRestClient,
}

impl<'a> SecurityEndpoints<'a> {
    pub(crate) fn new(client: &'a NepseRestClient) -> Self {
        Self { client }
    }

    // ========================================================================
    // Listings
    // ========================================================================

    /// Get the list of all listed companies
    #[instrument(skip(self))]
    pub async fn company_list(&self) -> RestResult<Value> {
        self.client
            .get_value("/api/nots/company/list", Some(("company_list", TTL_LISTING)))
            .await
    }

    /// Get the list of all non-delisted securities
    #[instrument(skip(self))]
    pub async fn security_list(&self) -> RestResult<Value> {
        self.client
            .get_value(
                "/api/nots/security?nonDelisted=true",
                Some(("security_list", TTL_LISTING)),
            )
            .await
    }

    /// Get detailed info for one security
    #[instrument(skip(self))]
    pub async fn security_detail(&self, security_id: i64) -> RestResult<Value> {
        let path = format!("/api/nots/security/{}", security_id);
        let key = format!("security_detail_{}", security_id);
        self.client.get_value(&path, Some((&key, TTL_LISTING))).await
    }

    /// Get the list of all market sectors
    #[instrument(skip(self))]
    pub async fn sector_list(&self) -> RestResult<Value> {
        self.client
            .get_value("/api/nots/sector", Some(("sector_list", TTL_CALENDAR)))
            .await
    }

    // ========================================================================
    // Trade Data
    // ========================================================================

    /// Get the daily price/volume stats for all securities
    ///
    /// Also the source of the symbol → security-id mapping.
    #[instrument(skip(self))]
    pub async fn daily_trade_stat(&self) -> RestResult<Vec<Value>> {
        self.client
            .get_typed(
                "/api/nots/securityDailyTradeStat/58",
                Some(("daily_trade_stat", TTL_STAT)),
            )
            .await
    }

    /// Get daily trade records for a business date
    #[instrument(skip(self))]
    pub async fn daily_trade(
        &self,
        date: NaiveDate,
        size: usize,
        page: usize,
    ) -> RestResult<Vec<Value>> {
        let path = format!(
            "/api/nots/securityDailyTradeDto/business-date/{}?size={}&page={}",
            date.format("%Y-%m-%d"),
            size,
            page
        );
        let key = format!("daily_trade_{}_{}", date, page);
        let body = self.client.get_value(&path, Some((&key, TTL_STAT))).await?;

        // Rows live under `content`; a bare body means no data for the date.
        match body.get("content") {
            Some(Value::Array(rows)) => Ok(rows.clone()),
            _ => Ok(Vec::new()),
        }
    }

    /// Get live market depth (buy/sell orders) for a symbol
    #[instrument(skip(self))]
    pub async fn market_depth(&self, symbol: &str) -> RestResult<Value> {
        let security_id = self.client.security_id(symbol).await?;
        let path = format!("/api/nots/nepse-data/marketdepth/{}", security_id);
        self.client.get_value(&path, None).await
    }

    // ========================================================================
    // Graphs
    // ========================================================================

    /// Get NEPSE index history, optionally bounded by a date range
    #[instrument(skip(self))]
    pub async fn index_graph(
        &self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> RestResult<Value> {
        let path = match (start, end) {
            (Some(start), Some(end)) => format!(
                "/api/nots/graph/index?indexCode={}&startDate={}&endDate={}",
                NEPSE_INDEX_CODE,
                start.format("%Y-%m-%d"),
                end.format("%Y-%m-%d")
            ),
            _ => format!("/api/nots/graph/index?indexCode={}", NEPSE_INDEX_CODE),
        };
        let key = format!("index_graph_{:?}_{:?}", start, end);
        self.client.get_value(&path, Some((&key, TTL_GRAPH))).await
    }

    /// Get price history for one security
    ///
    /// The portal returns the full dataset; date filtering happens locally
    /// on the `t` (epoch millis) field when a range is given.
    #[instrument(skip(self))]
    pub async fn company_graph(
        &self,
        symbol: &str,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> RestResult<Value> {
        let security_id = self.client.security_id(symbol).await?;
        let path = format!("/api/nots/market/graphdata/{}", security_id);
        let key = format!("company_graph_{}", security_id);
        let body = self.client.get_value(&path, Some((&key, TTL_GRAPH))).await?;

        let (Some(start), Some(end)) = (start, end) else {
            return Ok(body);
        };
        let Value::Array(points) = body else {
            return Ok(body);
        };

        let start_ms = start.and_hms_opt(0, 0, 0).map(|t| t.and_utc().timestamp_millis());
        let end_ms = end.and_hms_opt(23, 59, 59).map(|t| t.and_utc().timestamp_millis());
        let (Some(start_ms), Some(end_ms)) = (start_ms, end_ms) else {
            return Ok(Value::Array(points));
        };

        let filtered = points
            .into_iter()
            .filter(|p| {
                p.get("t")
                    .and_then(Value::as_i64)
                    .map(|t| t >= start_ms && t <= end_ms)
                    .unwrap_or(false)
            })
            .collect();
        Ok(Value::Array(filtered))
    }

    // ========================================================================
    // News & Corporate Actions
    // ========================================================================

    /// Get general market news and alerts
    #[instrument(skip(self))]
    pub async fn news_and_alerts(&self) -> RestResult<Value> {
        self.client
            .get_value(
                "/api/nots/news/media/news-and-alerts",
                Some(("news_alerts", TTL_NEWS)),
            )
            .await
    }

    /// Get news for one company
    #[instrument(skip(self))]
    pub async fn company_news(&self, symbol: &str) -> RestResult<Value> {
        let security_id = self.client.security_id(symbol).await?;
        let path = format!("/api/nots/application/company-news/{}", security_id);
        let key = format!("news_{}", security_id);
        self.client.get_value(&path, Some((&key, TTL_NEWS))).await
    }

    /// Get official portal press releases
    #[instrument(skip(self))]
    pub async fn press_releases(&self) -> RestResult<Value> {
        self.client
            .get_value(
                "/api/nots/news/press-release",
                Some(("press_releases", TTL_LISTING)),
            )
            .await
    }

    /// Get dividend history for one company
    #[instrument(skip(self))]
    pub async fn dividends(&self, symbol: &str) -> RestResult<Value> {
        let security_id = self.client.security_id(symbol).await?;
        let path = format!("/api/nots/application/dividend/{}", security_id);
        self.client.get_value(&path, None).await
    }

    /// Get AGM information for one company
    #[instrument(skip(self))]
    pub async fn agm(&self, symbol: &str) -> RestResult<Value> {
        let security_id = self.client.security_id(symbol).await?;
        let path = format!("/api/nots/application/agm/{}", security_id);
        self.client.get_value(&path, None).await
    }

    /// Get market holidays for a year
    #[instrument(skip(self))]
    pub async fn holiday_list(&self, year: i32) -> RestResult<Value> {
        let path = format!("/api/nots/holiday/list?year={}", year);
        let key = format!("holidays_{}", year);
        self.client.get_value(&path, Some((&key, TTL_CALENDAR))).await
    }
}

/// Extract the symbol → security-id pairs from a daily-trade-stat body
///
/// Ids arrive as numbers or numeric strings depending on the portal build.
pub(crate) fn security_id_pairs(rows: &[Value]) -> impl Iterator<Item = (String, i64)> + '_ {
    rows.iter().filter_map(|row| {
        let symbol = row.get("symbol")?.as_str()?.to_uppercase();
        let id_field = row.get("securityId")?;
        let id = id_field
            .as_i64()
            .or_else(|| id_field.as_str().and_then(|s| s.parse().ok()))?;
        Some((symbol, id))
    })
}
