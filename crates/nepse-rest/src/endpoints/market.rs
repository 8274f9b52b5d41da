//! Market overview endpoints
//!
//! Status, summaries, indices and the top-ten listings. All of these are
//! plain authenticated GETs.

use serde_json::Value;
use std::time::Duration;
use tracing::instrument;

use crate::client::NepseRestClient;
use crate::error::RestResult;
use crate::types::{IndexSnapshot, MarketStatus, TopMover};

/// Market status changes rarely; cache it the longest of the live data.
const TTL_STATUS: Duration = Duration::from_secs(60);
const TTL_SNAPSHOT: Duration = Duration::from_secs(30);
const TTL_LIVE: Duration = Duration::from_secs(15);

/// Market overview endpoints
pub struct MarketEndpoints<'a> {
    client: &'a NepseRestClient,
}

impl<'a> MarketEndpoints<'a> {
    pub(crate) fn new(client: &'a NepseRestClient) -> Self {
        Self { client }
    }

    /// Get market open/close status
    #[instrument(skip(self))]
    pub async fn status(&self) -> RestResult<MarketStatus> {
        self.client
            .get_typed(
                "/api/nots/nepse-data/market-open",
                Some(("market_status", TTL_STATUS)),
            )
            .await
    }

    /// Get the market summary (turnover, traded shares, transactions, ...)
    #[instrument(skip(self))]
    pub async fn summary(&self) -> RestResult<Value> {
        self.client
            .get_value("/api/nots/market-summary/", Some(("market_summary", TTL_SNAPSHOT)))
            .await
    }

    /// Get NEPSE index data
    #[instrument(skip(self))]
    pub async fn nepse_index(&self) -> RestResult<Vec<IndexSnapshot>> {
        self.client
            .get_typed("/api/nots/nepse-index", Some(("nepse_index", TTL_SNAPSHOT)))
            .await
    }

    /// Get every market index in one call
    #[instrument(skip(self))]
    pub async fn all_indices(&self) -> RestResult<Value> {
        self.client
            .get_value("/api/nots/index", Some(("all_indices", TTL_SNAPSHOT)))
            .await
    }

    /// Get the sector sub-indices
    #[instrument(skip(self))]
    pub async fn sub_indices(&self) -> RestResult<Vec<IndexSnapshot>> {
        self.client
            .get_typed("/api/nots", Some(("sub_indices", TTL_SNAPSHOT)))
            .await
    }

    /// Get the live market snapshot for all securities
    #[instrument(skip(self))]
    pub async fn live_market(&self) -> RestResult<Value> {
        self.client
            .get_value("/api/nots/lives-market", Some(("live_market", TTL_LIVE)))
            .await
    }

    /// Get the top gainers
    #[instrument(skip(self))]
    pub async fn top_gainers(&self) -> RestResult<Vec<TopMover>> {
        self.top_ten("top-gainer", "top_gainers").await
    }

    /// Get the top losers
    #[instrument(skip(self))]
    pub async fn top_losers(&self) -> RestResult<Vec<TopMover>> {
        self.top_ten("top-loser", "top_losers").await
    }

    /// Get the top ten securities by turnover
    #[instrument(skip(self))]
    pub async fn top_turnover(&self) -> RestResult<Vec<TopMover>> {
        self.top_ten("turnover", "top_turnover").await
    }

    /// Get the top ten securities by traded volume
    #[instrument(skip(self))]
    pub async fn top_trade(&self) -> RestResult<Vec<TopMover>> {
        self.top_ten("trade", "top_trade").await
    }

    /// Get the top ten securities by transaction count
    #[instrument(skip(self))]
    pub async fn top_transaction(&self) -> RestResult<Vec<TopMover>> {
        self.top_ten("transaction", "top_transaction").await
    }

    async fn top_ten(&self, kind: &str, cache_key: &str) -> RestResult<Vec<TopMover>> {
        let path = format!("/api/nots/top-ten/{}?all=false", kind);
        self.client
            .get_typed(&path, Some((cache_key, TTL_SNAPSHOT)))
            .await
    }
}
