//! Signed POST endpoints
//!
//! Today-price and the floorsheet refuse plain requests: the body must carry
//! the numeric payload id derived from the current market-status id, the
//! business day and the session salts. The id is recomputed for every
//! request — it is never cached alongside the responses.

use chrono::NaiveDate;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, instrument, warn};

use crate::client::NepseRestClient;
use crate::error::{RestError, RestResult};
use crate::types::{FloorsheetQuery, FloorsheetResponse, FloorsheetRow, TodayPrice};

/// Pause between floorsheet pages for one security
const PAGE_DELAY_SYMBOL: Duration = Duration::from_millis(100);
/// The whole-market floorsheet is heavier; pace it slower
const PAGE_DELAY_MARKET: Duration = Duration::from_millis(500);

/// Signed POST endpoints
pub struct FloorsheetEndpoints<'a> {
    client: &'a NepseRestClient,
}

impl<'a> FloorsheetEndpoints<'a> {
    pub(crate) fn new(client: &'a NepseRestClient) -> Self {
        Self { client }
    }

    /// Get today's OHLCV rows for all securities
    ///
    /// Without a date this resolves the last trading day from market status,
    /// so it returns data outside trading hours too.
    #[instrument(skip(self))]
    pub async fn today_price(
        &self,
        size: usize,
        business_date: Option<NaiveDate>,
    ) -> RestResult<Vec<TodayPrice>> {
        let date = match business_date {
            Some(date) => date,
            None => self.client.resolve_business_date().await,
        };

        let path = format!(
            "/api/nots/nepse-data/today-price?size={}&businessDate={}",
            size,
            date.format("%Y-%m-%d")
        );
        let body = self.client.post_signed(&path, date).await?;

        // The endpoint answers with a bare array, not a paged wrapper.
        serde_json::from_value(body).map_err(|e| RestError::Parse(e.to_string()))
    }

    /// Get floorsheet transactions
    ///
    /// Pages through the portal's paged wrapper; see [`FloorsheetQuery`] for
    /// the paging defaults.
    #[instrument(skip(self, query), fields(symbol = query.symbol.as_deref()))]
    pub async fn floorsheet(&self, query: &FloorsheetQuery) -> RestResult<Vec<FloorsheetRow>> {
        let stock_id = match &query.symbol {
            Some(symbol) => Some(self.client.security_id(symbol).await?),
            None => None,
        };

        let max_pages = query
            .max_pages
            .unwrap_or(if stock_id.is_some() { 0 } else { 1 });
        let delay = if stock_id.is_some() {
            PAGE_DELAY_SYMBOL
        } else {
            PAGE_DELAY_MARKET
        };
        let date = match query.business_date {
            Some(date) => date,
            None => self.client.resolve_business_date().await,
        };

        let mut rows = Vec::new();
        let mut page = query.page;
        let mut pages_fetched = 0usize;

        loop {
            let mut params = format!("size={}", query.size);
            if let Some(id) = stock_id {
                params.push_str(&format!("&stockId={}", id));
            }
            params.push_str(&format!("&sort=contractId,desc&page={}", page));
            if let Some(date) = query.business_date {
                params.push_str(&format!("&businessDate={}", date.format("%Y-%m-%d")));
            }

            let path = format!("/api/nots/nepse-data/floorsheet?{}", params);
            let body = self.client.post_signed(&path, date).await?;
            let parsed: FloorsheetResponse =
                serde_json::from_value(body).map_err(|e| RestError::Parse(e.to_string()))?;

            let content = parsed.floorsheets.content;
            if content.is_empty() {
                break;
            }
            rows.extend(content);
            pages_fetched += 1;

            let total_pages = parsed.floorsheets.total_pages.unwrap_or(1).max(1) as usize;
            if page + 1 >= total_pages {
                break;
            }
            if max_pages > 0 && pages_fetched >= max_pages {
                debug!("stopping at page limit {}", max_pages);
                break;
            }

            page += 1;
            sleep(delay).await;
        }

        if rows.is_empty() {
            warn!("floorsheet returned no rows");
        }
        Ok(rows)
    }
}
