//! Types for NEPSE portal responses
//!
//! The portal's wire shapes are loose: ids arrive as numbers or strings,
//! most fields are optional in practice, and several endpoints return bodies
//! the frontend itself treats as opaque. Fields the SDK relies on are typed;
//! everything else rides along in `serde_json::Value`.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

// ============================================================================
// Market Status
// ============================================================================

/// Body of `/api/nots/nepse-data/market-open`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MarketStatus {
    /// Status id, the base term of the payload-id derivation
    pub id: Option<i64>,
    /// "OPEN" or "CLOSE"
    pub is_open: Option<String>,
    /// Last trading timestamp, e.g. `2026-02-12T15:00:00`
    pub as_of: Option<String>,
}

impl MarketStatus {
    /// Whether the market is currently open
    pub fn open(&self) -> bool {
        self.is_open.as_deref() == Some("OPEN")
    }

    /// Date part of `asOf`, the last trading day
    pub fn as_of_date(&self) -> Option<NaiveDate> {
        let date_part = self.as_of.as_deref()?.split('T').next()?;
        NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
    }
}

// ============================================================================
// Indices & Movers
// ============================================================================

/// One row of the NEPSE index / sub-index listings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IndexSnapshot {
    pub index: Option<String>,
    pub current_value: Option<Decimal>,
    pub change: Option<Decimal>,
    pub per_change: Option<Decimal>,
    pub high: Option<Decimal>,
    pub low: Option<Decimal>,
}

/// One row of the top-ten listings (gainers, losers, turnover, ...)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TopMover {
    pub symbol: Option<String>,
    pub security_name: Option<String>,
    pub ltp: Option<Decimal>,
    pub point_change: Option<Decimal>,
    pub percentage_change: Option<Decimal>,
    /// Turnover/trade listings carry amounts instead of changes
    pub turnover: Option<Decimal>,
}

// ============================================================================
// Prices
// ============================================================================

/// One row of the today-price (OHLCV) listing
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TodayPrice {
    pub symbol: Option<String>,
    pub open_price: Option<Decimal>,
    pub high_price: Option<Decimal>,
    pub low_price: Option<Decimal>,
    pub close_price: Option<Decimal>,
    pub total_trade_quantity: Option<Decimal>,
    pub business_date: Option<String>,
}

// ============================================================================
// Floorsheet
// ============================================================================

/// Paged wrapper the portal uses for listing endpoints
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Paged<T> {
    pub content: Vec<T>,
    pub total_pages: Option<i64>,
}

/// Body of the floorsheet POST endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FloorsheetResponse {
    pub floorsheets: Paged<FloorsheetRow>,
}

/// One floorsheet transaction
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FloorsheetRow {
    pub contract_id: Option<i64>,
    pub stock_symbol: Option<String>,
    pub contract_quantity: Option<Decimal>,
    pub contract_rate: Option<Decimal>,
    pub contract_amount: Option<Decimal>,
    pub business_date: Option<String>,
    pub trade_time: Option<String>,
    /// Member ids, buyer/seller brokers and whatever else the portal adds
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

/// Parameters for a floorsheet fetch
#[derive(Debug, Clone)]
pub struct FloorsheetQuery {
    /// Restrict to one security; `None` means the whole market
    pub symbol: Option<String>,
    /// Business date; `None` means the latest session
    pub business_date: Option<NaiveDate>,
    /// Page size
    pub size: usize,
    /// Starting page (0-indexed)
    pub page: usize,
    /// Maximum pages to fetch. `None` keeps the portal frontend's defaults:
    /// all pages when a symbol is given, one page for the whole market.
    pub max_pages: Option<usize>,
}

impl Default for FloorsheetQuery {
    fn default() -> Self {
        Self {
            symbol: None,
            business_date: None,
            size: 500,
            page: 0,
            max_pages: None,
        }
    }
}

impl FloorsheetQuery {
    /// Query for one security's full floorsheet
    pub fn for_symbol(symbol: impl Into<String>) -> Self {
        Self {
            symbol: Some(symbol.into()),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_market_status_as_of_date() {
        let status: MarketStatus = serde_json::from_str(
            r#"{"id": 147, "isOpen": "OPEN", "asOf": "2026-02-12T15:00:00"}"#,
        )
        .unwrap();

        assert!(status.open());
        assert_eq!(status.id, Some(147));
        assert_eq!(
            status.as_of_date(),
            NaiveDate::from_ymd_opt(2026, 2, 12)
        );
    }

    #[test]
    fn test_market_status_tolerates_missing_fields() {
        let status: MarketStatus = serde_json::from_str("{}").unwrap();
        assert!(!status.open());
        assert_eq!(status.as_of_date(), None);
    }

    #[test]
    fn test_top_mover_row() {
        let row: TopMover = serde_json::from_str(
            r#"{"symbol": "NABIL", "ltp": 512.5, "percentageChange": 4.2, "securityName": "Nabil Bank"}"#,
        )
        .unwrap();

        assert_eq!(row.symbol.as_deref(), Some("NABIL"));
        assert_eq!(row.ltp, Some(dec!(512.5)));
        assert_eq!(row.percentage_change, Some(dec!(4.2)));
    }

    #[test]
    fn test_floorsheet_response_keeps_unknown_fields() {
        let body = r#"{
            "floorsheets": {
                "content": [{
                    "contractId": 12345,
                    "stockSymbol": "NABIL",
                    "contractQuantity": 100,
                    "contractRate": 512.5,
                    "buyerMemberId": "58"
                }],
                "totalPages": 3
            }
        }"#;
        let parsed: FloorsheetResponse = serde_json::from_str(body).unwrap();

        assert_eq!(parsed.floorsheets.total_pages, Some(3));
        let row = &parsed.floorsheets.content[0];
        assert_eq!(row.contract_id, Some(12345));
        assert_eq!(row.extra.get("buyerMemberId"), Some(&serde_json::json!("58")));
    }

    #[test]
    fn test_floorsheet_response_tolerates_empty_body() {
        let parsed: FloorsheetResponse = serde_json::from_str("{}").unwrap();
        assert!(parsed.floorsheets.content.is_empty());
        assert_eq!(parsed.floorsheets.total_pages, None);
    }
}
