//! REST API client for the Nepal Stock Exchange web portal
//!
//! This crate wraps the portal's JSON API: market overview, indices,
//! security listings, disclosures, and the signed floorsheet/today-price
//! endpoints. Authentication — token descrambling, refresh and payload-id
//! signing — lives in `nepse-auth`; this crate consumes its session.
//!
//! # Features
//!
//! - **Market Data**: status, summary, indices, live market, top-ten
//! - **Securities**: listings, details, daily trade data, market depth
//! - **Disclosures**: news, press releases, dividends, AGMs, holidays
//! - **Signed POSTs**: floorsheet and today-price with per-request payload ids
//! - **Caching**: per-endpoint TTL cache over JSON bodies
//!
//! # Example
//!
//! ```no_run
//! use nepse_auth::WasmTransform;
//! use nepse_rest::{FloorsheetQuery, NepseRestClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let transform = WasmTransform::from_file("assets/css.wasm")?;
//!     let client = NepseRestClient::new(transform);
//!
//!     let status = client.get_market_status().await?;
//!     println!("market open: {}", status.open());
//!
//!     let sheet = client
//!         .get_floorsheet(&FloorsheetQuery::for_symbol("NABIL"))
//!         .await?;
//!     println!("{} transactions", sheet.len());
//!
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod client;
pub mod endpoints;
pub mod error;
pub mod types;

// Re-export main types
pub use cache::ResponseCache;
pub use client::{ClientConfig, NepseRestClient};
pub use error::{RestError, RestResult};

// Re-export endpoint-specific types
pub use types::{
    // Market data
    IndexSnapshot, MarketStatus, TodayPrice, TopMover,
    // Floorsheet
    FloorsheetQuery, FloorsheetResponse, FloorsheetRow, Paged,
};

// Re-export rust_decimal for users
pub use rust_decimal::Decimal;
