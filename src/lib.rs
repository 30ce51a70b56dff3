//! A small Rust client for the Copernicus Open Access Hub (DHuS).
//!
//! This crate implements the hub's search-then-download flow:
//! describe the products you want, let the client page through the
//! catalog, then fetch a product file with its MD5 checksum verified.
//!
//! ## Quick start
//! - Pass credentials explicitly through [`ClientConfig::new`], or load them on demand
//!   with [`ClientConfig::from_env`] (`SCIHUB_URL`, `SCIHUB_CREDENTIALS` or a `.scihubrc` file).
//! - Call [`Client::search`] with a [`SearchCriteria`], then [`Client::download`] with a
//!   record's `id`.
//!
//! ```no_run
//! use chrono::{TimeZone, Utc};
//! use scihub::{Client, ClientConfig, Platform, SearchCriteria, TransferOutcome};
//! use std::path::Path;
//!
//! fn main() -> scihub::Result<()> {
//!     let client = Client::new(ClientConfig::new("user", "password"))?;
//!     let criteria = SearchCriteria::new(Utc.with_ymd_and_hms(2022, 1, 1, 0, 0, 0).unwrap())
//!         .with_platform(Platform::Sentinel2)
//!         .with_tile("36UYA")
//!         .with_max_cloud_cover(20);
//!
//!     let result = client.search(&criteria)?;
//!     for record in &result.records {
//!         match client.download(&record.id, Path::new("downloads"))? {
//!             TransferOutcome::Downloaded(file) => println!("saved {}", file.path.display()),
//!             TransferOutcome::ArchivePending { id } => println!("{id} is being restored"),
//!         }
//!     }
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]

mod client;
mod config;
mod download;
mod error;
mod query;
mod response;
mod search;
mod util;
mod verify;

pub use client::Client;
pub use config::{ClientConfig, DEFAULT_BASE_URL, MAX_ROWS};
pub use download::{DownloadedProduct, ProductTransferEngine, TransferEngine, TransferOutcome};
pub use error::{Error, Result};
pub use query::{Footprint, Platform, SearchCriteria, SpatialRelation, build_query, encoded_query};
pub use response::{CatalogRecord, Link, SearchPage, normalize_page};
pub use search::{CatalogEngine, CatalogSearcher, HttpTransport, QueryResult, RawResponse, Transport};
pub use verify::{HashingReader, checksum_matches};
