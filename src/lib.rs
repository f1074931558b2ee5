//! iheartjane スクレイパーライブラリ
//!
//! - ブランド: 地域内の店舗 → ブランド → 商品 → 価格 を JSONL に出力
//! - ディスペンサリー: 地域内の店舗とその取扱ブランドを JSONL に出力
//!
//! # 使用例
//!
//! ```rust,ignore
//! use iheartjane_scraper::{Region, ScrapeRequest, ScraperConfig, ScraperService};
//! use tower::Service;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ScraperConfig::new("zyte_api_key", Region::new(34.05, -118.25))
//!         .with_output_dir("./output");
//!
//!     let mut service = ScraperService::new();
//!     let result = service.call(ScrapeRequest::brands(config)).await.unwrap();
//!     println!("written: {}", result.summary.written);
//! }
//! ```

pub mod config;
pub mod error;
pub mod fetch;
pub mod iheartjane;
pub mod logging;
pub mod pool;
pub mod service;
pub mod sink;
pub mod summary;
pub mod traits;

#[cfg(test)]
mod testing;

// 主要な型をリエクスポート
pub use crate::config::{Endpoints, Region, ScraperConfig, DEFAULT_CONFIG_PATH};
pub use crate::error::ScraperError;
pub use crate::fetch::{RawBody, ZyteFetcher};
pub use crate::iheartjane::{BrandPipeline, DispensaryPipeline};
pub use crate::service::{run_cli, Pipeline, ScrapeRequest, ScrapeResult, ScraperService};
pub use crate::sink::JsonlSink;
pub use crate::summary::RunSummary;
pub use crate::traits::Fetcher;
