//! ディスペンサリーパイプライン
//!
//! 地域 → 半径内の店舗一覧 → 店舗ごとに詳細の正規化 + ブランドファセット。
//! 店舗1件を1タスクとしてワーカープールに流す。

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tracing::{error, info, warn};

use crate::config::{Endpoints, Region, ScraperConfig};
use crate::error::ScraperError;
use crate::pool::WorkerPool;
use crate::sink::JsonlSink;
use crate::summary::{RunStats, RunSummary};
use crate::traits::Fetcher;

use super::normalize::{decode_entity, entity_label, normalize_dispensary};
use super::query::{self, MENU_PRODUCTS_INDEX, STORES_INDEX};
use super::types::{RawDispensary, Scalar, SearchResponse};

pub struct DispensaryPipeline {
    ctx: Arc<DispensaryContext>,
    workers: usize,
}

struct DispensaryContext {
    fetcher: Arc<dyn Fetcher>,
    sink: Arc<JsonlSink>,
    endpoints: Endpoints,
    region: Region,
    stats: RunStats,
}

impl DispensaryPipeline {
    pub fn new(fetcher: Arc<dyn Fetcher>, sink: Arc<JsonlSink>, config: &ScraperConfig) -> Self {
        Self {
            ctx: Arc::new(DispensaryContext {
                fetcher,
                sink,
                endpoints: config.endpoints.clone(),
                region: config.region,
                stats: RunStats::default(),
            }),
            workers: config.dispensary_workers,
        }
    }

    pub async fn run(&self) -> RunSummary {
        let started_at = Utc::now();
        info!(region = %self.ctx.region, "Starting dispensary scraper");

        let hits = match self.ctx.dispensaries().await {
            Ok(hits) => hits,
            Err(e) => {
                error!("Error in dispensary scraper: {}", e);
                return RunSummary::finish("dispensaries", &self.ctx.stats, 0, started_at);
            }
        };
        info!("Found {} dispensaries", hits.len());

        let ctx = Arc::clone(&self.ctx);
        let report = WorkerPool::new("dispensaries", self.workers)
            .run(hits, move |hit| {
                let ctx = Arc::clone(&ctx);
                async move { ctx.process_dispensary(hit).await }
            })
            .await;

        RunSummary::finish("dispensaries", &self.ctx.stats, report.failed, started_at)
    }
}

impl DispensaryContext {
    async fn search(&self, index: &str, payload: String) -> Result<SearchResponse, ScraperError> {
        let url = query::index_query_url(&self.endpoints, index);
        self.fetcher.post(&url, payload).await?.json()
    }

    async fn dispensaries(&self) -> Result<Vec<Value>, ScraperError> {
        let response = self
            .search(STORES_INDEX, query::dispensaries_payload(self.region))
            .await?;
        Ok(response.hits)
    }

    /// 店舗で扱われているブランド名。失敗時は空で、skipped に数える
    async fn store_brands(&self, store_id: &Scalar) -> Vec<String> {
        match self
            .search(MENU_PRODUCTS_INDEX, query::store_brands_payload(store_id))
            .await
        {
            Ok(response) => response.facet_keys("brand"),
            Err(e) => {
                self.stats.record_skipped(1);
                error!("Error fetching brands for store {}: {}", store_id, e);
                Vec::new()
            }
        }
    }

    async fn process_dispensary(&self, hit: Value) -> Result<(), ScraperError> {
        let raw: RawDispensary = match decode_entity(&hit) {
            Ok(raw) => raw,
            Err(e) => {
                self.stats.record_skipped(1);
                error!("Error parsing dispensary {}: {}", entity_label(&hit), e);
                return Ok(());
            }
        };

        let brands = match &raw.object_id {
            Some(store_id) => self.store_brands(store_id).await,
            None => {
                warn!("Dispensary {} has no objectID, skipping brand lookup", raw.name);
                Vec::new()
            }
        };

        let dispensary = normalize_dispensary(&raw, brands);
        self.sink.append(&dispensary).await.map_err(|e| {
            error!("Error writing dispensary {}: {}", dispensary.name, e);
            e
        })?;

        self.stats.record_written();
        info!("Parsed dispensary: {}", dispensary.name);
        Ok(())
    }
}
