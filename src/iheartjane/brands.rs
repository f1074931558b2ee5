//! ブランドパイプライン
//!
//! 地域 → 店舗ID → ブランドID (ファセット) → ブランド詳細 + 商品一覧 →
//! 商品ごとの取扱店舗/価格。ブランド1件を1タスクとしてワーカープールに流す。

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

use super::normalize::{
    decode_entity, entity_label, normalize_brand, normalize_product, variants_from_stores,
};
use super::query::{self, MENU_PRODUCTS_INDEX, PRODUCTS_INDEX};
use super::types::{
    BrandResponse, NormalizedBrand, ProductStoresResponse, RawProduct, SearchResponse,
    StoreIdsResponse, Variant,
};

pub struct BrandPipeline {
    ctx: Arc<BrandContext>,
    workers: usize,
}

/// ワーカー間で共有する読み取り専用の文脈
struct BrandContext {
    fetcher: Arc<dyn Fetcher>,
    sink: Arc<JsonlSink>,
    endpoints: Endpoints,
    region: Region,
    stats: RunStats,
}

impl BrandPipeline {
    pub fn new(fetcher: Arc<dyn Fetcher>, sink: Arc<JsonlSink>, config: &ScraperConfig) -> Self {
        Self {
            ctx: Arc::new(BrandContext {
                fetcher,
                sink,
                endpoints: config.endpoints.clone(),
                region: config.region,
                stats: RunStats::default(),
            }),
            workers: config.brand_workers,
        }
    }

    pub async fn run(&self) -> RunSummary {
        let started_at = Utc::now();
        info!(region = %self.ctx.region, "Starting brand scraping process...");

        let brand_ids = self.brand_ids().await;
        info!("Found {} brands", brand_ids.len());

        let ctx = Arc::clone(&self.ctx);
        let report = WorkerPool::new("brands", self.workers)
            .run(brand_ids, move |brand_id| {
                let ctx = Arc::clone(&ctx);
                async move { ctx.process_brand(brand_id).await }
            })
            .await;

        RunSummary::finish("brands", &self.ctx.stats, report.failed, started_at)
    }

    /// 地域内で扱われているブランドID (順序は不定)。失敗時は空
    pub async fn brand_ids(&self) -> Vec<String> {
        self.ctx.brand_ids().await
    }
}

impl BrandContext {
    async fn search(&self, index: &str, payload: String) -> Result<SearchResponse, ScraperError> {
        let url = query::index_query_url(&self.endpoints, index);
        self.fetcher.post(&url, payload).await?.json()
    }

    async fn store_ids(&self) -> Result<StoreIdsResponse, ScraperError> {
        let url = query::store_ids_url(&self.endpoints, self.region)?;
        self.fetcher.get(&url).await?.json()
    }

    async fn brand_ids(&self) -> Vec<String> {
        let store_ids = match self.store_ids().await {
            Ok(response) => response.store_ids,
            Err(e) => {
                error!("Failed to fetch store IDs: {}", e);
                return Vec::new();
            }
        };

        if store_ids.is_empty() {
            warn!(region = %self.region, "No stores found");
            return Vec::new();
        }
        info!("Found {} stores", store_ids.len());

        let payload = query::brand_ids_payload(&store_ids, self.region);
        match self.search(MENU_PRODUCTS_INDEX, payload).await {
            Ok(response) => response.facet_keys("product_brand_id"),
            Err(e) => {
                error!("Failed to fetch brand IDs: {}", e);
                Vec::new()
            }
        }
    }

    async fn fetch_brand(&self, brand_id: &str) -> Result<NormalizedBrand, ScraperError> {
        let url = query::brand_url(&self.endpoints, brand_id);
        let response: BrandResponse = self.fetcher.get(&url).await?.json()?;
        Ok(normalize_brand(&response.brand))
    }

    async fn process_brand(&self, brand_id: String) -> Result<(), ScraperError> {
        let brand = self.fetch_brand(&brand_id).await.map_err(|e| {
            error!(brand_id = %brand_id, "Failed to fetch brand: {}", e);
            e
        })?;
        info!(brand_id = %brand_id, "Processing brand: {}", brand.name);

        let products = self
            .search(PRODUCTS_INDEX, query::brand_products_payload(&brand_id))
            .await
            .map_err(|e| {
                error!(brand_id = %brand_id, "Failed to fetch products for brand: {}", e);
                e
            })?;

        for hit in &products.hits {
            self.process_product(hit, &brand).await;
        }
        Ok(())
    }

    /// 商品1件。失敗してもブランド内の他の商品は続行する
    async fn process_product(&self, hit: &Value, brand: &NormalizedBrand) {
        let raw: RawProduct = match decode_entity(hit) {
            Ok(raw) => raw,
            Err(e) => {
                self.stats.record_skipped(1);
                error!("Failed to parse product {}: {}", entity_label(hit), e);
                return;
            }
        };

        let variants = self.fetch_variants(&raw).await;
        let product = normalize_product(&raw, brand, variants);

        match self.sink.append(&product).await {
            Ok(()) => {
                self.stats.record_written();
                info!("Parsed product: {}", product.name);
            }
            Err(e) => {
                self.stats.record_skipped(1);
                error!("Failed to write product {}: {}", product.name, e);
            }
        }
    }

    async fn load_variants(&self, raw: &RawProduct) -> Result<ProductStoresResponse, ScraperError> {
        let url = query::product_stores_url(&self.endpoints, &raw.object_id, self.region)?;
        self.fetcher.get(&url).await?.json()
    }

    /// 取得に失敗した商品は価格なし (空リスト) で出力する。
    /// 取れなかった店舗と取得失敗は skipped に数える
    async fn fetch_variants(&self, raw: &RawProduct) -> Vec<Variant> {
        match self.load_variants(raw).await {
            Ok(response) => {
                let (variants, skipped) = variants_from_stores(&response.stores);
                if skipped > 0 {
                    self.stats.record_skipped(skipped);
                    warn!(product_id = %raw.object_id, "Skipped {} unparseable stores", skipped);
                }
                variants
            }
            Err(e) => {
                self.stats.record_skipped(1);
                error!("Failed to fetch variants for product {}: {}", raw.object_id, e);
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StubFetcher;
    use serde_json::json;

    fn config() -> ScraperConfig {
        ScraperConfig::new("key", Region::new(40.0, -74.0)).with_workers(2, 2)
    }

    fn product(id: u64, name: &str) -> Value {
        json!({
            "objectID": id,
            "name": name,
            "category": "flower",
            "kind_subtype": "hybrid",
            "aggregate_rating": 4.5,
            "review_count": 10,
            "store_types": ["recreational"],
            "photos": [{ "id": format!("https://img/{}.png", id) }]
        })
    }

    fn one_price(store: &str) -> Value {
        json!({ "stores": [{ "name": store, "percent_thc": 20, "menu_product": { "price_eighth_ounce": 40 } }] })
    }

    fn happy_stub() -> StubFetcher {
        StubFetcher::new()
            .on_get("stores/ids_by_shopping_preferences", json!({ "store_ids": [11, 12] }))
            .on_post(
                "/menu-products-production/",
                "store_id:11 OR store_id:12",
                json!({ "facets": { "product_brand_id": { "77": 2 } } }),
            )
            .on_get(
                "brands/77",
                json!({ "brand": { "name": "Acme", "logo_url": "https://img/logo.png" } }),
            )
            .on_post(
                "/products-production/",
                "brand_id:77",
                json!({ "hits": [product(101, "Blue Dream"), product(102, "Sour Diesel")] }),
            )
            .on_get("products/101/stores", one_price("Store A"))
            .on_get("products/102/stores", one_price("Store B"))
    }

    fn read_lines(path: &std::path::Path) -> Vec<Value> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_brand_pipeline_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("brands.jsonl");
        let sink = Arc::new(JsonlSink::open(&path).await.unwrap());

        let pipeline = BrandPipeline::new(Arc::new(happy_stub()), sink, &config());
        let summary = pipeline.run().await;

        let lines = read_lines(&path);
        assert_eq!(lines.len(), 2);
        for line in &lines {
            assert_eq!(line["brand"]["name"], "Acme");
            assert_eq!(line["variants"].as_array().unwrap().len(), 1);
            assert_eq!(line["variants"][0]["quantity"], 3.5);
            assert_eq!(line["variants"][0]["metrics"]["thc"], "20%");
        }
        let mut names: Vec<_> = lines.iter().map(|l| l["name"].as_str().unwrap()).collect();
        names.sort_unstable();
        assert_eq!(names, vec!["Blue Dream", "Sour Diesel"]);

        assert_eq!(summary.written, 2);
        assert_eq!(summary.skipped, 0);
        assert_eq!(summary.failed_branches, 0);
    }

    #[tokio::test]
    async fn test_bad_product_does_not_block_siblings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("brands.jsonl");
        let sink = Arc::new(JsonlSink::open(&path).await.unwrap());

        let stub = StubFetcher::new()
            .on_get("stores/ids_by_shopping_preferences", json!({ "store_ids": [11] }))
            .on_post(
                "/menu-products-production/",
                "store_id:11",
                json!({ "facets": { "product_brand_id": { "88": 1 } } }),
            )
            .on_get("brands/88", json!({ "brand": { "name": "Bolt" } }))
            .on_post(
                "/products-production/",
                "brand_id:88",
                json!({ "hits": [{ "objectID": 201 }, product(202, "Gelato")] }),
            )
            .fail_get("products/202/stores", 500);

        let summary = BrandPipeline::new(Arc::new(stub), sink, &config()).run().await;

        let lines = read_lines(&path);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["name"], "Gelato");
        assert_eq!(lines[0]["brand"]["name"], "Bolt");
        assert_eq!(lines[0]["variants"], json!([]));
        assert_eq!(summary.written, 1);
        // 名前のない商品と価格取得の失敗
        assert_eq!(summary.skipped, 2);
    }

    #[tokio::test]
    async fn test_dropped_stores_count_as_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("b.jsonl");
        let sink = Arc::new(JsonlSink::open(&path).await.unwrap());
        let stub = StubFetcher::new()
            .on_get("stores/ids_by_shopping_preferences", json!({ "store_ids": [1] }))
            .on_post(
                "/menu-products-production/",
                "store_id:1",
                json!({ "facets": { "product_brand_id": { "3": 1 } } }),
            )
            .on_get("brands/3", json!({ "brand": { "name": "Three" } }))
            .on_post(
                "/products-production/",
                "brand_id:3",
                json!({ "hits": [product(9, "Nine"), product(10, "Ten")] }),
            )
            .on_get(
                "products/9/stores",
                json!({ "stores": [
                    { "name": "no menu" },
                    { "name": "Store", "menu_product": { "price_gram": 12 } }
                ]}),
            )
            .fail_get("products/10/stores", 404);

        let summary = BrandPipeline::new(Arc::new(stub), sink, &config()).run().await;

        assert_eq!(summary.written, 2);
        assert_eq!(summary.skipped, 2);
        assert_eq!(summary.failed_branches, 0);
        let lines = read_lines(&path);
        let nine = lines.iter().find(|l| l["name"] == "Nine").unwrap();
        assert_eq!(nine["variants"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_store_id_failure_yields_no_brands() {
        let dir = tempfile::tempdir().unwrap();
        let sink = Arc::new(JsonlSink::open(dir.path().join("b.jsonl")).await.unwrap());
        let stub = Arc::new(StubFetcher::new().fail_get("stores/ids_by_shopping_preferences", 503));

        let pipeline = BrandPipeline::new(stub.clone(), sink, &config());
        assert!(pipeline.brand_ids().await.is_empty());

        let summary = pipeline.run().await;
        assert_eq!(summary.written, 0);
        assert_eq!(summary.failed_branches, 0);
    }

    #[tokio::test]
    async fn test_empty_store_ids_skip_brand_query() {
        let dir = tempfile::tempdir().unwrap();
        let sink = Arc::new(JsonlSink::open(dir.path().join("b.jsonl")).await.unwrap());
        let stub = Arc::new(
            StubFetcher::new().on_get("stores/ids_by_shopping_preferences", json!({ "store_ids": [] })),
        );

        let pipeline = BrandPipeline::new(stub.clone(), sink, &config());
        assert!(pipeline.brand_ids().await.is_empty());
        assert_eq!(stub.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_brand_counts_as_failed_branch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("b.jsonl");
        let sink = Arc::new(JsonlSink::open(&path).await.unwrap());
        let stub = StubFetcher::new()
            .on_get("stores/ids_by_shopping_preferences", json!({ "store_ids": [1] }))
            .on_post(
                "/menu-products-production/",
                "store_id:1",
                json!({ "facets": { "product_brand_id": { "5": 1, "6": 1 } } }),
            )
            .fail_get("brands/5", 500)
            .on_get("brands/6", json!({ "brand": { "name": "Six" } }))
            .on_post("/products-production/", "brand_id:6", json!({ "hits": [product(9, "Nine")] }))
            .on_get("products/9/stores", one_price("Store"));

        let summary = BrandPipeline::new(Arc::new(stub), sink, &config()).run().await;

        assert_eq!(summary.failed_branches, 1);
        assert_eq!(summary.written, 1);
        assert_eq!(read_lines(&path)[0]["brand"]["name"], "Six");
    }
}
