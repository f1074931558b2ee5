use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::process::ExitCode;
use std::sync::Arc;
use std::task::{Context, Poll};

use tower::Service;
use tracing::{error, info};

use crate::config::ScraperConfig;
use crate::error::ScraperError;
use crate::fetch::ZyteFetcher;
use crate::iheartjane::{BrandPipeline, DispensaryPipeline};
use crate::logging;
use crate::sink::JsonlSink;
use crate::summary::RunSummary;
use crate::traits::Fetcher;

/// 実行するパイプライン
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pipeline {
    Brands,
    Dispensaries,
}

impl Pipeline {
    pub fn name(self) -> &'static str {
        match self {
            Pipeline::Brands => "brands",
            Pipeline::Dispensaries => "dispensaries",
        }
    }

    pub fn output_file_name(self) -> &'static str {
        match self {
            Pipeline::Brands => "iheartjane_brands.jsonl",
            Pipeline::Dispensaries => "iheartjane_dispensary.jsonl",
        }
    }

    pub fn log_file_name(self) -> &'static str {
        match self {
            Pipeline::Brands => "iheartjane_brands.log",
            Pipeline::Dispensaries => "iheartjane_dispensaries.log",
        }
    }
}

/// スクレイピングリクエスト
#[derive(Debug, Clone)]
pub struct ScrapeRequest {
    pub pipeline: Pipeline,
    pub config: ScraperConfig,
}

impl ScrapeRequest {
    pub fn new(pipeline: Pipeline, config: ScraperConfig) -> Self {
        Self { pipeline, config }
    }

    pub fn brands(config: ScraperConfig) -> Self {
        Self::new(Pipeline::Brands, config)
    }

    pub fn dispensaries(config: ScraperConfig) -> Self {
        Self::new(Pipeline::Dispensaries, config)
    }

    pub fn output_path(&self) -> PathBuf {
        self.config.output_dir.join(self.pipeline.output_file_name())
    }
}

/// スクレイピング結果
#[derive(Debug, Clone)]
pub struct ScrapeResult {
    pub output_path: PathBuf,
    pub summary: RunSummary,
}

/// tower::Serviceを実装したスクレイパーサービス
///
/// Fetcher を指定しなければリクエストの設定から ZyteFetcher を作る。
#[derive(Clone, Default)]
pub struct ScraperService {
    fetcher: Option<Arc<dyn Fetcher>>,
}

impl fmt::Debug for ScraperService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScraperService")
            .field("custom_fetcher", &self.fetcher.is_some())
            .finish()
    }
}

impl ScraperService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fetcher(fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            fetcher: Some(fetcher),
        }
    }
}

impl Service<ScrapeRequest> for ScraperService {
    type Response = ScrapeResult;
    type Error = ScraperError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: ScrapeRequest) -> Self::Future {
        info!(
            pipeline = req.pipeline.name(),
            region = %req.config.region,
            "Scrape request received"
        );
        let fetcher = self.fetcher.clone();

        Box::pin(async move {
            let fetcher: Arc<dyn Fetcher> = match fetcher {
                Some(fetcher) => fetcher,
                None => Arc::new(ZyteFetcher::new(&req.config)?),
            };

            let output_path = req.output_path();
            let sink = Arc::new(JsonlSink::open(&output_path).await?);

            let summary = match req.pipeline {
                Pipeline::Brands => BrandPipeline::new(fetcher, sink, &req.config).run().await,
                Pipeline::Dispensaries => {
                    DispensaryPipeline::new(fetcher, sink, &req.config).run().await
                }
            };

            info!(
                "Scrape finished: path={:?}, written={}",
                output_path, summary.written
            );

            Ok(ScrapeResult {
                output_path,
                summary,
            })
        })
    }
}

/// バイナリ共通の実行手順: 設定読み込み → ログ初期化 → パイプライン実行
pub async fn run_cli(pipeline: Pipeline, config_path: impl AsRef<Path>) -> ExitCode {
    let config = match ScraperConfig::load(config_path.as_ref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("設定の読み込みに失敗しました ({}): {}", config_path.as_ref().display(), e);
            return ExitCode::FAILURE;
        }
    };

    let _guard = match logging::init(&config.log_dir, pipeline.log_file_name()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let mut service = ScraperService::new();
    match service.call(ScrapeRequest::new(pipeline, config)).await {
        Ok(result) => {
            result.summary.log();
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(pipeline = pipeline.name(), "Scrape failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Region;
    use crate::testing::StubFetcher;
    use serde_json::json;

    #[test]
    fn test_scrape_request_output_path() {
        let config = ScraperConfig::new("key", Region::new(1.0, 2.0)).with_output_dir("/tmp/jane");

        assert_eq!(
            ScrapeRequest::brands(config.clone()).output_path(),
            PathBuf::from("/tmp/jane/iheartjane_brands.jsonl")
        );
        assert_eq!(
            ScrapeRequest::dispensaries(config).output_path(),
            PathBuf::from("/tmp/jane/iheartjane_dispensary.jsonl")
        );
    }

    #[tokio::test]
    async fn test_service_runs_dispensary_pipeline() {
        let dir = tempfile::tempdir().unwrap();
        let config = ScraperConfig::new("key", Region::new(1.0, 2.0)).with_output_dir(dir.path());
        let stub = StubFetcher::new().on_post(
            "/stores-production/",
            "marketplace_visible",
            json!({ "hits": [{ "objectID": "1", "name": "Only Shop", "recreational": true }] }),
        );

        let mut service = ScraperService::with_fetcher(Arc::new(stub));
        let result = service
            .call(ScrapeRequest::dispensaries(config))
            .await
            .unwrap();

        assert_eq!(result.summary.pipeline, "dispensaries");
        assert_eq!(result.summary.written, 1);
        let content = std::fs::read_to_string(&result.output_path).unwrap();
        assert!(content.contains("\"license_type\":\"Recreational\""));
    }
}
