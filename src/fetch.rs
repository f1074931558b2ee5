//! 上流APIの取得レイヤー
//!
//! - GET: 抽出サービスに URL を渡し、Base64 の `httpResponseBody` を受け取る
//! - POST: 同じ API キーでフォワードプロキシを経由し、本文をそのまま受け取る

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use reqwest::{Certificate, Client, Proxy};
use scraper::Html;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::ScraperConfig;
use crate::error::ScraperError;
use crate::traits::Fetcher;

/// デコード済みのレスポンス本文
///
/// 呼び出し側が JSON として読むか HTML として読むかを選ぶ。
#[derive(Debug, Clone, PartialEq)]
pub struct RawBody(Vec<u8>);

impl RawBody {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ScraperError> {
        Ok(serde_json::from_slice(&self.0)?)
    }

    pub fn document(&self) -> Html {
        Html::parse_document(&String::from_utf8_lossy(&self.0))
    }
}

#[derive(Debug, Deserialize)]
struct ExtractResponse {
    #[serde(rename = "httpResponseBody", default)]
    http_response_body: Option<String>,
}

/// Zyte 経由の Fetcher 実装
pub struct ZyteFetcher {
    api_key: String,
    extract_url: String,
    extract_client: Client,
    proxy_client: Client,
    max_attempts: u32,
    backoff: Duration,
}

impl ZyteFetcher {
    pub fn new(config: &ScraperConfig) -> Result<Self, ScraperError> {
        let extract_client = Client::builder().timeout(config.timeout).build()?;

        let mut builder = Client::builder().timeout(config.timeout);
        if let Some(proxy_url) = &config.endpoints.proxy_url {
            builder = builder.proxy(Proxy::all(proxy_url.as_str())?.basic_auth(&config.api_key, ""));
        }

        let ca_path = &config.ca_cert_path;
        if ca_path.exists() {
            let pem = std::fs::read(ca_path)?;
            let cert = Certificate::from_pem(&pem)
                .map_err(|e| ScraperError::Certificate(format!("{}: {}", ca_path.display(), e)))?;
            builder = builder.add_root_certificate(cert);
        } else if config.endpoints.proxy_url.is_some() {
            warn!(path = %ca_path.display(), "Proxy CA certificate not found, using system roots");
        }

        Ok(Self {
            api_key: config.api_key.clone(),
            extract_url: config.endpoints.extract_url.clone(),
            extract_client,
            proxy_client: builder.build()?,
            max_attempts: config.max_attempts.max(1),
            backoff: config.retry_backoff,
        })
    }

    /// 抽出サービスへの1回分のリクエスト
    async fn extract_once(&self, url: &str) -> Result<RawBody, ScraperError> {
        let response = self
            .extract_client
            .post(&self.extract_url)
            .basic_auth(&self.api_key, Some(""))
            .json(&json!({ "url": url, "httpResponseBody": true }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScraperError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let wrapper: ExtractResponse = response.json().await?;
        match wrapper.http_response_body.filter(|body| !body.is_empty()) {
            Some(encoded) => {
                let decoded = base64::engine::general_purpose::STANDARD.decode(encoded)?;
                Ok(RawBody::new(decoded))
            }
            None => Err(ScraperError::MissingBody(url.to_string())),
        }
    }
}

#[async_trait]
impl Fetcher for ZyteFetcher {
    async fn get(&self, url: &str) -> Result<RawBody, ScraperError> {
        let mut last_error = None;

        for attempt in 0..self.max_attempts {
            match self.extract_once(url).await {
                Ok(body) => {
                    debug!(url, bytes = body.as_bytes().len(), "GET succeeded");
                    return Ok(body);
                }
                Err(e) if e.is_retryable() => {
                    if attempt + 1 < self.max_attempts {
                        let backoff = self.backoff.saturating_mul(1 << attempt.min(16));
                        warn!(
                            "GET attempt {} failed, retrying in {:?}: {}",
                            attempt + 1,
                            backoff,
                            e
                        );
                        sleep(backoff).await;
                    }
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(ScraperError::RetriesExhausted {
            retries: self.max_attempts,
            message: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "Max retries exceeded".to_string()),
        })
    }

    async fn post(&self, url: &str, body: String) -> Result<RawBody, ScraperError> {
        let response = self.proxy_client.post(url).body(body).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScraperError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        Ok(RawBody::new(response.bytes().await?.to_vec()))
    }
}
