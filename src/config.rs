use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::ScraperError;

/// バイナリが読む設定ファイル
pub const DEFAULT_CONFIG_PATH: &str = "config.ini";

/// 検索の中心座標
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Region {
    pub latitude: f64,
    pub longitude: f64,
}

impl Region {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// `aroundLatLng` の書式 ("lat, long")
impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.latitude, self.longitude)
    }
}

/// 接続先URL一式 (テストではモックサーバーに差し替える)
#[derive(Debug, Clone)]
pub struct Endpoints {
    /// 抽出サービス (GET経路)
    pub extract_url: String,
    /// フォワードプロキシ (POST経路)。None なら直接接続
    pub proxy_url: Option<String>,
    /// 検索インデックスのベースURL
    pub search_base: String,
    /// REST API のベースURL
    pub api_base: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            extract_url: "https://api.zyte.com/v1/extract".to_string(),
            proxy_url: Some("http://api.zyte.com:8011".to_string()),
            search_base: "https://search.iheartjane.com/1/indexes".to_string(),
            api_base: "https://www.iheartjane.com/api/v1".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScraperConfig {
    pub api_key: String,
    pub region: Region,
    pub output_dir: PathBuf,
    pub log_dir: PathBuf,
    /// プロキシのCA証明書。存在しなければシステムのルートのみ使う
    pub ca_cert_path: PathBuf,
    pub timeout: Duration,
    /// GET経路の最大試行回数 (初回を含む)
    pub max_attempts: u32,
    pub retry_backoff: Duration,
    pub brand_workers: usize,
    pub dispensary_workers: usize,
    pub endpoints: Endpoints,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            region: Region::new(0.0, 0.0),
            output_dir: PathBuf::from("."),
            log_dir: PathBuf::from("."),
            ca_cert_path: PathBuf::from("zyte-ca.crt"),
            timeout: Duration::from_secs(60),
            max_attempts: 3,
            retry_backoff: Duration::from_millis(1000),
            brand_workers: 10,
            dispensary_workers: 15,
            endpoints: Endpoints::default(),
        }
    }
}

/// config.ini の `[settings]` セクション
#[derive(Debug, Deserialize)]
struct ConfigFile {
    settings: FileSettings,
}

#[derive(Debug, Deserialize)]
struct FileSettings {
    #[serde(alias = "ZYTE_API_KEY")]
    zyte_api_key: String,
    latitude: f64,
    longitude: f64,
    output_dir: Option<PathBuf>,
    log_dir: Option<PathBuf>,
    ca_cert: Option<PathBuf>,
    timeout_secs: Option<u64>,
    max_attempts: Option<u32>,
    brand_workers: Option<usize>,
    dispensary_workers: Option<usize>,
}

impl ScraperConfig {
    pub fn new(api_key: impl Into<String>, region: Region) -> Self {
        Self {
            api_key: api_key.into(),
            region,
            ..Default::default()
        }
    }

    /// INIファイルを読み込む。`IHEARTJANE_SETTINGS__<KEY>` 環境変数で上書き可能
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ScraperError> {
        let settings = config::Config::builder()
            .add_source(config::File::new(
                &path.as_ref().to_string_lossy(),
                config::FileFormat::Ini,
            ))
            .add_source(
                config::Environment::with_prefix("IHEARTJANE")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?
            .try_deserialize::<ConfigFile>()?
            .settings;

        let defaults = Self::default();
        Ok(Self {
            api_key: settings.zyte_api_key.trim().to_string(),
            region: Region::new(settings.latitude, settings.longitude),
            output_dir: settings.output_dir.unwrap_or(defaults.output_dir),
            log_dir: settings.log_dir.unwrap_or(defaults.log_dir),
            ca_cert_path: settings.ca_cert.unwrap_or(defaults.ca_cert_path),
            timeout: settings
                .timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            max_attempts: settings.max_attempts.unwrap_or(defaults.max_attempts).max(1),
            brand_workers: settings.brand_workers.unwrap_or(defaults.brand_workers).max(1),
            dispensary_workers: settings
                .dispensary_workers
                .unwrap_or(defaults.dispensary_workers)
                .max(1),
            ..defaults
        })
    }

    pub fn with_output_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_dir = path.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, max_attempts: u32, backoff: Duration) -> Self {
        self.max_attempts = max_attempts.max(1);
        self.retry_backoff = backoff;
        self
    }

    pub fn with_workers(mut self, brand_workers: usize, dispensary_workers: usize) -> Self {
        self.brand_workers = brand_workers.max(1);
        self.dispensary_workers = dispensary_workers.max(1);
        self
    }

    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }
}
