use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScraperError {
    #[error("HTTP通信エラー: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTPステータスエラー: status={status}, url={url}")]
    Status { status: u16, url: String },

    #[error("抽出サービスのレスポンスに本文がありません: {0}")]
    MissingBody(String),

    #[error("Base64デコードエラー: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("JSONパースエラー: {0}")]
    Json(#[from] serde_json::Error),

    #[error("URLエラー: {0}")]
    Url(#[from] url::ParseError),

    #[error("リトライ上限到達 ({retries}回): {message}")]
    RetriesExhausted { retries: u32, message: String },

    #[error("設定エラー: {0}")]
    Config(#[from] config::ConfigError),

    #[error("証明書エラー: {0}")]
    Certificate(String),

    #[error("ログ初期化エラー: {0}")]
    Logging(String),

    #[error("ファイル操作エラー: {0}")]
    FileIO(#[from] std::io::Error),
}

impl ScraperError {
    /// 同じリクエストを再送する価値があるか
    pub fn is_retryable(&self) -> bool {
        match self {
            ScraperError::MissingBody(_) => true,
            ScraperError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            ScraperError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}
