use async_trait::async_trait;

use crate::error::ScraperError;
use crate::fetch::RawBody;

/// 上流APIへの取得経路
///
/// パイプラインはこのトレイト越しにのみ通信するので、テストでは
/// インメモリ実装に差し替えられる。
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// GET (抽出サービス経由)
    async fn get(&self, url: &str) -> Result<RawBody, ScraperError>;

    /// POST (フォワードプロキシ経由)。本文はそのまま送る
    async fn post(&self, url: &str, body: String) -> Result<RawBody, ScraperError>;
}
