use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::error::ScraperError;

/// コンソールとログファイルの両方に出力する
///
/// ファイル書き込みは専用スレッドで行うので、遅いディスクが出力シンクの
/// 書き込みを止めることはない。返り値のガードは実行終了まで保持すること。
pub fn init(log_dir: &Path, file_name: &str) -> Result<WorkerGuard, ScraperError> {
    std::fs::create_dir_all(log_dir)?;

    let appender = tracing_appender::rolling::never(log_dir, file_name);
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_thread_names(true))
        .with(fmt::layer().with_ansi(false).with_writer(file_writer))
        .try_init()
        .map_err(|e| ScraperError::Logging(e.to_string()))?;

    Ok(guard)
}
