use std::path::Path;

use serde::Serialize;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::ScraperError;

/// 1行1レコードの追記専用 JSONL 出力
///
/// シリアライズはロック外で行い、ロックは完成した1行の書き込みだけを守る。
#[derive(Debug)]
pub struct JsonlSink {
    file: Mutex<File>,
}

impl JsonlSink {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, ScraperError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;

        Ok(Self {
            file: Mutex::new(file),
        })
    }

    pub async fn append<T: Serialize>(&self, record: &T) -> Result<(), ScraperError> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let mut file = self.file.lock().await;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_append_creates_and_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.jsonl");

        {
            let sink = JsonlSink::open(&path).await.unwrap();
            sink.append(&json!({ "name": "a" })).await.unwrap();
        }
        let sink = JsonlSink::open(&path).await.unwrap();
        sink.append(&json!({ "name": "b" })).await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "{\"name\":\"a\"}\n{\"name\":\"b\"}\n");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_writers_do_not_interleave() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("concurrent.jsonl");
        let sink = Arc::new(JsonlSink::open(&path).await.unwrap());

        let writers = 64;
        let padding = "x".repeat(8192);
        let handles: Vec<_> = (0..writers)
            .map(|i| {
                let sink = Arc::clone(&sink);
                let padding = padding.clone();
                tokio::spawn(async move {
                    sink.append(&json!({ "writer": i, "padding": padding }))
                        .await
                        .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        let content = std::fs::read_to_string(&path).unwrap();
        let mut seen: Vec<u64> = content
            .lines()
            .map(|line| {
                let value: serde_json::Value = serde_json::from_str(line).unwrap();
                value["writer"].as_u64().unwrap()
            })
            .collect();
        seen.sort_unstable();

        assert_eq!(seen, (0..writers as u64).collect::<Vec<_>>());
    }
}
