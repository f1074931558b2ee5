use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::future::join_all;
use futures::FutureExt;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error};

use crate::error::ScraperError;

/// 固定数のワーカーと有界チャネルによるタスクプール
///
/// 1タスク = 1ブランチ (ブランド1件、ディスペンサリー1件)。タスク内の
/// 取得は逐次で、タスク間の順序は保証しない。
#[derive(Debug, Clone)]
pub struct WorkerPool {
    name: &'static str,
    workers: usize,
}

/// プール実行結果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolReport {
    pub submitted: usize,
    pub failed: usize,
}

impl WorkerPool {
    pub fn new(name: &'static str, workers: usize) -> Self {
        Self {
            name,
            workers: workers.max(1),
        }
    }

    /// 全アイテムを処理し終えるまで待つ。タスクのエラーとパニックは
    /// ログに記録して数えるだけで、他のタスクには波及しない。
    pub async fn run<I, T, F, Fut>(&self, items: I, handler: F) -> PoolReport
    where
        I: IntoIterator<Item = T>,
        I::IntoIter: Send,
        T: Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), ScraperError>> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel::<T>(self.workers);
        let rx = Arc::new(Mutex::new(rx));
        let handler = Arc::new(handler);
        let failed = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..self.workers)
            .map(|worker_id| {
                let rx = Arc::clone(&rx);
                let handler = Arc::clone(&handler);
                let failed = Arc::clone(&failed);
                let name = self.name;

                tokio::spawn(async move {
                    loop {
                        let item = rx.lock().await.recv().await;
                        let Some(item) = item else { break };

                        match AssertUnwindSafe(handler(item)).catch_unwind().await {
                            Ok(Ok(())) => {}
                            Ok(Err(e)) => {
                                failed.fetch_add(1, Ordering::Relaxed);
                                error!(pool = name, worker = worker_id, "Task failed: {}", e);
                            }
                            Err(_) => {
                                failed.fetch_add(1, Ordering::Relaxed);
                                error!(pool = name, worker = worker_id, "Task panicked");
                            }
                        }
                    }
                    debug!(pool = name, worker = worker_id, "Worker finished");
                })
            })
            .collect();

        let mut submitted = 0;
        for item in items {
            if tx.send(item).await.is_err() {
                error!(pool = self.name, "All workers stopped, dropping remaining tasks");
                break;
            }
            submitted += 1;
        }
        drop(tx);

        for result in join_all(handles).await {
            if let Err(e) = result {
                error!(pool = self.name, "Worker join failed: {}", e);
            }
        }

        PoolReport {
            submitted,
            failed: failed.load(Ordering::Relaxed),
        }
    }
}
