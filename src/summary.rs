use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

/// 実行中の件数カウンタ (タスク間で共有)
#[derive(Debug, Default)]
pub struct RunStats {
    written: AtomicUsize,
    skipped: AtomicUsize,
}

impl RunStats {
    pub fn record_written(&self) {
        self.written.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skipped(&self, count: usize) {
        self.skipped.fetch_add(count, Ordering::Relaxed);
    }

    pub fn written(&self) -> usize {
        self.written.load(Ordering::Relaxed)
    }

    pub fn skipped(&self) -> usize {
        self.skipped.load(Ordering::Relaxed)
    }
}

/// パイプライン1回分の結果
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub pipeline: &'static str,
    pub written: usize,
    pub skipped: usize,
    pub failed_branches: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunSummary {
    pub fn finish(
        pipeline: &'static str,
        stats: &RunStats,
        failed_branches: usize,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            pipeline,
            written: stats.written(),
            skipped: stats.skipped(),
            failed_branches,
            started_at,
            finished_at: Utc::now(),
        }
    }

    pub fn log(&self) {
        info!(
            pipeline = self.pipeline,
            written = self.written,
            skipped = self.skipped,
            failed_branches = self.failed_branches,
            elapsed_secs = (self.finished_at - self.started_at).num_seconds(),
            "Run finished"
        );
    }
}
