//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了缓存读策略的结果计数。

use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::trace;

/// 读策略名称
pub mod strategy {
    pub const PASS_THROUGH: &str = "pass_through";
    pub const MUTEX: &str = "mutex";
    pub const LOGICAL_EXPIRE: &str = "logical_expire";
}

/// 读结果名称
pub mod outcome {
    pub const HIT: &str = "hit";
    pub const NEGATIVE_HIT: &str = "negative_hit";
    pub const MISS: &str = "miss";
    pub const STALE: &str = "stale";
    pub const CONTENDED: &str = "contended";
    pub const REBUILD_SUBMITTED: &str = "rebuild_submitted";
    pub const REBUILD_FAILED: &str = "rebuild_failed";
    pub const LOADER_CALL: &str = "loader_call";
}

/// 缓存指标
///
/// 由组件显式持有并注入，键格式为 `"{strategy}:{outcome}"`。
#[derive(Clone, Debug, Default)]
pub struct CacheMetrics {
    counters: Arc<DashMap<String, AtomicU64>>,
}

impl CacheMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录一次读结果
    pub fn record(&self, strategy: &str, outcome: &str) {
        let key = format!("{}:{}", strategy, outcome);
        trace!("cache metric {}", key);
        self.counters
            .entry(key)
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self, strategy: &str, outcome: &str) -> u64 {
        self.counters
            .get(&format!("{}:{}", strategy, outcome))
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// 按键排序的全部计数
    pub fn snapshot(&self) -> BTreeMap<String, u64> {
        self.counters
            .iter()
            .map(|e| (e.key().clone(), e.value().load(Ordering::Relaxed)))
            .collect()
    }

    /// 以文本格式输出全部计数，用于监控系统采集
    pub fn render(&self) -> String {
        let mut output = String::new();
        for (key, value) in self.snapshot() {
            let (strategy, outcome) = key.split_once(':').unwrap_or((key.as_str(), ""));
            output.push_str(&format!(
                "cache_reads_total{{strategy=\"{}\", outcome=\"{}\"}} {}\n",
                strategy, outcome, value
            ));
        }
        output
    }
}
