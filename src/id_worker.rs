//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了基于共享存储自增计数器的分布式ID生成器。
//!
//! ID布局（64位）：高32位为距基准时间的秒数，低32位为当天该业务键的序号。

use crate::backend::KvStore;
use crate::config::IdConfig;
use crate::error::{DealError, Result};
use chrono::{DateTime, TimeZone, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// 序号位数
pub const SEQUENCE_BITS: u32 = 32;

const SEQUENCE_MASK: i64 = (1 << SEQUENCE_BITS) - 1;

/// 分布式ID生成器
///
/// 跨进程唯一的共享状态只有存储中的每日计数器，无需其他协调。
#[derive(Clone)]
pub struct IdGenerator {
    store: Arc<dyn KvStore>,
    epoch_base: i64,
    key_prefix: String,
    counter_ttl: Option<Duration>,
}

impl std::fmt::Debug for IdGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdGenerator")
            .field("epoch_base", &self.epoch_base)
            .field("key_prefix", &self.key_prefix)
            .finish()
    }
}

impl IdGenerator {
    pub fn new(store: Arc<dyn KvStore>, config: &IdConfig) -> Self {
        Self {
            store,
            epoch_base: config.epoch_base,
            key_prefix: config.key_prefix.clone(),
            counter_ttl: (config.counter_ttl_secs > 0)
                .then(|| Duration::from_secs(config.counter_ttl_secs)),
        }
    }

    /// 生成下一个ID
    ///
    /// 在同一业务键、同一UTC日期内严格递增。
    #[instrument(skip(self), level = "debug")]
    pub async fn next_id(&self, business_key: &str) -> Result<i64> {
        self.next_id_at(business_key, Utc::now()).await
    }

    /// 以指定时刻生成ID
    pub async fn next_id_at(&self, business_key: &str, now: DateTime<Utc>) -> Result<i64> {
        let elapsed = now.timestamp() - self.epoch_base;
        if elapsed < 0 {
            return Err(DealError::IdGeneration(format!(
                "clock {} is before the epoch base {}",
                now, self.epoch_base
            )));
        }
        if elapsed > i64::from(i32::MAX) {
            return Err(DealError::IdGeneration(format!(
                "{} seconds since the epoch base exceed the timestamp bits",
                elapsed
            )));
        }

        let counter_key = self.counter_key(business_key, now);
        let sequence = self.store.incr(&counter_key).await?;
        if sequence == 1 {
            if let Some(ttl) = self.counter_ttl {
                // 序号已被占用，过期设置失败不影响本次ID
                if let Err(e) = self.store.expire(&counter_key, ttl).await {
                    warn!("Failed to set TTL on {}: {}", counter_key, e);
                }
            }
        }
        if !(1..=SEQUENCE_MASK).contains(&sequence) {
            return Err(DealError::IdGeneration(format!(
                "sequence {} for '{}' is outside the 32-bit range",
                sequence, counter_key
            )));
        }

        let id = (elapsed << SEQUENCE_BITS) | sequence;
        debug!(
            "Allocated id={} key={} elapsed={} sequence={}",
            id, counter_key, elapsed, sequence
        );
        Ok(id)
    }

    /// 当天计数器的存储键，例如 `seq:order:2026-10-15`
    pub fn counter_key(&self, business_key: &str, now: DateTime<Utc>) -> String {
        format!(
            "{}:{}:{}",
            self.key_prefix,
            business_key,
            now.format("%Y-%m-%d")
        )
    }

    /// 拆分ID为（距基准秒数，序号）
    pub fn decompose(id: i64) -> (i64, i64) {
        (id >> SEQUENCE_BITS, id & SEQUENCE_MASK)
    }

    /// ID中时间戳部分对应的时刻
    pub fn timestamp_of(&self, id: i64) -> Option<DateTime<Utc>> {
        let (elapsed, _) = Self::decompose(id);
        Utc.timestamp_opt(self.epoch_base + elapsed, 0).single()
    }
}
