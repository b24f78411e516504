//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了测试的通用工具函数和设置。

#![allow(dead_code)]

use chrono::{Duration as ChronoDuration, Utc};
use oxdeal::backend::{KvStore, MemoryStore, RedisStore};
use oxdeal::config::{Config, StoreConfig};
use oxdeal::database::{MemoryRepository, SeckillVoucher, VoucherRepository};
use oxdeal::Platform;
use secrecy::SecretString;
use std::sync::{Arc, Once};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

pub fn setup_logging() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_span_events(FmtSpan::CLOSE)
            .with_env_filter(EnvFilter::new("debug"))
            .try_init()
            .ok();
    });
}

/// 测试使用的Redis地址，优先读取环境变量 REDIS_URL
pub fn redis_url() -> String {
    std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string())
}

pub fn redis_config() -> StoreConfig {
    StoreConfig {
        connection_string: SecretString::new(redis_url().into()),
        connection_timeout_ms: 1000,
        ..Default::default()
    }
}

/// 检查Redis是否可用
pub async fn is_redis_available() -> bool {
    match RedisStore::new(&redis_config()).await {
        Ok(store) => store.ping().await.is_ok(),
        Err(_) => false,
    }
}

/// 生成唯一的名称，确保测试之间的隔离
pub fn unique_name(base: &str) -> String {
    format!("{}_{}", base, uuid::Uuid::new_v4().simple())
}

/// 适合测试的配置：较短的空值TTL与较快的重试
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.cache.null_ttl_secs = 1;
    config.cache.lock_ttl_secs = 5;
    config.cache.mutex_retry_interval_ms = 10;
    config.cache.mutex_max_attempts = 500;
    config.seckill.lock_retry_interval_ms = 5;
    config.seckill.lock_max_attempts = 2000;
    config
}

/// 内存存储与内存仓储组成的平台
pub struct MemoryPlatform {
    pub store: Arc<MemoryStore>,
    pub repo: Arc<MemoryRepository>,
    pub platform: Platform,
}

pub fn memory_platform(config: Config) -> MemoryPlatform {
    let store = Arc::new(MemoryStore::new());
    let repo = Arc::new(MemoryRepository::new());
    let platform = Platform::new(config, store.clone(), repo.clone()).expect("valid config");
    MemoryPlatform {
        store,
        repo,
        platform,
    }
}

/// 正在售卖中的秒杀券
pub async fn seed_open_voucher(repo: &dyn VoucherRepository, voucher_id: i64, stock: i64) {
    let now = Utc::now();
    repo.save_voucher(&SeckillVoucher {
        voucher_id,
        stock,
        begin_time: now - ChronoDuration::hours(1),
        end_time: now + ChronoDuration::hours(1),
    })
    .await
    .expect("seed voucher");
}
