//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了共享键值存储的接口及其实现，包括Redis后端和单进程内存后端。

pub mod memory;
pub mod redis_provider;
pub mod redis_store;

use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

pub use self::memory::MemoryStore;
pub use self::redis_store::RedisStore;

/// 共享键值存储特征
///
/// 锁、计数器和缓存数据都保存在这里，它是跨进程唯一的共享可变状态。
/// 所有原子性要求（set-if-absent、自增、比较后删除）都由实现方在服务端保证。
#[async_trait]
pub trait KvStore: Send + Sync {
    /// 读取文本值，键不存在时返回 None
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// 写入文本值，`ttl` 为 None 时永不过期
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()>;

    /// 仅当键不存在时写入，返回是否写入成功
    async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> Result<bool>;

    /// 删除键，返回键是否存在
    async fn delete(&self, key: &str) -> Result<bool>;

    /// 原子自增，键不存在时从0开始
    async fn incr(&self, key: &str) -> Result<i64>;

    /// 批量写入哈希字段
    async fn hset_all(&self, key: &str, fields: &[(String, String)]) -> Result<()>;

    /// 读取全部哈希字段，键不存在时返回空表
    async fn hget_all(&self, key: &str) -> Result<HashMap<String, String>>;

    /// 设置过期时间，返回键是否存在
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool>;

    /// 原子地比较并删除：仅当键的值等于 `expected` 时删除
    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool>;

    /// 检查连接是否正常
    async fn ping(&self) -> Result<()>;
}
