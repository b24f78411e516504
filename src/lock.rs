//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了基于共享键值存储的分布式互斥锁。
//!
//! 锁只是存储中的一个键：键存在即被独占，键不存在即空闲。键的值是持有者标识，
//! 释放时通过原子的比较后删除保证只删除自己持有的锁，即使持有者在TTL过期后才执行释放。

use crate::backend::KvStore;
use crate::error::Result;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// 锁键前缀
pub const LOCK_KEY_PREFIX: &str = "lock:";

/// 锁持有者标识
///
/// 由调用方显式传入获取与释放操作，不依赖线程身份。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LockOwner(String);

impl LockOwner {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LockOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 分布式锁
///
/// 每个实例在创建时生成一个进程级标识，`owner()` 在其后拼接递增序号，
/// 得到"进程 + 任务"粒度的持有者标识。
#[derive(Clone)]
pub struct DistributedLock {
    store: Arc<dyn KvStore>,
    instance_id: Arc<str>,
    sequence: Arc<AtomicU64>,
}

impl fmt::Debug for DistributedLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DistributedLock")
            .field("instance_id", &self.instance_id)
            .finish()
    }
}

impl DistributedLock {
    /// 创建分布式锁，进程标识随机生成
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self::with_instance_id(store, uuid::Uuid::new_v4().simple().to_string())
    }

    /// 使用指定的进程标识创建分布式锁
    pub fn with_instance_id(store: Arc<dyn KvStore>, instance_id: impl Into<String>) -> Self {
        let instance_id: String = instance_id.into();
        Self {
            store,
            instance_id: Arc::from(instance_id),
            sequence: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// 生成新的持有者标识
    pub fn owner(&self) -> LockOwner {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        LockOwner(format!("{}-{}", self.instance_id, seq))
    }

    /// 资源对应的锁键
    pub fn lock_key(resource: &str) -> String {
        format!("{}{}", LOCK_KEY_PREFIX, resource)
    }

    /// 尝试获取锁
    ///
    /// 只执行一次 set-if-absent，从不阻塞或重试，重试策略由调用方决定。
    /// 返回 false 表示锁被他人持有，这是正常结果而非错误。
    ///
    /// # 参数
    ///
    /// * `resource` - 资源名称
    /// * `owner` - 持有者标识
    /// * `ttl` - 锁的过期时间，持有者崩溃时锁也会在此之后自动释放
    #[instrument(skip(self, owner), level = "debug", fields(owner = %owner))]
    pub async fn try_acquire(
        &self,
        resource: &str,
        owner: &LockOwner,
        ttl: Duration,
    ) -> Result<bool> {
        let key = Self::lock_key(resource);
        let acquired = self.store.set_nx(&key, owner.as_str(), ttl).await?;
        debug!("Lock acquisition: key={}, acquired={}", key, acquired);
        Ok(acquired)
    }

    /// 释放锁
    ///
    /// 原子地比较持有者标识后删除。锁已过期并被他人获取时返回 false，且不会影响新持有者。
    #[instrument(skip(self, owner), level = "debug", fields(owner = %owner))]
    pub async fn release(&self, resource: &str, owner: &LockOwner) -> Result<bool> {
        let key = Self::lock_key(resource);
        let released = self.store.compare_and_delete(&key, owner.as_str()).await?;
        if !released {
            warn!(
                "Lock {} was not held by {} at release time (expired or taken over)",
                key, owner
            );
        }
        Ok(released)
    }

    /// 查询锁的当前持有者
    pub async fn holder(&self, resource: &str) -> Result<Option<LockOwner>> {
        Ok(self
            .store
            .get(&Self::lock_key(resource))
            .await?
            .map(LockOwner))
    }
}
