//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了旁路缓存客户端及其三种读策略：
//!
//! - 透传读（`get_with_pass_through`）：缓存负结果，防止缓存穿透
//! - 互斥读（`get_with_mutex`）：同一键同时只允许一个重建，防止缓存击穿
//! - 逻辑过期读（`get_with_logical_expire`）：过期后返回旧值并异步重建，调用方从不阻塞

pub mod entry;
pub mod rebuild;

pub use entry::{Cached, LogicalEntry, NULL_MARKER};
pub use rebuild::RebuildExecutor;

use crate::backend::KvStore;
use crate::config::CacheConfig;
use crate::error::{DealError, Result};
use crate::lock::{DistributedLock, LockOwner};
use crate::metrics::{outcome, strategy, CacheMetrics};
use crate::serialization::{Serializer, SerializerEnum};
use chrono::Utc;
use entry::is_null_marker;
use futures::FutureExt;
use serde::{de::DeserializeOwned, Serialize};
use std::fmt::Display;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, instrument, warn};

/// 旁路缓存客户端
///
/// 所有组件在进程启动时显式构造并注入，客户端自身可廉价克隆。
#[derive(Clone)]
pub struct CacheClient {
    store: Arc<dyn KvStore>,
    lock: DistributedLock,
    executor: Arc<RebuildExecutor>,
    serializer: SerializerEnum,
    metrics: CacheMetrics,
    null_ttl: Duration,
    lock_ttl: Duration,
    retry_interval: Duration,
    max_attempts: u32,
}

impl std::fmt::Debug for CacheClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheClient")
            .field("null_ttl", &self.null_ttl)
            .field("lock_ttl", &self.lock_ttl)
            .field("retry_interval", &self.retry_interval)
            .field("max_attempts", &self.max_attempts)
            .finish()
    }
}

impl CacheClient {
    pub fn new(
        store: Arc<dyn KvStore>,
        lock: DistributedLock,
        executor: Arc<RebuildExecutor>,
        config: &CacheConfig,
    ) -> Self {
        Self {
            store,
            lock,
            executor,
            serializer: SerializerEnum::default(),
            metrics: CacheMetrics::new(),
            null_ttl: config.null_ttl(),
            lock_ttl: config.lock_ttl(),
            retry_interval: config.mutex_retry_interval(),
            max_attempts: config.mutex_max_attempts.max(1),
        }
    }

    pub fn metrics(&self) -> &CacheMetrics {
        &self.metrics
    }

    pub fn store(&self) -> &Arc<dyn KvStore> {
        &self.store
    }

    pub fn executor(&self) -> &Arc<RebuildExecutor> {
        &self.executor
    }

    /// 写入普通条目，由存储层负责过期
    #[instrument(skip(self, value), level = "debug")]
    pub async fn set<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> Result<()> {
        let text = self.serializer.serialize(value)?;
        self.store.set(key, &text, Some(ttl)).await
    }

    /// 写入逻辑过期条目，存储层不设TTL
    #[instrument(skip(self, value), level = "debug")]
    pub async fn set_with_logical_expire<T: Serialize>(
        &self,
        key: &str,
        value: T,
        ttl: Duration,
    ) -> Result<()> {
        write_logical(self.store.as_ref(), &self.serializer, key, value, ttl).await
    }

    /// 删除缓存条目
    #[instrument(skip(self), level = "debug")]
    pub async fn invalidate(&self, key: &str) -> Result<bool> {
        self.store.delete(key).await
    }

    /// 读取普通条目
    pub async fn read_plain<T: DeserializeOwned>(&self, key: &str) -> Result<Cached<T>> {
        match self.store.get(key).await? {
            None => Ok(Cached::Miss),
            Some(raw) if is_null_marker(&raw) => Ok(Cached::Negative),
            Some(raw) => Ok(Cached::Hit(self.serializer.deserialize(&raw)?)),
        }
    }

    /// 读取逻辑过期条目，不判断是否过期
    pub async fn read_logical<T: DeserializeOwned>(
        &self,
        key: &str,
    ) -> Result<Option<LogicalEntry<T>>> {
        match self.store.get(key).await? {
            Some(raw) if !is_null_marker(&raw) => Ok(Some(self.serializer.deserialize(&raw)?)),
            _ => Ok(None),
        }
    }

    /// 透传读
    ///
    /// 未命中时调用 `loader`；数据源中不存在时写入负缓存标记（TTL为 `null_ttl_secs`），
    /// 在标记过期前的重复读取不再调用 `loader`。并发未命中时允许多次调用 `loader`。
    #[instrument(skip(self, id, loader), level = "debug", fields(id = %id))]
    pub async fn get_with_pass_through<ID, T, F, Fut>(
        &self,
        key_prefix: &str,
        id: ID,
        loader: F,
        ttl: Duration,
    ) -> Result<Option<T>>
    where
        ID: Display,
        T: Serialize + DeserializeOwned,
        F: FnOnce(ID) -> Fut,
        Fut: Future<Output = Result<Option<T>>>,
    {
        let key = format!("{}{}", key_prefix, id);
        match self.read_plain(&key).await? {
            Cached::Hit(value) => {
                self.metrics.record(strategy::PASS_THROUGH, outcome::HIT);
                debug!("Cache hit: {}", key);
                return Ok(Some(value));
            }
            Cached::Negative => {
                self.metrics
                    .record(strategy::PASS_THROUGH, outcome::NEGATIVE_HIT);
                debug!("Negative cache hit: {}", key);
                return Ok(None);
            }
            Cached::Miss => {
                self.metrics.record(strategy::PASS_THROUGH, outcome::MISS);
            }
        }

        self.metrics
            .record(strategy::PASS_THROUGH, outcome::LOADER_CALL);
        self.load_and_store(&key, id, loader, ttl).await
    }

    /// 互斥读
    ///
    /// 未命中时竞争该键的重建锁；失败则按 `mutex_retry_interval_ms` 退避后重读，
    /// 最多 `mutex_max_attempts` 次，耗尽后返回 `DealError::Contention`。
    /// 持锁后再次检查缓存，仍未命中才调用 `loader`，锁在任何情况下都会释放。
    #[instrument(skip(self, id, loader), level = "debug", fields(id = %id))]
    pub async fn get_with_mutex<ID, T, F, Fut>(
        &self,
        key_prefix: &str,
        id: ID,
        loader: F,
        ttl: Duration,
    ) -> Result<Option<T>>
    where
        ID: Display,
        T: Serialize + DeserializeOwned,
        F: FnOnce(ID) -> Fut,
        Fut: Future<Output = Result<Option<T>>>,
    {
        let key = format!("{}{}", key_prefix, id);
        let owner = self.lock.owner();
        let mut attempts = 0u32;

        loop {
            match self.read_plain(&key).await? {
                Cached::Hit(value) => {
                    self.metrics.record(strategy::MUTEX, outcome::HIT);
                    return Ok(Some(value));
                }
                Cached::Negative => {
                    self.metrics.record(strategy::MUTEX, outcome::NEGATIVE_HIT);
                    return Ok(None);
                }
                Cached::Miss if attempts == 0 => {
                    self.metrics.record(strategy::MUTEX, outcome::MISS);
                }
                Cached::Miss => {}
            }

            if self.lock.try_acquire(&key, &owner, self.lock_ttl).await? {
                break;
            }

            attempts += 1;
            self.metrics.record(strategy::MUTEX, outcome::CONTENDED);
            if attempts >= self.max_attempts {
                warn!(
                    "Gave up waiting for rebuild lock on {} after {} attempts",
                    key, attempts
                );
                return Err(DealError::Contention(format!(
                    "rebuild lock for {} still held after {} attempts",
                    key, attempts
                )));
            }
            tokio::time::sleep(self.retry_interval).await;
        }

        let rebuild = self.rebuild_under_lock(&key, id, loader, ttl);
        let outcome = AssertUnwindSafe(rebuild).catch_unwind().await;
        self.release_quietly(&key, &owner).await;
        match outcome {
            Ok(result) => result,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }

    /// 逻辑过期读
    ///
    /// 键不存在时直接返回 `None`（需预热）。条目已过期时尝试获取 `lock_prefix + id` 锁：
    /// 获取失败立即返回旧值；获取成功且复查后仍过期，则把重建提交给执行器并立即返回旧值。
    #[instrument(skip(self, id, loader), level = "debug", fields(id = %id))]
    pub async fn get_with_logical_expire<ID, T, F, Fut>(
        &self,
        key_prefix: &str,
        id: ID,
        loader: F,
        ttl: Duration,
        lock_prefix: &str,
    ) -> Result<Option<T>>
    where
        ID: Display + Send + 'static,
        T: Serialize + DeserializeOwned + Send + 'static,
        F: FnOnce(ID) -> Fut + Send + 'static,
        Fut: Future<Output = Result<Option<T>>> + Send + 'static,
    {
        let key = format!("{}{}", key_prefix, id);
        let Some(entry) = self.read_logical::<T>(&key).await? else {
            self.metrics.record(strategy::LOGICAL_EXPIRE, outcome::MISS);
            debug!("Logical entry not warmed: {}", key);
            return Ok(None);
        };
        if entry.is_fresh(Utc::now()) {
            self.metrics.record(strategy::LOGICAL_EXPIRE, outcome::HIT);
            return Ok(Some(entry.data));
        }
        self.metrics.record(strategy::LOGICAL_EXPIRE, outcome::STALE);

        let resource = format!("{}{}", lock_prefix, id);
        let owner = self.lock.owner();
        if !self.lock.try_acquire(&resource, &owner, self.lock_ttl).await? {
            self.metrics
                .record(strategy::LOGICAL_EXPIRE, outcome::CONTENDED);
            debug!("Rebuild of {} already in progress, serving stale", key);
            return Ok(Some(entry.data));
        }

        match self.read_logical::<T>(&key).await {
            Ok(Some(current)) if current.is_fresh(Utc::now()) => {
                self.release_quietly(&resource, &owner).await;
                return Ok(Some(current.data));
            }
            Ok(_) => {}
            Err(e) => {
                self.release_quietly(&resource, &owner).await;
                return Err(e);
            }
        }

        let task = {
            let store = self.store.clone();
            let serializer = self.serializer.clone();
            let lock = self.lock.clone();
            let metrics = self.metrics.clone();
            let key = key.clone();
            let resource = resource.clone();
            let owner = owner.clone();
            async move {
                metrics.record(strategy::LOGICAL_EXPIRE, outcome::LOADER_CALL);
                let rebuild = rebuild_logical(store.as_ref(), &serializer, &key, id, loader, ttl);
                let outcome = AssertUnwindSafe(rebuild).catch_unwind().await;
                release(&lock, &resource, &owner).await;
                match outcome {
                    Ok(Ok(())) => debug!("Rebuilt logical entry {}", key),
                    Ok(Err(e)) => {
                        metrics.record(strategy::LOGICAL_EXPIRE, outcome::REBUILD_FAILED);
                        error!("Rebuild of {} failed: {}", key, e);
                    }
                    Err(_) => {
                        metrics.record(strategy::LOGICAL_EXPIRE, outcome::REBUILD_FAILED);
                        error!("Rebuild of {} panicked", key);
                    }
                }
            }
        };

        match self.executor.submit(&key, task) {
            Ok(()) => {
                self.metrics
                    .record(strategy::LOGICAL_EXPIRE, outcome::REBUILD_SUBMITTED);
            }
            Err(e) => {
                warn!("Could not schedule rebuild of {}: {}", key, e);
                self.release_quietly(&resource, &owner).await;
            }
        }
        Ok(Some(entry.data))
    }

    async fn rebuild_under_lock<ID, T, F, Fut>(
        &self,
        key: &str,
        id: ID,
        loader: F,
        ttl: Duration,
    ) -> Result<Option<T>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(ID) -> Fut,
        Fut: Future<Output = Result<Option<T>>>,
    {
        match self.read_plain(key).await? {
            Cached::Hit(value) => {
                debug!("Cache rebuilt by another holder: {}", key);
                Ok(Some(value))
            }
            Cached::Negative => Ok(None),
            Cached::Miss => {
                self.metrics.record(strategy::MUTEX, outcome::LOADER_CALL);
                self.load_and_store(key, id, loader, ttl).await
            }
        }
    }

    async fn load_and_store<ID, T, F, Fut>(
        &self,
        key: &str,
        id: ID,
        loader: F,
        ttl: Duration,
    ) -> Result<Option<T>>
    where
        T: Serialize,
        F: FnOnce(ID) -> Fut,
        Fut: Future<Output = Result<Option<T>>>,
    {
        match loader(id).await? {
            Some(value) => {
                self.set(key, &value, ttl).await?;
                Ok(Some(value))
            }
            None => {
                debug!("Source has no record for {}, caching null marker", key);
                self.store
                    .set(key, NULL_MARKER, Some(self.null_ttl))
                    .await?;
                Ok(None)
            }
        }
    }

    async fn release_quietly(&self, resource: &str, owner: &LockOwner) {
        release(&self.lock, resource, owner).await;
    }
}

async fn release(lock: &DistributedLock, resource: &str, owner: &LockOwner) {
    if let Err(e) = lock.release(resource, owner).await {
        error!("Failed to release lock {}: {}", resource, e);
    }
}

/// 重新加载并写回逻辑过期条目；数据源中已不存在时删除该键
async fn rebuild_logical<ID, T, F, Fut>(
    store: &dyn KvStore,
    serializer: &SerializerEnum,
    key: &str,
    id: ID,
    loader: F,
    ttl: Duration,
) -> Result<()>
where
    T: Serialize,
    F: FnOnce(ID) -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    match loader(id).await? {
        Some(fresh) => write_logical(store, serializer, key, fresh, ttl).await,
        None => {
            store.delete(key).await?;
            Ok(())
        }
    }
}

async fn write_logical<T: Serialize>(
    store: &dyn KvStore,
    serializer: &SerializerEnum,
    key: &str,
    value: T,
    ttl: Duration,
) -> Result<()> {
    let entry = LogicalEntry::new(value, ttl)?;
    let text = serializer.serialize(&entry)?;
    store.set(key, &text, None).await
}
