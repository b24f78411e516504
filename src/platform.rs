//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块负责按配置构造并连接全部组件，并管理它们的生命周期。

use crate::backend::{KvStore, MemoryStore, RedisStore};
use crate::cache::{CacheClient, RebuildExecutor};
use crate::config::Config;
use crate::database::{MemoryRepository, Persistence, SeaOrmRepository};
use crate::error::{DealError, Result};
use crate::id_worker::IdGenerator;
use crate::lock::DistributedLock;
use crate::seckill::SeckillOrderWorkflow;
use crate::service::{LoginService, ShopService, ShopTypeService};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument};

/// 组件集合
///
/// 所有共享状态（锁、计数器、重建执行器）都在这里显式创建，进程退出前调用 `shutdown`。
pub struct Platform {
    config: Config,
    store: Arc<dyn KvStore>,
    persistence: Arc<dyn Persistence>,
    lock: DistributedLock,
    ids: IdGenerator,
    executor: Arc<RebuildExecutor>,
    cache: CacheClient,
    seckill: SeckillOrderWorkflow,
    shops: ShopService,
    shop_types: ShopTypeService,
    login: LoginService,
}

impl std::fmt::Debug for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Platform")
            .field("lock", &self.lock)
            .field("cache", &self.cache)
            .finish()
    }
}

impl Platform {
    /// 用已建立的存储与持久化后端组装组件
    pub fn new<P: Persistence + 'static>(
        config: Config,
        store: Arc<dyn KvStore>,
        persistence: Arc<P>,
    ) -> Result<Self> {
        config.validate().map_err(DealError::ConfigError)?;

        let lock = DistributedLock::new(store.clone());
        let ids = IdGenerator::new(store.clone(), &config.id);
        let executor = Arc::new(RebuildExecutor::new(&config.rebuild));
        let cache = CacheClient::new(store.clone(), lock.clone(), executor.clone(), &config.cache);

        let seckill = SeckillOrderWorkflow::new(
            persistence.clone(),
            cache.clone(),
            lock.clone(),
            ids.clone(),
            &config.seckill,
        );
        let shops = ShopService::new(persistence.clone(), cache.clone(), &config.shop);
        let shop_types = ShopTypeService::new(
            persistence.clone(),
            store.clone(),
            Duration::from_secs(config.shop.type_list_ttl_secs),
        );
        let login = LoginService::new(persistence.clone(), store.clone(), ids.clone(), &config.login);

        info!(
            "Platform assembled (instance {}, shop strategy {:?})",
            lock.instance_id(),
            config.shop.read_strategy
        );

        Ok(Self {
            config,
            store,
            persistence,
            lock,
            ids,
            executor,
            cache,
            seckill,
            shops,
            shop_types,
            login,
        })
    }

    /// 连接Redis与数据库并组装组件
    #[instrument(skip(config), level = "info")]
    pub async fn connect(config: Config) -> Result<Self> {
        let store: Arc<dyn KvStore> = Arc::new(RedisStore::new(&config.store).await?);
        let persistence = Arc::new(SeaOrmRepository::connect(&config.database).await?);
        Self::new(config, store, persistence)
    }

    /// 使用进程内存储与持久化组装组件，仅适用于单进程部署
    pub fn in_memory(config: Config) -> Result<Self> {
        Self::new(
            config,
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryRepository::new()),
        )
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn KvStore> {
        &self.store
    }

    pub fn persistence(&self) -> &Arc<dyn Persistence> {
        &self.persistence
    }

    pub fn lock(&self) -> &DistributedLock {
        &self.lock
    }

    pub fn ids(&self) -> &IdGenerator {
        &self.ids
    }

    pub fn cache(&self) -> &CacheClient {
        &self.cache
    }

    pub fn seckill(&self) -> &SeckillOrderWorkflow {
        &self.seckill
    }

    pub fn shops(&self) -> &ShopService {
        &self.shops
    }

    pub fn shop_types(&self) -> &ShopTypeService {
        &self.shop_types
    }

    pub fn login(&self) -> &LoginService {
        &self.login
    }

    /// 停止接收重建任务并等待已提交的任务完成
    #[instrument(skip(self), level = "info")]
    pub async fn shutdown(&self) -> Result<()> {
        self.executor.shutdown().await?;
        info!("Platform shut down");
        Ok(())
    }
}
