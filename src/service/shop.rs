//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 商铺读写服务。

use crate::cache::CacheClient;
use crate::config::{ReadStrategy, ShopConfig};
use crate::database::{Shop, ShopRepository};
use crate::error::{DealError, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

/// 商铺缓存键前缀
pub const SHOP_CACHE_PREFIX: &str = "cache:shop:";

/// 逻辑过期重建锁的资源前缀
pub const SHOP_LOCK_PREFIX: &str = "shop:";

#[derive(Clone)]
pub struct ShopService {
    shops: Arc<dyn ShopRepository>,
    cache: CacheClient,
    strategy: ReadStrategy,
    ttl: Duration,
}

impl std::fmt::Debug for ShopService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShopService")
            .field("strategy", &self.strategy)
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl ShopService {
    pub fn new(shops: Arc<dyn ShopRepository>, cache: CacheClient, config: &ShopConfig) -> Self {
        Self {
            shops,
            cache,
            strategy: config.read_strategy,
            ttl: Duration::from_secs(config.ttl_secs),
        }
    }

    pub fn strategy(&self) -> ReadStrategy {
        self.strategy
    }

    pub fn cache_key(id: i64) -> String {
        format!("{}{}", SHOP_CACHE_PREFIX, id)
    }

    /// 按配置的读策略查询商铺
    #[instrument(skip(self), level = "debug")]
    pub async fn query_by_id(&self, id: i64) -> Result<Option<Shop>> {
        let repo = self.shops.clone();
        let loader = move |id: i64| async move { repo.find_shop(id).await };
        match self.strategy {
            ReadStrategy::PassThrough => {
                self.cache
                    .get_with_pass_through(SHOP_CACHE_PREFIX, id, loader, self.ttl)
                    .await
            }
            ReadStrategy::Mutex => {
                self.cache
                    .get_with_mutex(SHOP_CACHE_PREFIX, id, loader, self.ttl)
                    .await
            }
            ReadStrategy::LogicalExpire => {
                self.cache
                    .get_with_logical_expire(
                        SHOP_CACHE_PREFIX,
                        id,
                        loader,
                        self.ttl,
                        SHOP_LOCK_PREFIX,
                    )
                    .await
            }
        }
    }

    /// 预热逻辑过期条目，返回数据源中是否存在该商铺
    #[instrument(skip(self), level = "info")]
    pub async fn save_shop_to_cache(&self, id: i64, ttl: Duration) -> Result<bool> {
        match self.shops.find_shop(id).await? {
            Some(shop) => {
                self.cache
                    .set_with_logical_expire(&Self::cache_key(id), shop, ttl)
                    .await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// 更新商铺：先写数据库，再使缓存失效
    ///
    /// 逻辑过期策略不会在冷未命中时回源，因此该策略下改为重新预热。
    #[instrument(skip(self, shop), level = "info", fields(shop_id = shop.id))]
    pub async fn update(&self, shop: &Shop) -> Result<()> {
        if shop.id <= 0 {
            return Err(DealError::Validation("shop id is required".to_string()));
        }
        if self.shops.update_shop(shop).await? == 0 {
            return Err(DealError::NotFound(format!("shop {}", shop.id)));
        }

        let key = Self::cache_key(shop.id);
        match self.strategy {
            ReadStrategy::LogicalExpire => {
                self.cache
                    .set_with_logical_expire(&key, shop.clone(), self.ttl)
                    .await?;
            }
            ReadStrategy::PassThrough | ReadStrategy::Mutex => {
                self.cache.invalidate(&key).await?;
            }
        }
        debug!("Shop {} updated, cache refreshed", shop.id);
        Ok(())
    }
}
