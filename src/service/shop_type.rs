//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 商铺类型列表服务，列表以哈希结构缓存（字段为类型ID，值为JSON）。

use crate::backend::KvStore;
use crate::database::{ShopRepository, ShopType};
use crate::error::Result;
use crate::serialization::{Serializer, SerializerEnum};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

/// 商铺类型列表缓存键
pub const SHOP_TYPE_LIST_KEY: &str = "cache:shop-type:list";

#[derive(Clone)]
pub struct ShopTypeService {
    shops: Arc<dyn ShopRepository>,
    store: Arc<dyn KvStore>,
    serializer: SerializerEnum,
    ttl: Duration,
}

impl ShopTypeService {
    pub fn new(shops: Arc<dyn ShopRepository>, store: Arc<dyn KvStore>, ttl: Duration) -> Self {
        Self {
            shops,
            store,
            serializer: SerializerEnum::default(),
            ttl,
        }
    }

    /// 查询全部商铺类型，按 `sort` 升序
    #[instrument(skip(self), level = "debug")]
    pub async fn query_type_list(&self) -> Result<Vec<ShopType>> {
        let cached = self.store.hget_all(SHOP_TYPE_LIST_KEY).await?;
        if !cached.is_empty() {
            let mut types = cached
                .values()
                .map(|raw| self.serializer.deserialize::<ShopType>(raw))
                .collect::<Result<Vec<_>>>()?;
            types.sort_by_key(|t| (t.sort, t.id));
            debug!("Shop type list served from cache ({} entries)", types.len());
            return Ok(types);
        }

        let types = self.shops.list_shop_types().await?;
        if !types.is_empty() {
            let fields = types
                .iter()
                .map(|t| Ok((t.id.to_string(), self.serializer.serialize(t)?)))
                .collect::<Result<Vec<_>>>()?;
            self.store.hset_all(SHOP_TYPE_LIST_KEY, &fields).await?;
            self.store.expire(SHOP_TYPE_LIST_KEY, self.ttl).await?;
        }
        Ok(types)
    }
}
