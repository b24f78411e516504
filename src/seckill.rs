//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了秒杀下单流程。
//!
//! 每次下单依次经过：校验 → 获取用户锁 → 重复下单检查 → 条件扣减库存 → 创建订单，
//! 最终提交或拒绝。条件扣减是防止超卖的权威保证；用户锁只负责串行化同一用户的并发请求，
//! 使重复下单检查与订单写入之间不存在竞态。

use crate::cache::CacheClient;
use crate::config::SeckillConfig;
use crate::database::{OrderTransaction, SeckillVoucher, VoucherOrder, VoucherRepository};
use crate::error::{DealError, Result};
use crate::id_worker::IdGenerator;
use crate::lock::{DistributedLock, LockOwner};
use chrono::{DateTime, Utc};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// 秒杀券缓存键前缀
pub const VOUCHER_CACHE_PREFIX: &str = "cache:seckill:voucher:";

/// 用户下单锁的资源前缀
pub const ORDER_LOCK_PREFIX: &str = "order:";

/// 秒杀下单流程
#[derive(Clone)]
pub struct SeckillOrderWorkflow {
    vouchers: Arc<dyn VoucherRepository>,
    cache: CacheClient,
    lock: DistributedLock,
    ids: IdGenerator,
    order_business_key: String,
    user_lock_ttl: Duration,
    lock_retry_interval: Duration,
    lock_max_attempts: u32,
    voucher_cache_ttl: Duration,
}

impl std::fmt::Debug for SeckillOrderWorkflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SeckillOrderWorkflow")
            .field("order_business_key", &self.order_business_key)
            .field("user_lock_ttl", &self.user_lock_ttl)
            .field("lock_max_attempts", &self.lock_max_attempts)
            .finish()
    }
}

impl SeckillOrderWorkflow {
    pub fn new(
        vouchers: Arc<dyn VoucherRepository>,
        cache: CacheClient,
        lock: DistributedLock,
        ids: IdGenerator,
        config: &SeckillConfig,
    ) -> Self {
        Self {
            vouchers,
            cache,
            lock,
            ids,
            order_business_key: config.order_business_key.clone(),
            user_lock_ttl: Duration::from_secs(config.user_lock_ttl_secs),
            lock_retry_interval: Duration::from_millis(config.lock_retry_interval_ms),
            lock_max_attempts: config.lock_max_attempts.max(1),
            voucher_cache_ttl: Duration::from_secs(config.voucher_cache_ttl_secs),
        }
    }

    /// 秒杀券的缓存键
    pub fn voucher_cache_key(voucher_id: i64) -> String {
        format!("{}{}", VOUCHER_CACHE_PREFIX, voucher_id)
    }

    /// 下单，成功时返回订单ID
    ///
    /// 业务拒绝以 `TimeWindow`、`OutOfStock`、`AlreadyPurchased`、`VoucherNotFound`
    /// 返回；存储或数据库故障以基础设施错误返回，两者可通过 `DealError::is_rejection` 区分。
    #[instrument(skip(self), level = "info")]
    pub async fn purchase(&self, voucher_id: i64, user_id: i64) -> Result<i64> {
        self.purchase_at(voucher_id, user_id, Utc::now()).await
    }

    /// 以指定时刻校验时间窗口并下单
    pub async fn purchase_at(
        &self,
        voucher_id: i64,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> Result<i64> {
        let voucher = self.load_voucher(voucher_id).await?;
        validate(&voucher, now)?;

        let resource = format!("{}{}", ORDER_LOCK_PREFIX, user_id);
        let owner = self.lock.owner();
        self.acquire_user_lock(&resource, &owner).await?;

        let outcome = AssertUnwindSafe(self.create_order(voucher_id, user_id, now))
            .catch_unwind()
            .await;
        if let Err(e) = self.lock.release(&resource, &owner).await {
            warn!("Failed to release {} after purchase: {}", resource, e);
        }
        match outcome {
            Ok(result) => result,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }

    async fn load_voucher(&self, voucher_id: i64) -> Result<SeckillVoucher> {
        let repo = self.vouchers.clone();
        self.cache
            .get_with_pass_through(
                VOUCHER_CACHE_PREFIX,
                voucher_id,
                move |id| async move { repo.find_voucher(id).await },
                self.voucher_cache_ttl,
            )
            .await?
            .ok_or(DealError::VoucherNotFound(voucher_id))
    }

    async fn acquire_user_lock(&self, resource: &str, owner: &LockOwner) -> Result<()> {
        for attempt in 1..=self.lock_max_attempts {
            if self
                .lock
                .try_acquire(resource, owner, self.user_lock_ttl)
                .await?
            {
                return Ok(());
            }
            debug!("{} is busy (attempt {})", resource, attempt);
            if attempt < self.lock_max_attempts {
                tokio::time::sleep(self.lock_retry_interval).await;
            }
        }
        warn!(
            "Could not acquire {} after {} attempts",
            resource, self.lock_max_attempts
        );
        Err(DealError::Contention(format!(
            "purchase lock {} still held after {} attempts",
            resource, self.lock_max_attempts
        )))
    }

    async fn create_order(
        &self,
        voucher_id: i64,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> Result<i64> {
        let mut tx = self.vouchers.begin().await?;
        match self
            .place_order(tx.as_mut(), voucher_id, user_id, now)
            .await
        {
            Ok(order_id) => {
                tx.commit().await?;
                if let Err(e) = self
                    .cache
                    .invalidate(&Self::voucher_cache_key(voucher_id))
                    .await
                {
                    warn!("Failed to invalidate voucher {} cache: {}", voucher_id, e);
                }
                info!(
                    "Order {} created for user {} on voucher {}",
                    order_id, user_id, voucher_id
                );
                Ok(order_id)
            }
            Err(e) => {
                if let Err(rollback) = tx.rollback().await {
                    warn!("Rollback failed: {}", rollback);
                }
                Err(e)
            }
        }
    }

    async fn place_order(
        &self,
        tx: &mut dyn OrderTransaction,
        voucher_id: i64,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> Result<i64> {
        if tx.count_orders(user_id, voucher_id).await? > 0 {
            return Err(DealError::AlreadyPurchased {
                user_id,
                voucher_id,
            });
        }
        if tx.decrement_stock(voucher_id).await? == 0 {
            return Err(DealError::OutOfStock(voucher_id));
        }

        let order = VoucherOrder {
            id: self.ids.next_id(&self.order_business_key).await?,
            user_id,
            voucher_id,
            create_time: now,
        };
        tx.save_order(&order).await?;
        Ok(order.id)
    }
}

/// 时间窗口与库存的快速校验
///
/// 库存检查基于缓存或读取时的快照，不具权威性。
fn validate(voucher: &SeckillVoucher, now: DateTime<Utc>) -> Result<()> {
    if now < voucher.begin_time {
        return Err(DealError::TimeWindow {
            voucher_id: voucher.voucher_id,
            reason: format!("sale starts at {}", voucher.begin_time),
        });
    }
    if now > voucher.end_time {
        return Err(DealError::TimeWindow {
            voucher_id: voucher.voucher_id,
            reason: format!("sale ended at {}", voucher.end_time),
        });
    }
    if voucher.stock < 1 {
        return Err(DealError::OutOfStock(voucher.voucher_id));
    }
    Ok(())
}
