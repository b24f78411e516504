//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了单进程内存持久化实现。
//!
//! 下单事务持有整张表的独占锁，写入先暂存在事务内，提交时才生效。

use super::models::{SeckillVoucher, Shop, ShopType, User, VoucherOrder};
use super::{OrderTransaction, Persistence, ShopRepository, UserRepository, VoucherRepository};
use crate::error::{DealError, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, warn};

#[derive(Debug, Default)]
struct Tables {
    vouchers: HashMap<i64, SeckillVoucher>,
    orders: Vec<VoucherOrder>,
    shops: HashMap<i64, Shop>,
    shop_types: BTreeMap<i64, ShopType>,
    users: HashMap<String, User>,
}

impl Tables {
    fn count_orders(&self, user_id: i64, voucher_id: i64) -> i64 {
        self.orders
            .iter()
            .filter(|o| o.user_id == user_id && o.voucher_id == voucher_id)
            .count() as i64
    }
}

/// 内存持久化实现
#[derive(Debug, Clone, Default)]
pub struct MemoryRepository {
    tables: Arc<Mutex<Tables>>,
    fail_next_save: Arc<AtomicBool>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// 让下一次订单写入失败，用于验证事务回滚
    pub fn fail_next_order_save(&self) {
        self.fail_next_save.store(true, Ordering::SeqCst);
    }

    /// 当前库存
    pub async fn stock_of(&self, voucher_id: i64) -> Option<i64> {
        self.tables
            .lock()
            .await
            .vouchers
            .get(&voucher_id)
            .map(|v| v.stock)
    }

    /// 已提交的全部订单
    pub async fn orders(&self) -> Vec<VoucherOrder> {
        self.tables.lock().await.orders.clone()
    }
}

#[async_trait]
impl VoucherRepository for MemoryRepository {
    async fn find_voucher(&self, voucher_id: i64) -> Result<Option<SeckillVoucher>> {
        Ok(self.tables.lock().await.vouchers.get(&voucher_id).cloned())
    }

    async fn save_voucher(&self, voucher: &SeckillVoucher) -> Result<()> {
        self.tables
            .lock()
            .await
            .vouchers
            .insert(voucher.voucher_id, voucher.clone());
        Ok(())
    }

    async fn count_orders(&self, user_id: i64, voucher_id: i64) -> Result<i64> {
        Ok(self.tables.lock().await.count_orders(user_id, voucher_id))
    }

    async fn begin(&self) -> Result<Box<dyn OrderTransaction>> {
        let guard = self.tables.clone().lock_owned().await;
        Ok(Box::new(MemoryOrderTransaction {
            tables: guard,
            decrements: HashMap::new(),
            orders: Vec::new(),
            fail_next_save: self.fail_next_save.clone(),
        }))
    }
}

#[async_trait]
impl ShopRepository for MemoryRepository {
    async fn find_shop(&self, id: i64) -> Result<Option<Shop>> {
        Ok(self.tables.lock().await.shops.get(&id).cloned())
    }

    async fn save_shop(&self, shop: &Shop) -> Result<()> {
        self.tables.lock().await.shops.insert(shop.id, shop.clone());
        Ok(())
    }

    async fn update_shop(&self, shop: &Shop) -> Result<u64> {
        let mut tables = self.tables.lock().await;
        match tables.shops.get_mut(&shop.id) {
            Some(existing) => {
                *existing = shop.clone();
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn list_shop_types(&self) -> Result<Vec<ShopType>> {
        let mut types: Vec<ShopType> = self
            .tables
            .lock()
            .await
            .shop_types
            .values()
            .cloned()
            .collect();
        types.sort_by_key(|t| (t.sort, t.id));
        Ok(types)
    }

    async fn save_shop_type(&self, shop_type: &ShopType) -> Result<()> {
        self.tables
            .lock()
            .await
            .shop_types
            .insert(shop_type.id, shop_type.clone());
        Ok(())
    }
}

#[async_trait]
impl UserRepository for MemoryRepository {
    async fn find_user_by_phone(&self, phone: &str) -> Result<Option<User>> {
        Ok(self.tables.lock().await.users.get(phone).cloned())
    }

    async fn insert_user(&self, user: &User) -> Result<()> {
        let mut tables = self.tables.lock().await;
        if tables.users.contains_key(&user.phone) {
            return Err(DealError::Duplicate(format!("phone {}", user.phone)));
        }
        tables.users.insert(user.phone.clone(), user.clone());
        Ok(())
    }
}

#[async_trait]
impl Persistence for MemoryRepository {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn init_schema(&self) -> Result<()> {
        Ok(())
    }
}

struct MemoryOrderTransaction {
    tables: OwnedMutexGuard<Tables>,
    decrements: HashMap<i64, i64>,
    orders: Vec<VoucherOrder>,
    fail_next_save: Arc<AtomicBool>,
}

#[async_trait]
impl OrderTransaction for MemoryOrderTransaction {
    async fn count_orders(&mut self, user_id: i64, voucher_id: i64) -> Result<i64> {
        let staged = self
            .orders
            .iter()
            .filter(|o| o.user_id == user_id && o.voucher_id == voucher_id)
            .count() as i64;
        Ok(self.tables.count_orders(user_id, voucher_id) + staged)
    }

    async fn decrement_stock(&mut self, voucher_id: i64) -> Result<u64> {
        let Some(voucher) = self.tables.vouchers.get(&voucher_id) else {
            return Ok(0);
        };
        let pending = self.decrements.entry(voucher_id).or_insert(0);
        if voucher.stock - *pending > 0 {
            *pending += 1;
            Ok(1)
        } else {
            Ok(0)
        }
    }

    async fn save_order(&mut self, order: &VoucherOrder) -> Result<()> {
        if self.fail_next_save.swap(false, Ordering::SeqCst) {
            warn!("Injected failure while saving order {}", order.id);
            return Err(DealError::DatabaseError(
                "injected order save failure".to_string(),
            ));
        }
        if self.count_orders(order.user_id, order.voucher_id).await? > 0 {
            return Err(DealError::AlreadyPurchased {
                user_id: order.user_id,
                voucher_id: order.voucher_id,
            });
        }
        self.orders.push(order.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let MemoryOrderTransaction {
            mut tables,
            decrements,
            orders,
            ..
        } = *self;
        for (voucher_id, count) in decrements {
            if let Some(voucher) = tables.vouchers.get_mut(&voucher_id) {
                voucher.stock -= count;
            }
        }
        debug!("Committing {} order(s)", orders.len());
        tables.orders.extend(orders);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        debug!(
            "Rolling back {} staged order(s)",
            self.orders.len()
        );
        Ok(())
    }
}
