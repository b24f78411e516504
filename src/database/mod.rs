//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 持久化层模块
//!
//! 定义仓储接口，并提供基于Sea-ORM（SQLite/MySQL/PostgreSQL）和内存的两种实现。
//! 库存与订单以持久化层为准：条件扣减是防止超卖的唯一权威保证。

use crate::error::Result;
use async_trait::async_trait;

pub mod connection;
pub mod memory;
pub mod models;
pub mod sea;

pub use connection::DatabaseType;
pub use memory::MemoryRepository;
pub use models::{SeckillVoucher, Shop, ShopType, User, UserDto, VoucherOrder};
pub use sea::SeaOrmRepository;

/// 下单事务
///
/// 库存扣减与订单写入在同一事务内提交；未提交即被丢弃的事务会回滚。
#[async_trait]
pub trait OrderTransaction: Send {
    /// 统计该用户对该券的订单数（含本事务内未提交的写入）
    async fn count_orders(&mut self, user_id: i64, voucher_id: i64) -> Result<i64>;

    /// 条件扣减：`stock = stock - 1 WHERE stock > 0`，返回受影响行数
    async fn decrement_stock(&mut self, voucher_id: i64) -> Result<u64>;

    async fn save_order(&mut self, order: &VoucherOrder) -> Result<()>;

    async fn commit(self: Box<Self>) -> Result<()>;

    async fn rollback(self: Box<Self>) -> Result<()>;
}

/// 秒杀券与订单仓储
#[async_trait]
pub trait VoucherRepository: Send + Sync {
    async fn find_voucher(&self, voucher_id: i64) -> Result<Option<SeckillVoucher>>;

    async fn save_voucher(&self, voucher: &SeckillVoucher) -> Result<()>;

    async fn count_orders(&self, user_id: i64, voucher_id: i64) -> Result<i64>;

    /// 开启下单事务
    async fn begin(&self) -> Result<Box<dyn OrderTransaction>>;
}

/// 商铺仓储
#[async_trait]
pub trait ShopRepository: Send + Sync {
    async fn find_shop(&self, id: i64) -> Result<Option<Shop>>;

    async fn save_shop(&self, shop: &Shop) -> Result<()>;

    /// 按ID更新，返回受影响行数
    async fn update_shop(&self, shop: &Shop) -> Result<u64>;

    /// 按 `sort` 升序返回全部商铺类型
    async fn list_shop_types(&self) -> Result<Vec<ShopType>>;

    async fn save_shop_type(&self, shop_type: &ShopType) -> Result<()>;
}

/// 用户仓储
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_user_by_phone(&self, phone: &str) -> Result<Option<User>>;

    async fn insert_user(&self, user: &User) -> Result<()>;
}

/// 完整的持久化后端
#[async_trait]
pub trait Persistence: VoucherRepository + ShopRepository + UserRepository {
    /// 检查后端是否可用
    async fn ping(&self) -> Result<()>;

    /// 创建缺失的表
    async fn init_schema(&self) -> Result<()>;
}
