//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! Sea-ORM持久化集成测试（SQLite）

#[path = "../common/mod.rs"]
mod common;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use common::{setup_logging, test_config};
use oxdeal::backend::MemoryStore;
use oxdeal::config::DatabaseConfig;
use oxdeal::database::{
    OrderTransaction, Persistence, SeaOrmRepository, SeckillVoucher, Shop, ShopRepository,
    ShopType, User, UserRepository, VoucherOrder, VoucherRepository,
};
use oxdeal::{DealError, Platform, Result};
use std::sync::Arc;
use tempfile::TempDir;

async fn repository() -> (TempDir, SeaOrmRepository) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data").join("oxdeal.db");
    let config = DatabaseConfig {
        url: format!("sqlite://{}?mode=rwc", path.display()),
        max_connections: 1,
        connect_timeout_ms: 5000,
    };
    let repo = SeaOrmRepository::connect(&config).await.unwrap();
    repo.init_schema().await.unwrap();
    (dir, repo)
}

fn voucher(voucher_id: i64, stock: i64) -> SeckillVoucher {
    let now = Utc::now();
    SeckillVoucher {
        voucher_id,
        stock,
        begin_time: Utc.timestamp_opt(now.timestamp() - 3600, 0).unwrap(),
        end_time: Utc.timestamp_opt(now.timestamp() + 3600, 0).unwrap(),
    }
}

fn order(id: i64, user_id: i64, voucher_id: i64) -> VoucherOrder {
    VoucherOrder {
        id,
        user_id,
        voucher_id,
        create_time: Utc.timestamp_opt(Utc::now().timestamp(), 0).unwrap(),
    }
}

#[tokio::test]
async fn test_schema_init_is_idempotent_and_round_trips_voucher() {
    setup_logging();
    let (_dir, repo) = repository().await;
    repo.init_schema().await.unwrap();
    repo.ping().await.unwrap();

    let v = voucher(1, 100);
    repo.save_voucher(&v).await.unwrap();
    assert_eq!(repo.find_voucher(1).await.unwrap(), Some(v));
    assert_eq!(repo.find_voucher(2).await.unwrap(), None);
}

#[tokio::test]
async fn test_conditional_decrement_stops_at_zero() {
    setup_logging();
    let (_dir, repo) = repository().await;
    repo.save_voucher(&voucher(1, 2)).await.unwrap();

    let mut tx = repo.begin().await.unwrap();
    assert_eq!(tx.decrement_stock(1).await.unwrap(), 1);
    assert_eq!(tx.decrement_stock(1).await.unwrap(), 1);
    assert_eq!(tx.decrement_stock(1).await.unwrap(), 0);
    assert_eq!(tx.decrement_stock(99).await.unwrap(), 0);
    tx.commit().await.unwrap();

    assert_eq!(repo.find_voucher(1).await.unwrap().unwrap().stock, 0);
}

#[tokio::test]
async fn test_rollback_discards_decrement_and_order() {
    setup_logging();
    let (_dir, repo) = repository().await;
    repo.save_voucher(&voucher(1, 5)).await.unwrap();

    let mut tx = repo.begin().await.unwrap();
    tx.decrement_stock(1).await.unwrap();
    tx.save_order(&order(100, 7, 1)).await.unwrap();
    assert_eq!(tx.count_orders(7, 1).await.unwrap(), 1);
    tx.rollback().await.unwrap();

    assert_eq!(repo.find_voucher(1).await.unwrap().unwrap().stock, 5);
    assert_eq!(repo.count_orders(7, 1).await.unwrap(), 0);

    // 未提交即丢弃同样回滚
    {
        let mut tx = repo.begin().await.unwrap();
        tx.decrement_stock(1).await.unwrap();
    }
    assert_eq!(repo.find_voucher(1).await.unwrap().unwrap().stock, 5);
}

#[tokio::test]
async fn test_unique_user_voucher_constraint() {
    setup_logging();
    let (_dir, repo) = repository().await;
    repo.save_voucher(&voucher(1, 5)).await.unwrap();

    let mut tx = repo.begin().await.unwrap();
    tx.save_order(&order(1, 7, 1)).await.unwrap();
    tx.commit().await.unwrap();

    let mut tx = repo.begin().await.unwrap();
    let err = tx.save_order(&order(2, 7, 1)).await.unwrap_err();
    assert!(matches!(
        err,
        DealError::AlreadyPurchased {
            user_id: 7,
            voucher_id: 1
        }
    ));
    assert!(err.is_rejection());
    assert!(!err.is_retryable());
    tx.rollback().await.unwrap();

    assert_eq!(repo.count_orders(7, 1).await.unwrap(), 1);
}

#[tokio::test]
async fn test_shop_and_type_queries() {
    setup_logging();
    let (_dir, repo) = repository().await;
    let mut shop = Shop {
        id: 1,
        name: "103茶餐厅".to_string(),
        type_id: 1,
        area: None,
        address: "金华路锦昌文华苑29号".to_string(),
        avg_price: 80,
        sold: 4215,
        comments: 3035,
        score: 37,
        open_hours: Some("10:00-22:00".to_string()),
    };
    repo.save_shop(&shop).await.unwrap();
    assert_eq!(repo.find_shop(1).await.unwrap(), Some(shop.clone()));

    shop.name = "蔡馬洪涛烤肉".to_string();
    assert_eq!(repo.update_shop(&shop).await.unwrap(), 1);
    shop.id = 2;
    assert_eq!(repo.update_shop(&shop).await.unwrap(), 0);
    assert_eq!(
        repo.find_shop(1).await.unwrap().map(|s| s.name),
        Some("蔡馬洪涛烤肉".to_string())
    );

    for (id, sort) in [(1, 3), (2, 1), (3, 2)] {
        repo.save_shop_type(&ShopType {
            id,
            name: format!("type-{}", id),
            icon: None,
            sort,
        })
        .await
        .unwrap();
    }
    let ids: Vec<_> = repo
        .list_shop_types()
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.id)
        .collect();
    assert_eq!(ids, vec![2, 3, 1]);
}

#[tokio::test]
async fn test_user_phone_is_unique() {
    setup_logging();
    let (_dir, repo) = repository().await;
    let mut user = User::with_phone(10, "13812345678");
    user.create_time = Utc.timestamp_opt(user.create_time.timestamp(), 0).unwrap();
    repo.insert_user(&user).await.unwrap();

    assert_eq!(
        repo.find_user_by_phone("13812345678").await.unwrap(),
        Some(user)
    );
    assert!(matches!(
        repo.insert_user(&User::with_phone(11, "13812345678")).await,
        Err(DealError::Duplicate(_))
    ));
    assert_eq!(repo.find_user_by_phone("13900000000").await.unwrap(), None);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_seckill_against_sqlite() {
    setup_logging();
    let (_dir, repo) = repository().await;
    let repo = Arc::new(repo);
    repo.save_voucher(&voucher(1, 5)).await.unwrap();
    let platform = Platform::new(test_config(), Arc::new(MemoryStore::new()), repo.clone()).unwrap();

    let mut handles = Vec::new();
    for user_id in 1..=20 {
        let seckill = platform.seckill().clone();
        handles.push(tokio::spawn(async move { seckill.purchase(1, user_id).await }));
    }
    let mut created = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => created += 1,
            Err(e) => assert!(matches!(e, DealError::OutOfStock(1)), "{}", e),
        }
    }
    assert_eq!(created, 5);
    assert_eq!(repo.find_voucher(1).await.unwrap().unwrap().stock, 0);

    let err = platform.seckill().purchase(1, 1).await.unwrap_err();
    assert!(err.is_rejection());

    let late = Utc::now() + ChronoDuration::hours(2);
    assert!(matches!(
        platform.seckill().purchase_at(1, 99, late).await,
        Err(DealError::TimeWindow { .. })
    ));
    platform.shutdown().await.unwrap();
}

/// 事务内的重复下单检查总是读到空结果，只剩唯一索引拦截重复订单
struct StaleOrderCheck {
    inner: Arc<SeaOrmRepository>,
}

struct StaleOrderCheckTransaction {
    inner: Box<dyn OrderTransaction>,
}

#[async_trait]
impl OrderTransaction for StaleOrderCheckTransaction {
    async fn count_orders(&mut self, _user_id: i64, _voucher_id: i64) -> Result<i64> {
        Ok(0)
    }

    async fn decrement_stock(&mut self, voucher_id: i64) -> Result<u64> {
        self.inner.decrement_stock(voucher_id).await
    }

    async fn save_order(&mut self, order: &VoucherOrder) -> Result<()> {
        self.inner.save_order(order).await
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.inner.commit().await
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.inner.rollback().await
    }
}

#[async_trait]
impl VoucherRepository for StaleOrderCheck {
    async fn find_voucher(&self, voucher_id: i64) -> Result<Option<SeckillVoucher>> {
        self.inner.find_voucher(voucher_id).await
    }

    async fn save_voucher(&self, voucher: &SeckillVoucher) -> Result<()> {
        self.inner.save_voucher(voucher).await
    }

    async fn count_orders(&self, user_id: i64, voucher_id: i64) -> Result<i64> {
        self.inner.count_orders(user_id, voucher_id).await
    }

    async fn begin(&self) -> Result<Box<dyn OrderTransaction>> {
        Ok(Box::new(StaleOrderCheckTransaction {
            inner: self.inner.begin().await?,
        }))
    }
}

#[async_trait]
impl ShopRepository for StaleOrderCheck {
    async fn find_shop(&self, id: i64) -> Result<Option<Shop>> {
        self.inner.find_shop(id).await
    }

    async fn save_shop(&self, shop: &Shop) -> Result<()> {
        self.inner.save_shop(shop).await
    }

    async fn update_shop(&self, shop: &Shop) -> Result<u64> {
        self.inner.update_shop(shop).await
    }

    async fn list_shop_types(&self) -> Result<Vec<ShopType>> {
        self.inner.list_shop_types().await
    }

    async fn save_shop_type(&self, shop_type: &ShopType) -> Result<()> {
        self.inner.save_shop_type(shop_type).await
    }
}

#[async_trait]
impl UserRepository for StaleOrderCheck {
    async fn find_user_by_phone(&self, phone: &str) -> Result<Option<User>> {
        self.inner.find_user_by_phone(phone).await
    }

    async fn insert_user(&self, user: &User) -> Result<()> {
        self.inner.insert_user(user).await
    }
}

#[async_trait]
impl Persistence for StaleOrderCheck {
    async fn ping(&self) -> Result<()> {
        self.inner.ping().await
    }

    async fn init_schema(&self) -> Result<()> {
        self.inner.init_schema().await
    }
}

#[tokio::test]
async fn test_unique_index_turns_duplicate_purchase_into_rejection() {
    setup_logging();
    let (_dir, repo) = repository().await;
    let repo = Arc::new(repo);
    repo.save_voucher(&voucher(1, 5)).await.unwrap();
    let platform = Platform::new(
        test_config(),
        Arc::new(MemoryStore::new()),
        Arc::new(StaleOrderCheck {
            inner: repo.clone(),
        }),
    )
    .unwrap();

    platform.seckill().purchase(1, 7).await.unwrap();
    let err = platform.seckill().purchase(1, 7).await.unwrap_err();
    assert!(
        matches!(
            err,
            DealError::AlreadyPurchased {
                user_id: 7,
                voucher_id: 1
            }
        ),
        "{}",
        err
    );
    assert!(err.is_rejection());
    assert!(!err.is_retryable());

    assert_eq!(repo.find_voucher(1).await.unwrap().unwrap().stock, 4);
    assert_eq!(repo.count_orders(7, 1).await.unwrap(), 1);
    platform.shutdown().await.unwrap();
}
