//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了基于Sea-ORM原生SQL语句的持久化实现，支持SQLite、MySQL和PostgreSQL。
//!
//! 时间字段统一以UTC秒存储为 BIGINT。

use super::connection::{bind_placeholders, ensure_database_directory, DatabaseType};
use super::models::{SeckillVoucher, Shop, ShopType, User, VoucherOrder};
use super::{OrderTransaction, Persistence, ShopRepository, UserRepository, VoucherRepository};
use crate::config::DatabaseConfig;
use crate::error::{DealError, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseBackend, DatabaseConnection,
    DatabaseTransaction, DbErr, QueryResult, SqlErr, Statement, TransactionTrait, Value,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument};

const SCHEMA: [&str; 5] = [
    "CREATE TABLE IF NOT EXISTS tb_seckill_voucher (
        voucher_id BIGINT PRIMARY KEY,
        stock BIGINT NOT NULL,
        begin_time BIGINT NOT NULL,
        end_time BIGINT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS tb_voucher_order (
        id BIGINT PRIMARY KEY,
        user_id BIGINT NOT NULL,
        voucher_id BIGINT NOT NULL,
        create_time BIGINT NOT NULL,
        UNIQUE (user_id, voucher_id)
    )",
    "CREATE TABLE IF NOT EXISTS tb_shop (
        id BIGINT PRIMARY KEY,
        name VARCHAR(128) NOT NULL,
        type_id BIGINT NOT NULL,
        area VARCHAR(128),
        address VARCHAR(255) NOT NULL,
        avg_price BIGINT NOT NULL,
        sold BIGINT NOT NULL,
        comments BIGINT NOT NULL,
        score BIGINT NOT NULL,
        open_hours VARCHAR(64)
    )",
    "CREATE TABLE IF NOT EXISTS tb_shop_type (
        id BIGINT PRIMARY KEY,
        name VARCHAR(64) NOT NULL,
        icon VARCHAR(255),
        sort BIGINT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS tb_user (
        id BIGINT PRIMARY KEY,
        phone VARCHAR(16) NOT NULL UNIQUE,
        nick_name VARCHAR(64) NOT NULL,
        icon VARCHAR(255),
        create_time BIGINT NOT NULL
    )",
];

fn statement(backend: DatabaseBackend, sql: &str, values: Vec<Value>) -> Statement {
    Statement::from_sql_and_values(backend, bind_placeholders(backend, sql), values)
}

fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

fn from_epoch(secs: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .ok_or_else(|| DealError::DatabaseError(format!("invalid timestamp {}", secs)))
}

fn voucher_from_row(row: &QueryResult) -> Result<SeckillVoucher> {
    Ok(SeckillVoucher {
        voucher_id: row.try_get("", "voucher_id")?,
        stock: row.try_get("", "stock")?,
        begin_time: from_epoch(row.try_get("", "begin_time")?)?,
        end_time: from_epoch(row.try_get("", "end_time")?)?,
    })
}

fn shop_from_row(row: &QueryResult) -> Result<Shop> {
    Ok(Shop {
        id: row.try_get("", "id")?,
        name: row.try_get("", "name")?,
        type_id: row.try_get("", "type_id")?,
        area: row.try_get("", "area")?,
        address: row.try_get("", "address")?,
        avg_price: row.try_get("", "avg_price")?,
        sold: row.try_get("", "sold")?,
        comments: row.try_get("", "comments")?,
        score: row.try_get("", "score")?,
        open_hours: row.try_get("", "open_hours")?,
    })
}

fn shop_type_from_row(row: &QueryResult) -> Result<ShopType> {
    Ok(ShopType {
        id: row.try_get("", "id")?,
        name: row.try_get("", "name")?,
        icon: row.try_get("", "icon")?,
        sort: row.try_get("", "sort")?,
    })
}

fn user_from_row(row: &QueryResult) -> Result<User> {
    Ok(User {
        id: row.try_get("", "id")?,
        phone: row.try_get("", "phone")?,
        nick_name: row.try_get("", "nick_name")?,
        icon: row.try_get("", "icon")?,
        create_time: from_epoch(row.try_get("", "create_time")?)?,
    })
}

async fn count_orders_on<C: ConnectionTrait>(
    conn: &C,
    user_id: i64,
    voucher_id: i64,
) -> Result<i64> {
    let row = conn
        .query_one(statement(
            conn.get_database_backend(),
            "SELECT COUNT(*) AS cnt FROM tb_voucher_order WHERE user_id = ? AND voucher_id = ?",
            vec![user_id.into(), voucher_id.into()],
        ))
        .await?;
    match row {
        Some(row) => Ok(row.try_get("", "cnt")?),
        None => Ok(0),
    }
}

/// Sea-ORM持久化实现
#[derive(Clone)]
pub struct SeaOrmRepository {
    connection: Arc<DatabaseConnection>,
    backend: DatabaseBackend,
}

impl std::fmt::Debug for SeaOrmRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SeaOrmRepository")
            .field("backend", &self.backend)
            .finish()
    }
}

impl SeaOrmRepository {
    /// 按配置建立连接池
    #[instrument(skip(config), level = "info", name = "init_database")]
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        ensure_database_directory(&config.url)?;
        let db_type = DatabaseType::from_url(&config.url);

        let mut opt = ConnectOptions::new(config.url.clone());
        opt.max_connections(config.max_connections.max(1))
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .sqlx_logging(false);

        let connection = Database::connect(opt)
            .await
            .map_err(|e| DealError::DatabaseError(format!("Failed to open database: {}", e)))?;
        info!("Connected to {:?} database", db_type);

        Ok(Self {
            connection: Arc::new(connection),
            backend: db_type.backend(),
        })
    }

    pub fn from_connection(connection: DatabaseConnection) -> Self {
        let backend = connection.get_database_backend();
        Self {
            connection: Arc::new(connection),
            backend,
        }
    }

    pub fn backend(&self) -> DatabaseBackend {
        self.backend
    }

    async fn execute(&self, sql: &str, values: Vec<Value>) -> Result<u64> {
        let result = self
            .connection
            .execute(statement(self.backend, sql, values))
            .await?;
        Ok(result.rows_affected())
    }

    async fn query_one<T, F>(&self, sql: &str, values: Vec<Value>, mapper: F) -> Result<Option<T>>
    where
        F: Fn(&QueryResult) -> Result<T>,
    {
        let row = self
            .connection
            .query_one(statement(self.backend, sql, values))
            .await?;
        row.as_ref().map(mapper).transpose()
    }
}

#[async_trait]
impl VoucherRepository for SeaOrmRepository {
    #[instrument(skip(self), level = "debug")]
    async fn find_voucher(&self, voucher_id: i64) -> Result<Option<SeckillVoucher>> {
        self.query_one(
            "SELECT voucher_id, stock, begin_time, end_time FROM tb_seckill_voucher WHERE voucher_id = ?",
            vec![voucher_id.into()],
            voucher_from_row,
        )
        .await
    }

    async fn save_voucher(&self, voucher: &SeckillVoucher) -> Result<()> {
        self.execute(
            "INSERT INTO tb_seckill_voucher (voucher_id, stock, begin_time, end_time) VALUES (?, ?, ?, ?)",
            vec![
                voucher.voucher_id.into(),
                voucher.stock.into(),
                voucher.begin_time.timestamp().into(),
                voucher.end_time.timestamp().into(),
            ],
        )
        .await?;
        Ok(())
    }

    async fn count_orders(&self, user_id: i64, voucher_id: i64) -> Result<i64> {
        count_orders_on(self.connection.as_ref(), user_id, voucher_id).await
    }

    async fn begin(&self) -> Result<Box<dyn OrderTransaction>> {
        let txn = self.connection.begin().await?;
        Ok(Box::new(SeaOrderTransaction { txn }))
    }
}

#[async_trait]
impl ShopRepository for SeaOrmRepository {
    #[instrument(skip(self), level = "debug")]
    async fn find_shop(&self, id: i64) -> Result<Option<Shop>> {
        self.query_one(
            "SELECT id, name, type_id, area, address, avg_price, sold, comments, score, open_hours \
             FROM tb_shop WHERE id = ?",
            vec![id.into()],
            shop_from_row,
        )
        .await
    }

    async fn save_shop(&self, shop: &Shop) -> Result<()> {
        self.execute(
            "INSERT INTO tb_shop (id, name, type_id, area, address, avg_price, sold, comments, score, open_hours) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            vec![
                shop.id.into(),
                shop.name.clone().into(),
                shop.type_id.into(),
                shop.area.clone().into(),
                shop.address.clone().into(),
                shop.avg_price.into(),
                shop.sold.into(),
                shop.comments.into(),
                shop.score.into(),
                shop.open_hours.clone().into(),
            ],
        )
        .await?;
        Ok(())
    }

    #[instrument(skip(self, shop), level = "debug", fields(shop_id = shop.id))]
    async fn update_shop(&self, shop: &Shop) -> Result<u64> {
        self.execute(
            "UPDATE tb_shop SET name = ?, type_id = ?, area = ?, address = ?, avg_price = ?, \
             sold = ?, comments = ?, score = ?, open_hours = ? WHERE id = ?",
            vec![
                shop.name.clone().into(),
                shop.type_id.into(),
                shop.area.clone().into(),
                shop.address.clone().into(),
                shop.avg_price.into(),
                shop.sold.into(),
                shop.comments.into(),
                shop.score.into(),
                shop.open_hours.clone().into(),
                shop.id.into(),
            ],
        )
        .await
    }

    async fn list_shop_types(&self) -> Result<Vec<ShopType>> {
        let rows = self
            .connection
            .query_all(statement(
                self.backend,
                "SELECT id, name, icon, sort FROM tb_shop_type ORDER BY sort ASC",
                vec![],
            ))
            .await?;
        rows.iter().map(shop_type_from_row).collect()
    }

    async fn save_shop_type(&self, shop_type: &ShopType) -> Result<()> {
        self.execute(
            "INSERT INTO tb_shop_type (id, name, icon, sort) VALUES (?, ?, ?, ?)",
            vec![
                shop_type.id.into(),
                shop_type.name.clone().into(),
                shop_type.icon.clone().into(),
                shop_type.sort.into(),
            ],
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl UserRepository for SeaOrmRepository {
    async fn find_user_by_phone(&self, phone: &str) -> Result<Option<User>> {
        self.query_one(
            "SELECT id, phone, nick_name, icon, create_time FROM tb_user WHERE phone = ?",
            vec![phone.into()],
            user_from_row,
        )
        .await
    }

    async fn insert_user(&self, user: &User) -> Result<()> {
        self.connection
            .execute(statement(
                self.backend,
                "INSERT INTO tb_user (id, phone, nick_name, icon, create_time) VALUES (?, ?, ?, ?, ?)",
                vec![
                    user.id.into(),
                    user.phone.clone().into(),
                    user.nick_name.clone().into(),
                    user.icon.clone().into(),
                    user.create_time.timestamp().into(),
                ],
            ))
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    DealError::Duplicate(format!("phone {}", user.phone))
                } else {
                    DealError::SeaOrmError(e)
                }
            })?;
        Ok(())
    }
}

#[async_trait]
impl Persistence for SeaOrmRepository {
    async fn ping(&self) -> Result<()> {
        self.connection.ping().await?;
        Ok(())
    }

    #[instrument(skip(self), level = "info")]
    async fn init_schema(&self) -> Result<()> {
        for ddl in SCHEMA {
            self.connection
                .execute(Statement::from_string(self.backend, ddl.to_string()))
                .await
                .map_err(|e| DealError::DatabaseError(format!("Schema creation failed: {}", e)))?;
        }
        debug!("Schema ready on {:?}", self.backend);
        Ok(())
    }
}

/// Sea-ORM下单事务
///
/// 未提交即被丢弃时由 `DatabaseTransaction` 自动回滚。
struct SeaOrderTransaction {
    txn: DatabaseTransaction,
}

#[async_trait]
impl OrderTransaction for SeaOrderTransaction {
    async fn count_orders(&mut self, user_id: i64, voucher_id: i64) -> Result<i64> {
        count_orders_on(&self.txn, user_id, voucher_id).await
    }

    async fn decrement_stock(&mut self, voucher_id: i64) -> Result<u64> {
        let result = self
            .txn
            .execute(statement(
                self.txn.get_database_backend(),
                "UPDATE tb_seckill_voucher SET stock = stock - 1 WHERE voucher_id = ? AND stock > 0",
                vec![voucher_id.into()],
            ))
            .await?;
        Ok(result.rows_affected())
    }

    async fn save_order(&mut self, order: &VoucherOrder) -> Result<()> {
        self.txn
            .execute(statement(
                self.txn.get_database_backend(),
                "INSERT INTO tb_voucher_order (id, user_id, voucher_id, create_time) VALUES (?, ?, ?, ?)",
                vec![
                    order.id.into(),
                    order.user_id.into(),
                    order.voucher_id.into(),
                    order.create_time.timestamp().into(),
                ],
            ))
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    debug!(
                        "Order for user {} on voucher {} already exists",
                        order.user_id, order.voucher_id
                    );
                    DealError::AlreadyPurchased {
                        user_id: order.user_id,
                        voucher_id: order.voucher_id,
                    }
                } else {
                    DealError::SeaOrmError(e)
                }
            })?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.txn.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.txn.rollback().await?;
        Ok(())
    }
}
