//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了缓存与秒杀系统的错误类型和处理机制。

use thiserror::Error;

/// 系统错误类型枚举
///
/// 业务拒绝（时间窗口、库存不足、重复下单）与基础设施故障（存储、数据库不可达）
/// 是不同的变体，调用方不会把基础设施故障误判为"不存在"。
#[derive(Error, Debug)]
pub enum DealError {
    /// 序列化错误
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// 输入校验失败
    #[error("Validation error: {0}")]
    Validation(String),

    /// 资源不存在
    #[error("Not found: {0}")]
    NotFound(String),

    /// 秒杀券不存在
    #[error("Voucher {0} does not exist")]
    VoucherNotFound(i64),

    /// 当前时间不在秒杀时间窗口内
    #[error("Voucher {voucher_id} is not on sale: {reason}")]
    TimeWindow { voucher_id: i64, reason: String },

    /// 库存不足
    #[error("Voucher {0} is out of stock")]
    OutOfStock(i64),

    /// 用户已购买过该秒杀券
    #[error("User {user_id} already purchased voucher {voucher_id}")]
    AlreadyPurchased { user_id: i64, voucher_id: i64 },

    /// 锁竞争在有限重试后仍未成功
    #[error("Lock contention: {0}")]
    Contention(String),

    /// ID生成失败
    #[error("ID generation failed: {0}")]
    IdGeneration(String),

    /// 配置错误
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// 键值存储操作失败
    #[error("Store operation failed: {0}")]
    Store(String),

    /// Redis错误
    #[error("Redis error: {0}")]
    RedisError(#[from] redis::RedisError),

    /// Sea-ORM数据库错误
    #[error("Sea-ORM error: {0}")]
    SeaOrmError(#[from] sea_orm::DbErr),

    /// 唯一约束冲突，记录已被并发写入
    #[error("Duplicate record: {0}")]
    Duplicate(String),

    /// 数据库错误
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// IO错误
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// 超时错误
    #[error("Timeout error: {0}")]
    Timeout(String),

    /// 关闭错误
    #[error("Shutdown error: {0}")]
    ShutdownError(String),
}

impl DealError {
    /// 是否为面向用户的业务拒绝
    ///
    /// 业务拒绝不应重试：时间窗口、库存不足和重复下单都不会因为重试而改变结果。
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            DealError::Validation(_)
                | DealError::NotFound(_)
                | DealError::VoucherNotFound(_)
                | DealError::TimeWindow { .. }
                | DealError::OutOfStock(_)
                | DealError::AlreadyPurchased { .. }
        )
    }

    /// 是否为可重试的失败
    ///
    /// 基础设施故障与锁竞争耗尽都属于可重试失败。
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DealError::Contention(_)
                | DealError::Store(_)
                | DealError::RedisError(_)
                | DealError::SeaOrmError(_)
                | DealError::DatabaseError(_)
                | DealError::IoError(_)
                | DealError::Timeout(_)
        )
    }
}

/// 操作结果类型别名
pub type Result<T> = std::result::Result<T, DealError>;
