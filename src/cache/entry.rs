//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了缓存条目的两种物理编码。

use crate::error::{DealError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 逻辑过期条目
///
/// 过期时间与数据一同存储，由缓存层判断是否过期；存储层不设TTL。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogicalEntry<T> {
    pub data: T,
    pub expire_time: DateTime<Utc>,
}

impl<T> LogicalEntry<T> {
    /// 创建在 `now + ttl` 过期的条目
    pub fn new(data: T, ttl: Duration) -> Result<Self> {
        Self::expiring_at(data, Utc::now(), ttl)
    }

    pub fn expiring_at(data: T, now: DateTime<Utc>, ttl: Duration) -> Result<Self> {
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| DealError::Validation(format!("invalid logical ttl: {}", e)))?;
        let expire_time = now
            .checked_add_signed(ttl)
            .ok_or_else(|| DealError::Validation("logical ttl overflows".to_string()))?;
        Ok(Self { data, expire_time })
    }

    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expire_time > now
    }
}

/// 普通条目的读取结果
///
/// 空文本是负缓存标记，表示数据源中确认不存在，与键不存在（未命中）不同。
#[derive(Debug, Clone, PartialEq)]
pub enum Cached<T> {
    Hit(T),
    Negative,
    Miss,
}

/// 负缓存标记
pub const NULL_MARKER: &str = "";

pub(crate) fn is_null_marker(raw: &str) -> bool {
    raw.trim().is_empty()
}
