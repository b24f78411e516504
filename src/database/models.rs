//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了持久化层的记录类型。

use crate::error::{DealError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 秒杀券
///
/// `stock` 只通过条件扣减修改。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeckillVoucher {
    pub voucher_id: i64,
    pub stock: i64,
    pub begin_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

/// 秒杀订单
///
/// 每个 `(user_id, voucher_id)` 至多一条，创建后不再修改。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoucherOrder {
    pub id: i64,
    pub user_id: i64,
    pub voucher_id: i64,
    pub create_time: DateTime<Utc>,
}

/// 商铺
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shop {
    pub id: i64,
    pub name: String,
    pub type_id: i64,
    pub area: Option<String>,
    pub address: String,
    pub avg_price: i64,
    pub sold: i64,
    pub comments: i64,
    pub score: i64,
    pub open_hours: Option<String>,
}

/// 商铺类型
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShopType {
    pub id: i64,
    pub name: String,
    pub icon: Option<String>,
    pub sort: i64,
}

/// 用户
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub phone: String,
    pub nick_name: String,
    pub icon: Option<String>,
    pub create_time: DateTime<Utc>,
}

impl User {
    /// 以手机号创建新用户，昵称默认为 `用户{phone}`
    pub fn with_phone(id: i64, phone: &str) -> Self {
        Self {
            id,
            phone: phone.to_string(),
            nick_name: format!("用户{}", phone),
            icon: None,
            create_time: Utc::now(),
        }
    }
}

/// 登录会话中保存的用户资料
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDto {
    pub id: i64,
    pub nick_name: String,
    pub icon: Option<String>,
}

impl From<&User> for UserDto {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            nick_name: user.nick_name.clone(),
            icon: user.icon.clone(),
        }
    }
}

impl UserDto {
    /// 转为哈希字段，空值字段不写入
    pub fn to_fields(&self) -> Vec<(String, String)> {
        let mut fields = vec![
            ("id".to_string(), self.id.to_string()),
            ("nick_name".to_string(), self.nick_name.clone()),
        ];
        if let Some(icon) = &self.icon {
            fields.push(("icon".to_string(), icon.clone()));
        }
        fields
    }

    /// 从哈希字段还原
    pub fn from_fields(fields: &HashMap<String, String>) -> Result<Self> {
        let id = fields
            .get("id")
            .ok_or_else(|| DealError::Serialization("session is missing 'id'".to_string()))?
            .parse()
            .map_err(|e| DealError::Serialization(format!("invalid session id: {}", e)))?;
        let nick_name = fields
            .get("nick_name")
            .cloned()
            .ok_or_else(|| DealError::Serialization("session is missing 'nick_name'".to_string()))?;
        Ok(Self {
            id,
            nick_name,
            icon: fields.get("icon").cloned(),
        })
    }
}
