//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了JSON序列化器的实现。

use super::Serializer;
use crate::error::{DealError, Result};
use serde::{de::DeserializeOwned, Serialize};

/// JSON序列化器
///
/// 实现基于serde_json的序列化和反序列化
#[derive(Clone, Debug, Default)]
pub struct JsonSerializer;

impl Serializer for JsonSerializer {
    /// 序列化值为JSON文本
    ///
    /// # 参数
    ///
    /// * `value` - 要序列化的值
    ///
    /// # 返回值
    ///
    /// 返回序列化后的JSON文本或错误
    fn serialize<T: Serialize>(&self, value: &T) -> Result<String> {
        serde_json::to_string(value).map_err(|e| DealError::Serialization(e.to_string()))
    }

    /// 从JSON文本反序列化值
    ///
    /// # 参数
    ///
    /// * `data` - 要反序列化的JSON文本
    ///
    /// # 返回值
    ///
    /// 返回反序列化后的值或错误
    fn deserialize<T: DeserializeOwned>(&self, data: &str) -> Result<T> {
        serde_json::from_str(data).map_err(|e| DealError::Serialization(e.to_string()))
    }
}
