//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了结构化记录与文本之间的序列化机制。

pub mod json;

use crate::error::Result;
use serde::{de::DeserializeOwned, Serialize};

pub use json::JsonSerializer;

/// 序列化器特征
///
/// 键值存储中的值都是文本，序列化器负责记录与文本之间的转换
pub trait Serializer: Send + Sync {
    /// 序列化值为文本
    fn serialize<T: Serialize>(&self, value: &T) -> Result<String>;

    /// 从文本反序列化值
    fn deserialize<T: DeserializeOwned>(&self, data: &str) -> Result<T>;
}

/// 序列化器枚举
///
/// 用于在运行时按配置选择序列化器
#[derive(Clone, Debug)]
pub enum SerializerEnum {
    Json(JsonSerializer),
}

impl Default for SerializerEnum {
    fn default() -> Self {
        SerializerEnum::Json(JsonSerializer)
    }
}

impl Serializer for SerializerEnum {
    fn serialize<T: Serialize>(&self, value: &T) -> Result<String> {
        match self {
            SerializerEnum::Json(s) => s.serialize(value),
        }
    }

    fn deserialize<T: DeserializeOwned>(&self, data: &str) -> Result<T> {
        match self {
            SerializerEnum::Json(s) => s.deserialize(data),
        }
    }
}
