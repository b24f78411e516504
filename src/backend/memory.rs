//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了单进程内存键值存储，语义与Redis后端保持一致。

use super::KvStore;
use crate::error::{DealError, Result};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, instrument};

#[derive(Debug, Clone)]
enum Data {
    Text(String),
    Hash(HashMap<String, String>),
}

#[derive(Debug, Clone)]
struct StoredValue {
    data: Data,
    expires_at: Option<Instant>,
}

impl StoredValue {
    fn text(value: &str, ttl: Option<Duration>) -> Self {
        Self {
            data: Data::Text(value.to_string()),
            expires_at: ttl.map(|t| Instant::now() + t),
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        matches!(self.expires_at, Some(at) if now >= at)
    }
}

fn wrong_type(key: &str) -> DealError {
    DealError::Store(format!(
        "WRONGTYPE Operation against key '{}' holding the wrong kind of value",
        key
    ))
}

/// 内存键值存储
///
/// 基于DashMap实现，每个键的读改写都在分片锁内完成，
/// 因此 set-if-absent、自增和比较后删除都是原子的。
/// 过期键在访问时惰性清理。
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<DashMap<String, StoredValue>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取键的剩余生存时间
    ///
    /// 键不存在或没有过期时间时返回 None
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        self.entries.get(key).and_then(|v| match v.expires_at {
            Some(at) if at > now => Some(at - now),
            _ => None,
        })
    }

    /// 当前未过期的键数量
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries.iter().filter(|e| !e.is_expired(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn live(&self, key: &str) -> Option<StoredValue> {
        let now = Instant::now();
        let value = self.entries.get(key).map(|v| v.clone())?;
        if value.is_expired(now) {
            self.entries.remove_if(key, |_, v| v.is_expired(now));
            debug!("MemoryStore: key={} expired, removed", key);
            return None;
        }
        Some(value)
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    #[instrument(skip(self), level = "debug")]
    async fn get(&self, key: &str) -> Result<Option<String>> {
        match self.live(key) {
            Some(StoredValue {
                data: Data::Text(text),
                ..
            }) => Ok(Some(text)),
            Some(_) => Err(wrong_type(key)),
            None => Ok(None),
        }
    }

    #[instrument(skip(self, value), level = "debug")]
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        self.entries
            .insert(key.to_string(), StoredValue::text(value, ttl));
        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> Result<bool> {
        let now = Instant::now();
        let written = match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_expired(now) {
                    occupied.insert(StoredValue::text(value, Some(ttl)));
                    true
                } else {
                    false
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(StoredValue::text(value, Some(ttl)));
                true
            }
        };
        Ok(written)
    }

    #[instrument(skip(self), level = "debug")]
    async fn delete(&self, key: &str) -> Result<bool> {
        let now = Instant::now();
        Ok(self
            .entries
            .remove(key)
            .map(|(_, v)| !v.is_expired(now))
            .unwrap_or(false))
    }

    #[instrument(skip(self), level = "debug")]
    async fn incr(&self, key: &str) -> Result<i64> {
        let now = Instant::now();
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_expired(now) {
                    occupied.insert(StoredValue::text("1", None));
                    return Ok(1);
                }
                let entry = occupied.get_mut();
                let Data::Text(text) = &mut entry.data else {
                    return Err(wrong_type(key));
                };
                let current: i64 = text.parse().map_err(|_| {
                    DealError::Store(format!("value at '{}' is not an integer", key))
                })?;
                let next = current.checked_add(1).ok_or_else(|| {
                    DealError::Store(format!("increment at '{}' would overflow", key))
                })?;
                *text = next.to_string();
                Ok(next)
            }
            Entry::Vacant(vacant) => {
                vacant.insert(StoredValue::text("1", None));
                Ok(1)
            }
        }
    }

    #[instrument(skip(self, fields), level = "debug", fields(field_count = fields.len()))]
    async fn hset_all(&self, key: &str, fields: &[(String, String)]) -> Result<()> {
        let now = Instant::now();
        let fresh = || StoredValue {
            data: Data::Hash(fields.iter().cloned().collect()),
            expires_at: None,
        };
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_expired(now) {
                    occupied.insert(fresh());
                    return Ok(());
                }
                let Data::Hash(map) = &mut occupied.get_mut().data else {
                    return Err(wrong_type(key));
                };
                map.extend(fields.iter().cloned());
            }
            Entry::Vacant(vacant) => {
                vacant.insert(fresh());
            }
        }
        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    async fn hget_all(&self, key: &str) -> Result<HashMap<String, String>> {
        match self.live(key) {
            Some(StoredValue {
                data: Data::Hash(map),
                ..
            }) => Ok(map),
            Some(_) => Err(wrong_type(key)),
            None => Ok(HashMap::new()),
        }
    }

    #[instrument(skip(self), level = "debug")]
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        let now = Instant::now();
        match self.entries.get_mut(key) {
            Some(mut entry) if !entry.is_expired(now) => {
                entry.expires_at = Some(now + ttl);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    #[instrument(skip(self), level = "debug")]
    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool> {
        let now = Instant::now();
        let removed = self.entries.remove_if(key, |_, v| {
            !v.is_expired(now) && matches!(&v.data, Data::Text(text) if text == expected)
        });
        Ok(removed.is_some())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
