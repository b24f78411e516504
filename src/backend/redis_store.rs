//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了基于Redis的共享键值存储实现。

use super::redis_provider::{DefaultRedisProvider, RedisProvider};
use super::KvStore;
use crate::config::{RedisMode, StoreConfig};
use crate::error::{DealError, Result};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{FromRedisValue, Script};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

/// 比较后删除脚本，读取、比较和删除在服务端一次完成
const COMPARE_AND_DELETE_SCRIPT: &str = r#"
if redis.call("get", KEYS[1]) == ARGV[1] then
    return redis.call("del", KEYS[1])
else
    return 0
end
"#;

#[derive(Clone)]
enum Connection {
    Standalone(ConnectionManager),
    Cluster(redis::cluster::ClusterClient),
}

/// Redis键值存储
///
/// 单机与哨兵模式共用 ConnectionManager（自动重连），集群模式按命令获取连接。
/// 每条命令都受 `command_timeout_ms` 约束，超时以 `DealError::Timeout` 返回。
#[derive(Clone)]
pub struct RedisStore {
    connection: Connection,
    compare_and_delete: Arc<Script>,
    command_timeout: Duration,
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.connection {
            Connection::Standalone(_) => write!(f, "RedisStore::Standalone"),
            Connection::Cluster(_) => write!(f, "RedisStore::Cluster"),
        }
    }
}

fn ttl_millis(ttl: Duration) -> u64 {
    (ttl.as_millis() as u64).max(1)
}

impl RedisStore {
    /// 创建新的Redis存储实例
    #[instrument(skip(config), level = "info", name = "init_redis_store")]
    pub async fn new(config: &StoreConfig) -> Result<Self> {
        Self::new_with_provider(config, Arc::new(DefaultRedisProvider)).await
    }

    /// 使用指定的Redis提供者创建存储实例
    #[instrument(skip(config, provider), level = "info", fields(mode = ?config.mode))]
    pub async fn new_with_provider(
        config: &StoreConfig,
        provider: Arc<dyn RedisProvider>,
    ) -> Result<Self> {
        debug!("Initializing RedisStore with mode: {:?}", config.mode);
        let connection = match config.mode {
            RedisMode::Standalone => {
                let (_client, manager) = provider.get_standalone_client(config).await?;
                Connection::Standalone(manager)
            }
            RedisMode::Sentinel => {
                let (_client, manager) = provider.get_sentinel_client(config).await?;
                Connection::Standalone(manager)
            }
            RedisMode::Cluster => Connection::Cluster(provider.get_cluster_client(config).await?),
        };
        Ok(Self {
            connection,
            compare_and_delete: Arc::new(Script::new(COMPARE_AND_DELETE_SCRIPT)),
            command_timeout: Duration::from_millis(config.command_timeout_ms),
        })
    }

    async fn with_timeout<T, F>(&self, op: &str, fut: F) -> Result<T>
    where
        F: Future<Output = redis::RedisResult<T>>,
    {
        match tokio::time::timeout(self.command_timeout, fut).await {
            Ok(res) => Ok(res?),
            Err(_) => Err(DealError::Timeout(format!(
                "{} did not complete within {}ms",
                op,
                self.command_timeout.as_millis()
            ))),
        }
    }

    async fn query<T: FromRedisValue>(&self, op: &str, cmd: &redis::Cmd) -> Result<T> {
        self.with_timeout(op, async {
            match &self.connection {
                Connection::Standalone(manager) => {
                    let mut conn = manager.clone();
                    cmd.query_async(&mut conn).await
                }
                Connection::Cluster(client) => {
                    let mut conn = client.get_async_connection().await?;
                    cmd.query_async(&mut conn).await
                }
            }
        })
        .await
    }
}

#[async_trait]
impl KvStore for RedisStore {
    #[instrument(skip(self), level = "debug")]
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.query("GET", redis::cmd("GET").arg(key)).await
    }

    #[instrument(skip(self, value), level = "debug", fields(value_len = value.len()))]
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        if let Some(ttl) = ttl {
            cmd.arg("PX").arg(ttl_millis(ttl));
        }
        self.query::<()>("SET", &cmd).await
    }

    #[instrument(skip(self), level = "debug")]
    async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> Result<bool> {
        let result: Option<String> = self
            .query(
                "SET NX",
                redis::cmd("SET")
                    .arg(key)
                    .arg(value)
                    .arg("NX")
                    .arg("PX")
                    .arg(ttl_millis(ttl)),
            )
            .await?;
        debug!("SET NX result: key={}, success={}", key, result.is_some());
        Ok(result.is_some())
    }

    #[instrument(skip(self), level = "debug")]
    async fn delete(&self, key: &str) -> Result<bool> {
        let removed: i64 = self.query("DEL", redis::cmd("DEL").arg(key)).await?;
        Ok(removed > 0)
    }

    #[instrument(skip(self), level = "debug")]
    async fn incr(&self, key: &str) -> Result<i64> {
        self.query("INCR", redis::cmd("INCR").arg(key)).await
    }

    #[instrument(skip(self, fields), level = "debug", fields(field_count = fields.len()))]
    async fn hset_all(&self, key: &str, fields: &[(String, String)]) -> Result<()> {
        if fields.is_empty() {
            return Ok(());
        }
        let mut cmd = redis::cmd("HSET");
        cmd.arg(key);
        for (field, value) in fields {
            cmd.arg(field).arg(value);
        }
        let _: i64 = self.query("HSET", &cmd).await?;
        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    async fn hget_all(&self, key: &str) -> Result<HashMap<String, String>> {
        self.query("HGETALL", redis::cmd("HGETALL").arg(key)).await
    }

    #[instrument(skip(self), level = "debug")]
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        let updated: i64 = self
            .query("PEXPIRE", redis::cmd("PEXPIRE").arg(key).arg(ttl_millis(ttl)))
            .await?;
        Ok(updated == 1)
    }

    #[instrument(skip(self), level = "debug")]
    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool> {
        let script = self.compare_and_delete.clone();
        let removed: i64 = self
            .with_timeout("EVALSHA compare_and_delete", async {
                match &self.connection {
                    Connection::Standalone(manager) => {
                        let mut conn = manager.clone();
                        script.key(key).arg(expected).invoke_async(&mut conn).await
                    }
                    Connection::Cluster(client) => {
                        let mut conn = client.get_async_connection().await?;
                        script.key(key).arg(expected).invoke_async(&mut conn).await
                    }
                }
            })
            .await?;
        Ok(removed == 1)
    }

    #[instrument(skip(self), level = "debug")]
    async fn ping(&self) -> Result<()> {
        let response: String = self.query("PING", &redis::cmd("PING")).await?;
        debug!("RedisStore ping: {}", response);
        Ok(())
    }
}
