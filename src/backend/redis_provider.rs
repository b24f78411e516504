//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了Redis连接提供者接口和默认实现。

use crate::{
    config::StoreConfig,
    error::{DealError, Result},
};
use async_trait::async_trait;
use redis::{aio::ConnectionManager, Client};
use secrecy::ExposeSecret;
use tokio::time::{timeout, Duration};
use tracing::info;

/// Redis连接提供者
///
/// 负责按部署模式建立连接，测试中可以替换为不依赖真实Redis的实现
#[async_trait]
pub trait RedisProvider: Send + Sync {
    async fn get_standalone_client(
        &self,
        config: &StoreConfig,
    ) -> Result<(Client, ConnectionManager)>;
    async fn get_cluster_client(
        &self,
        config: &StoreConfig,
    ) -> Result<redis::cluster::ClusterClient>;
    async fn get_sentinel_client(&self, config: &StoreConfig)
        -> Result<(Client, ConnectionManager)>;
}

pub struct DefaultRedisProvider;

fn connection_url(config: &StoreConfig) -> String {
    let raw = config.connection_string.expose_secret();
    if config.enable_tls && !raw.starts_with("rediss://") {
        raw.replace("redis://", "rediss://")
    } else {
        raw.to_string()
    }
}

async fn connect_manager(client: &Client, timeout_ms: u64) -> Result<ConnectionManager> {
    match timeout(
        Duration::from_millis(timeout_ms),
        client.get_connection_manager(),
    )
    .await
    {
        Ok(res) => Ok(res?),
        Err(_) => Err(DealError::Timeout(format!(
            "Redis connection timed out after {}ms",
            timeout_ms
        ))),
    }
}

#[async_trait]
impl RedisProvider for DefaultRedisProvider {
    async fn get_standalone_client(
        &self,
        config: &StoreConfig,
    ) -> Result<(Client, ConnectionManager)> {
        let client = Client::open(connection_url(config).as_str())?;
        let manager = connect_manager(&client, config.connection_timeout_ms).await?;
        Ok((client, manager))
    }

    async fn get_cluster_client(
        &self,
        config: &StoreConfig,
    ) -> Result<redis::cluster::ClusterClient> {
        let cluster_config = config.cluster.as_ref().ok_or_else(|| {
            DealError::ConfigError("Cluster configuration is missing".to_string())
        })?;

        let mut builder = redis::cluster::ClusterClient::builder(cluster_config.nodes.clone());
        if let Some(password) = &config.password {
            builder = builder.password(password.expose_secret().to_string());
        }
        let client = builder.build()?;

        timeout(
            Duration::from_millis(config.connection_timeout_ms),
            client.get_async_connection(),
        )
        .await
        .map_err(|_| {
            DealError::Timeout(format!(
                "Cluster connection timed out after {}ms",
                config.connection_timeout_ms
            ))
        })??;
        Ok(client)
    }

    async fn get_sentinel_client(
        &self,
        config: &StoreConfig,
    ) -> Result<(Client, ConnectionManager)> {
        let sentinel_config = config.sentinel.as_ref().ok_or_else(|| {
            DealError::ConfigError("Sentinel configuration is missing".to_string())
        })?;

        info!("Initializing Sentinel client with automatic failover support");

        // redis+sentinel://[:password@]host:port[,host:port]/service_name
        let mut url = "redis+sentinel://".to_string();
        if let Some(password) = &config.password {
            url.push_str(&format!(":{}@", password.expose_secret()));
        }

        let nodes: Vec<String> = sentinel_config
            .nodes
            .iter()
            .map(|n| {
                n.trim_start_matches("redis://")
                    .trim_start_matches("redis+sentinel://")
                    .to_string()
            })
            .collect();
        if nodes.is_empty() {
            return Err(DealError::ConfigError(
                "No sentinel nodes provided".to_string(),
            ));
        }

        url.push_str(&nodes.join(","));
        url.push('/');
        url.push_str(&sentinel_config.master_name);

        let client = Client::open(url)?;
        let manager = connect_manager(&client, config.connection_timeout_ms).await?;
        Ok((client, manager))
    }
}
