//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了系统的配置结构和解析逻辑。

use crate::error::{DealError, Result};
use secrecy::SecretString;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

pub const CONFIG_VERSION: u32 = 1;

/// 顶层配置
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub config_version: Option<u32>,
    pub store: StoreConfig,
    pub database: DatabaseConfig,
    pub cache: CacheConfig,
    pub rebuild: RebuildConfig,
    pub id: IdConfig,
    pub seckill: SeckillConfig,
    pub shop: ShopConfig,
    pub login: LoginConfig,
    pub telemetry: TelemetryConfig,
}

/// Redis部署模式
#[derive(Deserialize, Clone, Debug, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RedisMode {
    #[default]
    Standalone,
    Cluster,
    Sentinel,
}

/// 键值存储配置
///
/// 定义共享键值存储（Redis）的连接参数
#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct StoreConfig {
    /// Redis模式
    pub mode: RedisMode,
    /// 连接字符串
    pub connection_string: SecretString,
    /// 连接超时时间（毫秒）
    pub connection_timeout_ms: u64,
    /// 命令执行超时时间（毫秒）
    pub command_timeout_ms: u64,
    /// Redis 密码（可选）
    pub password: Option<SecretString>,
    /// 是否启用 TLS
    pub enable_tls: bool,
    /// 哨兵配置
    pub sentinel: Option<SentinelConfig>,
    /// 集群配置
    pub cluster: Option<ClusterConfig>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            mode: RedisMode::Standalone,
            connection_string: SecretString::new("redis://localhost:6379".to_string().into()),
            connection_timeout_ms: 5000,
            command_timeout_ms: 3000,
            password: None,
            enable_tls: false,
            sentinel: None,
            cluster: None,
        }
    }
}

/// 哨兵配置
#[derive(Deserialize, Clone, Debug)]
pub struct SentinelConfig {
    /// 主节点名称
    pub master_name: String,
    /// 哨兵节点列表
    pub nodes: Vec<String>,
}

/// 集群配置
#[derive(Deserialize, Clone, Debug)]
pub struct ClusterConfig {
    /// 初始节点列表
    pub nodes: Vec<String>,
}

/// 数据库配置
#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct DatabaseConfig {
    /// 连接URL，支持 sqlite / mysql / postgres
    pub url: String,
    pub max_connections: u32,
    pub connect_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://oxdeal.db?mode=rwc".to_string(),
            max_connections: 10,
            connect_timeout_ms: 5000,
        }
    }
}

/// 缓存客户端配置
#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct CacheConfig {
    /// 默认缓存过期时间（秒）
    pub default_ttl_secs: u64,
    /// 空值标记的过期时间（秒）
    pub null_ttl_secs: u64,
    /// 重建互斥锁的过期时间（秒）
    pub lock_ttl_secs: u64,
    /// 互斥重建策略中获取锁失败后的退避间隔（毫秒）
    pub mutex_retry_interval_ms: u64,
    /// 互斥重建策略的最大尝试次数
    pub mutex_max_attempts: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl_secs: 1800,
            null_ttl_secs: 120,
            lock_ttl_secs: 10,
            mutex_retry_interval_ms: 50,
            mutex_max_attempts: 100,
        }
    }
}

impl CacheConfig {
    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_secs)
    }

    pub fn null_ttl(&self) -> Duration {
        Duration::from_secs(self.null_ttl_secs)
    }

    pub fn lock_ttl(&self) -> Duration {
        Duration::from_secs(self.lock_ttl_secs)
    }

    pub fn mutex_retry_interval(&self) -> Duration {
        Duration::from_millis(self.mutex_retry_interval_ms)
    }
}

/// 后台重建执行器配置
#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct RebuildConfig {
    /// 并发执行的重建任务数
    pub workers: usize,
    /// 排队与执行中任务的上限
    pub queue_capacity: usize,
    /// 关闭时等待任务完成的超时（毫秒）
    pub shutdown_timeout_ms: u64,
}

impl Default for RebuildConfig {
    fn default() -> Self {
        Self {
            workers: 10,
            queue_capacity: 1024,
            shutdown_timeout_ms: 5000,
        }
    }
}

/// 分布式ID配置
#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct IdConfig {
    /// 时间戳基准（Unix秒）
    pub epoch_base: i64,
    /// 计数器键前缀
    pub key_prefix: String,
    /// 每日计数器的过期时间（秒），0表示不过期
    pub counter_ttl_secs: u64,
}

impl Default for IdConfig {
    fn default() -> Self {
        Self {
            // 2000-01-01T01:01:01Z
            epoch_base: 946_688_461,
            key_prefix: "seq".to_string(),
            counter_ttl_secs: 172_800,
        }
    }
}

/// 秒杀下单配置
#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct SeckillConfig {
    /// 订单ID的业务键
    pub order_business_key: String,
    /// 用户锁的过期时间（秒）
    pub user_lock_ttl_secs: u64,
    /// 获取用户锁失败后的重试间隔（毫秒）
    pub lock_retry_interval_ms: u64,
    /// 获取用户锁的最大尝试次数
    pub lock_max_attempts: u32,
    /// 秒杀券缓存的过期时间（秒）
    pub voucher_cache_ttl_secs: u64,
}

impl Default for SeckillConfig {
    fn default() -> Self {
        Self {
            order_business_key: "order".to_string(),
            user_lock_ttl_secs: 10,
            lock_retry_interval_ms: 20,
            lock_max_attempts: 250,
            voucher_cache_ttl_secs: 60,
        }
    }
}

/// 缓存读取策略
#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReadStrategy {
    /// 空值缓存，防止缓存穿透
    PassThrough,
    /// 互斥锁重建，防止缓存击穿
    Mutex,
    /// 逻辑过期，返回旧值并异步重建
    #[default]
    LogicalExpire,
}

/// 商铺缓存配置
#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct ShopConfig {
    pub read_strategy: ReadStrategy,
    pub ttl_secs: u64,
    pub type_list_ttl_secs: u64,
}

impl Default for ShopConfig {
    fn default() -> Self {
        Self {
            read_strategy: ReadStrategy::LogicalExpire,
            ttl_secs: 1800,
            type_list_ttl_secs: 86_400,
        }
    }
}

/// 登录会话配置
#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct LoginConfig {
    /// 验证码有效期（秒）
    pub code_ttl_secs: u64,
    /// 登录令牌有效期（秒），每次访问都会刷新
    pub token_ttl_secs: u64,
}

impl Default for LoginConfig {
    fn default() -> Self {
        Self {
            code_ttl_secs: 120,
            token_ttl_secs: 1800,
        }
    }
}

/// 日志与链路追踪配置
#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct TelemetryConfig {
    pub service_name: String,
    pub log_filter: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "oxdeal".to_string(),
            log_filter: "info".to_string(),
        }
    }
}

impl Config {
    /// 从TOML文本解析配置并校验
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(content).map_err(|e| DealError::ConfigError(e.to_string()))?;
        config.validate().map_err(DealError::ConfigError)?;
        Ok(config)
    }

    /// 从TOML文件加载配置
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// 验证配置
    ///
    /// 检查配置的有效性，确保所有值在合理范围内
    pub fn validate(&self) -> std::result::Result<(), String> {
        if let Some(version) = self.config_version {
            if version > CONFIG_VERSION {
                return Err(format!(
                    "Configuration version {} is not supported. Current version is {}.",
                    version, CONFIG_VERSION
                ));
            }
        }

        if !(100..=30000).contains(&self.store.connection_timeout_ms) {
            return Err("store.connection_timeout_ms must be between 100 and 30000 ms".to_string());
        }
        if !(100..=60000).contains(&self.store.command_timeout_ms) {
            return Err("store.command_timeout_ms must be between 100 and 60000 ms".to_string());
        }
        match self.store.mode {
            RedisMode::Cluster if self.store.cluster.is_none() => {
                return Err("store.cluster is required in cluster mode".to_string());
            }
            RedisMode::Sentinel if self.store.sentinel.is_none() => {
                return Err("store.sentinel is required in sentinel mode".to_string());
            }
            _ => {}
        }

        if self.database.url.is_empty() {
            return Err("database.url cannot be empty".to_string());
        }
        if self.database.max_connections == 0 {
            return Err("database.max_connections cannot be zero".to_string());
        }

        if self.cache.default_ttl_secs == 0 {
            return Err("cache.default_ttl_secs cannot be zero".to_string());
        }
        if self.cache.default_ttl_secs > 86400 * 30 {
            return Err("cache.default_ttl_secs cannot exceed 30 days".to_string());
        }
        if self.cache.null_ttl_secs == 0 {
            return Err("cache.null_ttl_secs cannot be zero".to_string());
        }
        if self.cache.null_ttl_secs > self.cache.default_ttl_secs {
            return Err(format!(
                "cache.null_ttl_secs ({}) must be <= cache.default_ttl_secs ({})",
                self.cache.null_ttl_secs, self.cache.default_ttl_secs
            ));
        }
        if self.cache.lock_ttl_secs == 0 {
            return Err("cache.lock_ttl_secs cannot be zero".to_string());
        }
        if self.cache.mutex_max_attempts == 0 {
            return Err("cache.mutex_max_attempts cannot be zero".to_string());
        }

        if self.rebuild.workers == 0 {
            return Err("rebuild.workers cannot be zero".to_string());
        }
        if self.rebuild.queue_capacity < self.rebuild.workers {
            return Err(format!(
                "rebuild.queue_capacity ({}) must be >= rebuild.workers ({})",
                self.rebuild.queue_capacity, self.rebuild.workers
            ));
        }

        if self.id.epoch_base < 0 {
            return Err("id.epoch_base cannot be negative".to_string());
        }
        if self.id.key_prefix.is_empty() {
            return Err("id.key_prefix cannot be empty".to_string());
        }

        if self.seckill.order_business_key.is_empty() {
            return Err("seckill.order_business_key cannot be empty".to_string());
        }
        if self.seckill.user_lock_ttl_secs == 0 {
            return Err("seckill.user_lock_ttl_secs cannot be zero".to_string());
        }
        if self.seckill.lock_max_attempts == 0 {
            return Err("seckill.lock_max_attempts cannot be zero".to_string());
        }

        if self.shop.ttl_secs == 0 || self.shop.type_list_ttl_secs == 0 {
            return Err("shop TTLs cannot be zero".to_string());
        }
        if self.login.code_ttl_secs == 0 || self.login.token_ttl_secs == 0 {
            return Err("login TTLs cannot be zero".to_string());
        }

        Ok(())
    }
}
