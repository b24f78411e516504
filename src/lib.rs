//! oxdeal - 缓存一致性与并发控制库
//!
//! 提供基于共享键值存储的旁路缓存（透传、互斥重建、逻辑过期三种读策略）、
//! 分布式互斥锁、分布式ID生成器，以及保证不超卖、一人一单的秒杀下单流程。

#![doc(html_root_url = "https://docs.rs/oxdeal/0.1.0")]

pub use serde;
pub use serde::{Deserialize, Serialize};
pub use serde_json;
pub use tokio;

pub mod backend;
pub mod cache;
pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod id_worker;
pub mod lock;
pub mod metrics;
pub mod platform;
pub mod seckill;
pub mod serialization;
pub mod service;
pub mod telemetry;

// Re-export commonly used items
pub use backend::{KvStore, MemoryStore, RedisStore};
pub use cache::{CacheClient, RebuildExecutor};
pub use config::Config;
pub use error::{DealError, Result};
pub use id_worker::IdGenerator;
pub use lock::{DistributedLock, LockOwner};
pub use platform::Platform;
pub use seckill::SeckillOrderWorkflow;

/// oxdeal 版本号
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
