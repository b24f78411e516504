//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了管理员操作命令的实现。

use crate::config::Config;
use crate::database::{Persistence, SeaOrmRepository};
use crate::id_worker::IdGenerator;
use crate::platform::Platform;
use anyhow::{Context, Result};
use clap::Parser;
use std::time::Duration;

#[derive(Parser, Debug)]
pub struct NextIdArgs {
    #[arg(help = "Business key the counter is scoped to")]
    pub business_key: String,

    #[arg(short = 'n', long, default_value_t = 1, help = "Number of ids to allocate")]
    pub count: u32,

    #[arg(long, help = "Also print the timestamp and sequence parts")]
    pub decompose: bool,
}

#[derive(Parser, Debug)]
pub struct WarmupShopArgs {
    #[arg(long, help = "Shop id")]
    pub id: i64,

    #[arg(long, default_value_t = 1800, help = "Logical expiry in seconds")]
    pub ttl: u64,
}

pub async fn execute_init_schema(config: &Config) -> Result<()> {
    let repo = SeaOrmRepository::connect(&config.database)
        .await
        .context("Failed to connect to the database")?;
    repo.init_schema().await?;
    println!("✅ Schema is ready ({:?})", repo.backend());
    Ok(())
}

pub async fn execute_next_id(config: Config, args: &NextIdArgs) -> Result<()> {
    let platform = Platform::connect(config).await?;
    for _ in 0..args.count {
        let id = platform.ids().next_id(&args.business_key).await?;
        if args.decompose {
            let (elapsed, sequence) = IdGenerator::decompose(id);
            let at = platform
                .ids()
                .timestamp_of(id)
                .map(|t| t.to_rfc3339())
                .unwrap_or_default();
            println!("{}\t{}s\t#{}\t{}", id, elapsed, sequence, at);
        } else {
            println!("{}", id);
        }
    }
    platform.shutdown().await?;
    Ok(())
}

pub async fn execute_warmup_shop(config: Config, args: &WarmupShopArgs) -> Result<()> {
    let platform = Platform::connect(config).await?;
    let found = platform
        .shops()
        .save_shop_to_cache(args.id, Duration::from_secs(args.ttl))
        .await
        .with_context(|| format!("Failed to warm shop {}", args.id))?;
    platform.shutdown().await?;
    if found {
        println!("✅ Shop {} cached for {}s", args.id, args.ttl);
    } else {
        println!("Shop {} does not exist, nothing cached", args.id);
    }
    Ok(())
}
