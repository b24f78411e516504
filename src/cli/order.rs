//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 秒杀下单命令。

use crate::config::Config;
use crate::platform::Platform;
use anyhow::Result;
use clap::Parser;

#[derive(Parser, Debug)]
pub struct PurchaseArgs {
    #[arg(long, help = "Seckill voucher id")]
    pub voucher: i64,

    #[arg(long, help = "Purchasing user id")]
    pub user: i64,
}

pub async fn execute(config: Config, args: &PurchaseArgs) -> Result<()> {
    let platform = Platform::connect(config).await?;
    let outcome = platform.seckill().purchase(args.voucher, args.user).await;
    platform.shutdown().await?;

    match outcome {
        Ok(order_id) => {
            println!("✅ Order {} created", order_id);
            Ok(())
        }
        Err(e) if e.is_rejection() => {
            println!("❌ Rejected: {}", e);
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
