//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了运维命令行接口。

use crate::config::Config;
use crate::telemetry;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "oxdeal")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[arg(
        short,
        long,
        global = true,
        help = "Path to the TOML configuration file (defaults are used when omitted)"
    )]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(name = "status", about = "Check store and database connectivity")]
    Status(StatusArgs),

    #[command(name = "init-schema", about = "Create missing database tables")]
    InitSchema,

    #[command(name = "next-id", about = "Allocate ids from the distributed generator")]
    NextId(NextIdArgs),

    #[command(name = "warmup-shop", about = "Pre-warm a logical-expiry shop cache entry")]
    WarmupShop(WarmupShopArgs),

    #[command(name = "purchase", about = "Run a seckill purchase")]
    Purchase(PurchaseArgs),
}

#[derive(Parser, Debug)]
pub struct StatusArgs {
    #[arg(short, long, help = "Show detailed information")]
    pub verbose: bool,
}

mod admin;
mod order;
mod status;

pub use admin::{NextIdArgs, WarmupShopArgs};
pub use order::PurchaseArgs;

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    match path {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display())),
        None => Ok(Config::default()),
    }
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;
    telemetry::init_from_config(&config.telemetry);

    match &cli.command {
        Commands::Status(args) => status::execute(&config, args).await,
        Commands::InitSchema => admin::execute_init_schema(&config).await,
        Commands::NextId(args) => admin::execute_next_id(config, args).await,
        Commands::WarmupShop(args) => admin::execute_warmup_shop(config, args).await,
        Commands::Purchase(args) => order::execute(config, args).await,
    }
}
