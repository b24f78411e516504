//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 连通性检查命令。

use crate::backend::{KvStore, RedisStore};
use crate::cli::StatusArgs;
use crate::config::Config;
use crate::database::{DatabaseType, Persistence, SeaOrmRepository};
use anyhow::{bail, Result};
use std::time::Instant;

pub async fn execute(config: &Config, args: &StatusArgs) -> Result<()> {
    println!("=== oxdeal Status ===\n");

    let started = Instant::now();
    let store_ok = match RedisStore::new(&config.store).await {
        Ok(store) => match store.ping().await {
            Ok(()) => {
                print_line("Store", "✅ HEALTHY", started, args.verbose);
                true
            }
            Err(e) => {
                print_line("Store", &format!("❌ UNREACHABLE ({})", e), started, args.verbose);
                false
            }
        },
        Err(e) => {
            print_line("Store", &format!("❌ UNREACHABLE ({})", e), started, args.verbose);
            false
        }
    };
    if args.verbose {
        println!("  Mode: {:?}", config.store.mode);
    }

    let started = Instant::now();
    let database_ok = match SeaOrmRepository::connect(&config.database).await {
        Ok(repo) => match repo.ping().await {
            Ok(()) => {
                print_line("Database", "✅ HEALTHY", started, args.verbose);
                true
            }
            Err(e) => {
                print_line("Database", &format!("❌ UNREACHABLE ({})", e), started, args.verbose);
                false
            }
        },
        Err(e) => {
            print_line("Database", &format!("❌ UNREACHABLE ({})", e), started, args.verbose);
            false
        }
    };
    if args.verbose {
        println!("  Type: {:?}", DatabaseType::from_url(&config.database.url));
    }

    if !(store_ok && database_ok) {
        bail!("one or more dependencies are unavailable");
    }
    Ok(())
}

fn print_line(name: &str, status: &str, started: Instant, verbose: bool) {
    if verbose {
        println!(
            "{:<9} {} in {}ms",
            format!("{}:", name),
            status,
            started.elapsed().as_millis()
        );
    } else {
        println!("{:<9} {}", format!("{}:", name), status);
    }
}
