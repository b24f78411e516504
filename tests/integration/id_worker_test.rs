//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 分布式ID生成器集成测试

#[path = "../common/mod.rs"]
mod common;

use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use common::setup_logging;
use oxdeal::backend::MemoryStore;
use oxdeal::config::IdConfig;
use oxdeal::IdGenerator;
use std::collections::HashSet;
use std::sync::Arc;

fn generator() -> IdGenerator {
    IdGenerator::new(Arc::new(MemoryStore::new()), &IdConfig::default())
}

#[tokio::test]
async fn test_sequential_ids_strictly_increase() {
    setup_logging();
    let ids = generator();
    let mut previous = 0;
    for _ in 0..1000 {
        let id = ids.next_id("order").await.unwrap();
        assert!(id > previous, "{} should be greater than {}", id, previous);
        previous = id;
    }
}

#[tokio::test]
async fn test_ids_across_days_are_ordered_by_timestamp() {
    setup_logging();
    let ids = generator();
    let day_one = Utc.with_ymd_and_hms(2026, 10, 14, 23, 59, 59).unwrap();
    let day_two = day_one + ChronoDuration::seconds(1);

    let mut last_of_day_one = 0;
    for _ in 0..50 {
        last_of_day_one = ids.next_id_at("order", day_one).await.unwrap();
    }
    let first_of_day_two = ids.next_id_at("order", day_two).await.unwrap();

    assert_eq!(IdGenerator::decompose(first_of_day_two).1, 1);
    assert_eq!(IdGenerator::decompose(last_of_day_one).1, 50);
    assert!(first_of_day_two > last_of_day_one);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_generators_never_collide() {
    setup_logging();
    let store = Arc::new(MemoryStore::new());
    let mut handles = Vec::new();
    for _ in 0..8 {
        // 每个任务模拟一个独立进程，只共享存储
        let ids = IdGenerator::new(store.clone(), &IdConfig::default());
        handles.push(tokio::spawn(async move {
            let mut allocated = Vec::with_capacity(250);
            for _ in 0..250 {
                allocated.push(ids.next_id("order").await.unwrap());
            }
            allocated
        }));
    }

    let mut seen = HashSet::new();
    for handle in handles {
        for id in handle.await.unwrap() {
            assert!(seen.insert(id), "duplicate id {}", id);
        }
    }
    assert_eq!(seen.len(), 2000);
}

#[tokio::test]
async fn test_business_keys_have_independent_sequences() {
    setup_logging();
    let ids = generator();
    let at = Utc.with_ymd_and_hms(2026, 10, 15, 9, 30, 0).unwrap();
    let order = ids.next_id_at("order", at).await.unwrap();
    let user = ids.next_id_at("user", at).await.unwrap();
    assert_eq!(order, user);
    assert_eq!(ids.timestamp_of(order), Some(at));
}
