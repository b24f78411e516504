//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 分布式锁集成测试

#[path = "../common/mod.rs"]
mod common;

use common::setup_logging;
use oxdeal::backend::{KvStore, MemoryStore};
use oxdeal::lock::{DistributedLock, LockOwner};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn lock() -> (Arc<MemoryStore>, DistributedLock) {
    let store = Arc::new(MemoryStore::new());
    (store.clone(), DistributedLock::new(store))
}

#[tokio::test]
async fn test_second_acquire_fails_until_release() {
    setup_logging();
    let (_, lock) = lock();
    let a = lock.owner();
    let b = lock.owner();

    assert!(lock
        .try_acquire("shop:1", &a, Duration::from_secs(10))
        .await
        .unwrap());
    assert!(!lock
        .try_acquire("shop:1", &b, Duration::from_secs(10))
        .await
        .unwrap());

    assert!(lock.release("shop:1", &a).await.unwrap());
    assert!(lock
        .try_acquire("shop:1", &b, Duration::from_secs(10))
        .await
        .unwrap());
}

#[tokio::test]
async fn test_release_by_non_owner_is_a_no_op() {
    setup_logging();
    let (store, lock) = lock();
    let holder = lock.owner();
    lock.try_acquire("order:5", &holder, Duration::from_secs(10))
        .await
        .unwrap();

    let stranger = LockOwner::new("someone-else");
    assert!(!lock.release("order:5", &stranger).await.unwrap());
    assert_eq!(
        store.get("lock:order:5").await.unwrap().as_deref(),
        Some(holder.as_str())
    );
}

/// 持有者A的锁在TTL后过期并被B获取，A延迟执行的释放不能删除B的锁
#[tokio::test]
async fn test_delayed_release_does_not_steal_new_holders_lock() {
    setup_logging();
    let (store, lock) = lock();
    let a = lock.owner();
    let b = lock.owner();

    assert!(lock
        .try_acquire("shop:9", &a, Duration::from_secs(1))
        .await
        .unwrap());
    tokio::time::sleep(Duration::from_secs(2)).await;

    assert!(lock
        .try_acquire("shop:9", &b, Duration::from_secs(10))
        .await
        .unwrap());
    assert!(!lock.release("shop:9", &a).await.unwrap());

    assert_eq!(lock.holder("shop:9").await.unwrap(), Some(b.clone()));
    assert!(store.get("lock:shop:9").await.unwrap().is_some());
    assert!(lock.release("shop:9", &b).await.unwrap());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_exactly_one_concurrent_acquirer_wins() {
    setup_logging();
    let (_, lock) = lock();
    let winners = Arc::new(AtomicU32::new(0));

    let mut handles = Vec::new();
    for _ in 0..64 {
        let lock = lock.clone();
        let winners = winners.clone();
        handles.push(tokio::spawn(async move {
            let owner = lock.owner();
            if lock
                .try_acquire("hot", &owner, Duration::from_secs(10))
                .await
                .unwrap()
            {
                winners.fetch_add(1, Ordering::SeqCst);
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }
    assert_eq!(winners.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_processes_sharing_a_store_exclude_each_other() {
    setup_logging();
    let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
    let node_a = DistributedLock::with_instance_id(store.clone(), "node-a");
    let node_b = DistributedLock::with_instance_id(store, "node-b");

    let owner_a = node_a.owner();
    let owner_b = node_b.owner();
    assert!(node_a
        .try_acquire("order:1", &owner_a, Duration::from_secs(10))
        .await
        .unwrap());
    assert!(!node_b
        .try_acquire("order:1", &owner_b, Duration::from_secs(10))
        .await
        .unwrap());
    assert!(!node_b.release("order:1", &owner_b).await.unwrap());
    assert!(node_a.release("order:1", &owner_a).await.unwrap());
}
