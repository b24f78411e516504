//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 商铺、商铺类型与登录服务集成测试

#[path = "../common/mod.rs"]
mod common;

use common::{memory_platform, setup_logging, test_config};
use oxdeal::backend::KvStore;
use oxdeal::config::ReadStrategy;
use oxdeal::database::{Shop, ShopRepository, ShopType};
use oxdeal::service::shop_type::SHOP_TYPE_LIST_KEY;
use oxdeal::service::ShopService;
use oxdeal::DealError;
use std::time::Duration;

fn shop(id: i64, name: &str) -> Shop {
    Shop {
        id,
        name: name.to_string(),
        type_id: 1,
        area: Some("大关".to_string()),
        address: "金华路锦昌文华苑29号".to_string(),
        avg_price: 80,
        sold: 4215,
        comments: 3035,
        score: 37,
        open_hours: Some("10:00-22:00".to_string()),
    }
}

fn config_with(strategy: ReadStrategy) -> oxdeal::Config {
    let mut config = test_config();
    config.shop.read_strategy = strategy;
    config
}

#[tokio::test]
async fn test_pass_through_shop_reads_hit_cache_after_first_load() {
    setup_logging();
    let env = memory_platform(config_with(ReadStrategy::PassThrough));
    env.repo.save_shop(&shop(1, "103茶餐厅")).await.unwrap();

    let first = env.platform.shops().query_by_id(1).await.unwrap();
    assert_eq!(first.map(|s| s.name), Some("103茶餐厅".to_string()));
    assert!(env.store.ttl(&ShopService::cache_key(1)).is_some());

    assert_eq!(env.platform.shops().query_by_id(2).await.unwrap(), None);
    assert_eq!(
        env.store
            .get(&ShopService::cache_key(2))
            .await
            .unwrap()
            .as_deref(),
        Some("")
    );
}

#[tokio::test]
async fn test_update_invalidates_cached_shop() {
    setup_logging();
    let env = memory_platform(config_with(ReadStrategy::Mutex));
    env.repo.save_shop(&shop(1, "before")).await.unwrap();
    env.platform.shops().query_by_id(1).await.unwrap();

    env.platform.shops().update(&shop(1, "after")).await.unwrap();
    assert!(env
        .store
        .get(&ShopService::cache_key(1))
        .await
        .unwrap()
        .is_none());

    let reread = env.platform.shops().query_by_id(1).await.unwrap().unwrap();
    assert_eq!(reread.name, "after");
}

#[tokio::test]
async fn test_update_rejects_missing_or_invalid_shop() {
    setup_logging();
    let env = memory_platform(config_with(ReadStrategy::PassThrough));

    let err = env.platform.shops().update(&shop(0, "x")).await.unwrap_err();
    assert!(matches!(err, DealError::Validation(_)));

    let err = env.platform.shops().update(&shop(9, "x")).await.unwrap_err();
    assert!(matches!(err, DealError::NotFound(_)));
}

#[tokio::test]
async fn test_logical_expire_shop_requires_warmup() {
    setup_logging();
    let env = memory_platform(config_with(ReadStrategy::LogicalExpire));
    env.repo.save_shop(&shop(1, "warm me")).await.unwrap();
    let shops = env.platform.shops();

    assert_eq!(shops.query_by_id(1).await.unwrap(), None);

    assert!(shops
        .save_shop_to_cache(1, Duration::from_secs(60))
        .await
        .unwrap());
    assert!(!shops
        .save_shop_to_cache(2, Duration::from_secs(60))
        .await
        .unwrap());
    assert_eq!(
        shops.query_by_id(1).await.unwrap().map(|s| s.name),
        Some("warm me".to_string())
    );

    shops.update(&shop(1, "rewarmed")).await.unwrap();
    assert_eq!(
        shops.query_by_id(1).await.unwrap().map(|s| s.name),
        Some("rewarmed".to_string())
    );
}

#[tokio::test]
async fn test_logical_expire_shop_rebuilds_after_expiry() {
    setup_logging();
    let env = memory_platform(config_with(ReadStrategy::LogicalExpire));
    env.repo.save_shop(&shop(1, "old")).await.unwrap();
    let shops = env.platform.shops();
    shops.save_shop_to_cache(1, Duration::ZERO).await.unwrap();
    env.repo.update_shop(&shop(1, "new")).await.unwrap();

    let stale = shops.query_by_id(1).await.unwrap().unwrap();
    assert_eq!(stale.name, "old");

    assert!(env
        .platform
        .cache()
        .executor()
        .wait_idle(Duration::from_secs(5))
        .await);
    let fresh = shops.query_by_id(1).await.unwrap().unwrap();
    assert_eq!(fresh.name, "new");
}

#[tokio::test]
async fn test_shop_type_list_is_cached_as_sorted_hash() {
    setup_logging();
    let env = memory_platform(test_config());
    for (id, name, sort) in [(1, "美食", 3), (2, "KTV", 1), (3, "丽人·美发", 2)] {
        env.repo
            .save_shop_type(&ShopType {
                id,
                name: name.to_string(),
                icon: None,
                sort,
            })
            .await
            .unwrap();
    }

    let types = env.platform.shop_types().query_type_list().await.unwrap();
    let names: Vec<_> = types.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["KTV", "丽人·美发", "美食"]);

    let cached = env.store.hget_all(SHOP_TYPE_LIST_KEY).await.unwrap();
    assert_eq!(cached.len(), 3);
    assert!(env.store.ttl(SHOP_TYPE_LIST_KEY).is_some());

    // 缓存命中后不再读取数据库
    env.repo
        .save_shop_type(&ShopType {
            id: 4,
            name: "健身".to_string(),
            icon: None,
            sort: 0,
        })
        .await
        .unwrap();
    let again = env.platform.shop_types().query_type_list().await.unwrap();
    assert_eq!(again, types);
}

#[tokio::test]
async fn test_empty_shop_type_list_is_not_cached() {
    setup_logging();
    let env = memory_platform(test_config());
    assert!(env
        .platform
        .shop_types()
        .query_type_list()
        .await
        .unwrap()
        .is_empty());
    assert!(env.store.is_empty());
}

#[tokio::test]
async fn test_login_flow_creates_user_and_slides_session() {
    setup_logging();
    let mut config = test_config();
    config.login.token_ttl_secs = 2;
    let env = memory_platform(config);
    let login = env.platform.login();

    let code = login.send_code("13812345678").await.unwrap();
    assert_eq!(code.len(), 6);
    assert!(code.chars().all(|c| c.is_ascii_digit()));

    let err = login.login("13812345678", "bad").await.unwrap_err();
    assert!(matches!(err, DealError::Validation(_)));

    let token = login.login("13812345678", &code).await.unwrap();
    let err = login.login("13812345678", &code).await.unwrap_err();
    assert!(matches!(err, DealError::Validation(_)));

    let user = login.authenticate(&token).await.unwrap().unwrap();
    assert_eq!(user.nick_name, "用户13812345678");

    // 每次访问刷新会话有效期
    for _ in 0..3 {
        tokio::time::sleep(Duration::from_millis(1200)).await;
        assert!(login.authenticate(&token).await.unwrap().is_some());
    }
    tokio::time::sleep(Duration::from_millis(2500)).await;
    assert!(login.authenticate(&token).await.unwrap().is_none());
}

#[tokio::test]
async fn test_returning_user_keeps_identity() {
    setup_logging();
    let env = memory_platform(test_config());
    let login = env.platform.login();

    let code = login.send_code("15912345678").await.unwrap();
    let first = login.login("15912345678", &code).await.unwrap();
    let code = login.send_code("15912345678").await.unwrap();
    let second = login.login("15912345678", &code).await.unwrap();
    assert_ne!(first, second);

    let a = login.authenticate(&first).await.unwrap().unwrap();
    let b = login.authenticate(&second).await.unwrap().unwrap();
    assert_eq!(a.id, b.id);

    assert!(matches!(
        login.send_code("12345").await,
        Err(DealError::Validation(_))
    ));
    assert_eq!(login.authenticate("").await.unwrap(), None);
}
