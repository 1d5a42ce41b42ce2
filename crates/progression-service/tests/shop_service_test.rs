//! ShopService 集成测试
//!
//! 使用真实 PostgreSQL 和 Redis 测试购买与激活的完整流程，
//! 覆盖余额不足、重复购买、并发购买恰好一次成功、激活互斥等性质。
//!
//! ## 运行方式
//!
//! ```bash
//! DATABASE_URL=postgres://... REDIS_URL=redis://... \
//!   cargo test --test shop_service_test -- --ignored
//! ```

use std::sync::Arc;

use sqlx::PgPool;

use reward_progression::error::RewardError;
use reward_progression::notification::{EffectDispatcher, LoggingSink};
use reward_progression::repository::ShopRepository;
use reward_progression::service::ShopService;
use reward_shared::cache::Cache;
use reward_shared::config::RedisConfig;

// ==================== 辅助函数 ====================

fn database_url() -> String {
    std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for integration tests")
}

fn redis_url() -> String {
    std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string())
}

fn setup_shop_service(pool: &PgPool) -> ShopService<ShopRepository> {
    let shop_repo = Arc::new(ShopRepository::new(pool.clone()));
    let redis_config = RedisConfig {
        url: redis_url(),
        pool_size: 2,
    };
    let cache = Arc::new(Cache::new(&redis_config).expect("Redis connection failed"));
    let dispatcher = EffectDispatcher::new(Arc::new(LoggingSink));

    ShopService::new(shop_repo, cache, pool.clone(), dispatcher)
}

async fn seed_user(pool: &PgPool, user_id: &str, balance: i64) {
    sqlx::query(
        r#"
        INSERT INTO users (id, coin_balance)
        VALUES ($1, $2)
        ON CONFLICT (id) DO UPDATE SET
            coin_balance = EXCLUDED.coin_balance,
            selected_theme = NULL, selected_badge = NULL, selected_frame = NULL
        "#,
    )
    .bind(user_id)
    .bind(balance)
    .execute(pool)
    .await
    .expect("插入测试用户失败");
}

/// 插入一个商品（幂等）
async fn seed_item(pool: &PgPool, item_id: i64, item_type: &str, name: &str, price: i64) {
    sqlx::query(
        r#"
        INSERT INTO shop_items (id, item_type, name, price)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (id) DO UPDATE SET
            item_type = EXCLUDED.item_type,
            name = EXCLUDED.name,
            price = EXCLUDED.price
        "#,
    )
    .bind(item_id)
    .bind(item_type)
    .bind(name)
    .bind(price)
    .execute(pool)
    .await
    .expect("插入测试商品失败");
}

async fn get_balance(pool: &PgPool, user_id: &str) -> i64 {
    sqlx::query_scalar("SELECT coin_balance FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_one(pool)
        .await
        .expect("查询余额失败")
}

async fn cleanup_test_data(pool: &PgPool, item_ids: &[i64], user_ids: &[&str]) {
    for uid in user_ids {
        for sql in [
            "DELETE FROM coin_ledger WHERE user_id = $1",
            "DELETE FROM inventory_entries WHERE user_id = $1",
            "DELETE FROM users WHERE id = $1",
        ] {
            sqlx::query(sql).bind(uid).execute(pool).await.ok();
        }
    }

    for iid in item_ids {
        sqlx::query("DELETE FROM inventory_entries WHERE item_id = $1")
            .bind(iid)
            .execute(pool)
            .await
            .ok();
        sqlx::query("DELETE FROM shop_items WHERE id = $1")
            .bind(iid)
            .execute(pool)
            .await
            .ok();
    }
}

// ==================== 测试用例 ====================

/// 正常购买：扣款、未激活库存条目、购买流水同时生效
#[tokio::test]
#[ignore = "需要 PostgreSQL 和 Redis"]
async fn test_purchase_success() {
    let pool = PgPool::connect(&database_url()).await.unwrap();
    let item_id = 97001;
    let user_id = "integ_shop_buy_001";

    cleanup_test_data(&pool, &[item_id], &[user_id]).await;
    seed_user(&pool, user_id, 200).await;
    seed_item(&pool, item_id, "THEME", "Buy Theme", 150).await;

    let svc = setup_shop_service(&pool);
    let resp = svc.purchase(user_id, item_id).await.unwrap();

    assert_eq!(resp.item_id, item_id);
    assert_eq!(resp.price, 150);
    assert_eq!(resp.new_balance, 50);
    assert!(resp.inventory_entry_id > 0);

    assert_eq!(get_balance(&pool, user_id).await, 50);

    // 库存条目存在且未激活
    let active: bool = sqlx::query_scalar(
        "SELECT active FROM inventory_entries WHERE user_id = $1 AND item_id = $2",
    )
    .bind(user_id)
    .bind(item_id)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert!(!active, "新购商品应为未激活状态");

    // 购买流水
    let ledger_count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM coin_ledger
         WHERE user_id = $1 AND change_type = 'PURCHASE' AND ref_id = $2",
    )
    .bind(user_id)
    .bind(item_id.to_string())
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(ledger_count, 1, "应有一条购买流水");

    cleanup_test_data(&pool, &[item_id], &[user_id]).await;
}

/// 场景：price=150、balance=100 的购买返回 InsufficientFunds，余额与库存均不变
#[tokio::test]
#[ignore = "需要 PostgreSQL 和 Redis"]
async fn test_purchase_insufficient_funds() {
    let pool = PgPool::connect(&database_url()).await.unwrap();
    let item_id = 97002;
    let user_id = "integ_shop_scenario_c_001";

    cleanup_test_data(&pool, &[item_id], &[user_id]).await;
    seed_user(&pool, user_id, 100).await;
    seed_item(&pool, item_id, "THEME", "Pricey Theme", 150).await;

    let svc = setup_shop_service(&pool);
    let result = svc.purchase(user_id, item_id).await;

    match result.unwrap_err() {
        RewardError::InsufficientFunds {
            required,
            available,
        } => {
            assert_eq!(required, 150);
            assert_eq!(available, 100);
        }
        other => panic!("应返回 InsufficientFunds，实际: {:?}", other),
    }

    // 余额与库存均不变
    assert_eq!(get_balance(&pool, user_id).await, 100, "失败的购买不应扣款");
    let entry_count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM inventory_entries WHERE user_id = $1 AND item_id = $2",
    )
    .bind(user_id)
    .bind(item_id)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(entry_count, 0, "失败的购买不应写入库存");

    cleanup_test_data(&pool, &[item_id], &[user_id]).await;
}

/// 重复购买返回 AlreadyOwned，余额只扣一次
#[tokio::test]
#[ignore = "需要 PostgreSQL 和 Redis"]
async fn test_purchase_already_owned() {
    let pool = PgPool::connect(&database_url()).await.unwrap();
    let item_id = 97003;
    let user_id = "integ_shop_rebuy_001";

    cleanup_test_data(&pool, &[item_id], &[user_id]).await;
    seed_user(&pool, user_id, 300).await;
    seed_item(&pool, item_id, "BADGE", "Rebuy Badge", 100).await;

    let svc = setup_shop_service(&pool);

    svc.purchase(user_id, item_id).await.unwrap();
    let err = svc.purchase(user_id, item_id).await.unwrap_err();

    assert!(
        matches!(err, RewardError::AlreadyOwned { item_id: iid, .. } if iid == item_id),
        "重复购买应返回 AlreadyOwned"
    );
    assert!(err.is_already_done());

    assert_eq!(get_balance(&pool, user_id).await, 200, "余额只应扣一次");

    cleanup_test_data(&pool, &[item_id], &[user_id]).await;
}

/// 并发购买同一商品：恰好一次成功，失败方报 AlreadyOwned，余额只扣一次
#[tokio::test]
#[ignore = "需要 PostgreSQL 和 Redis"]
async fn test_concurrent_purchase_single_success() {
    let pool = PgPool::connect(&database_url()).await.unwrap();
    let item_id = 97004;
    let user_id = "integ_shop_race_001";

    cleanup_test_data(&pool, &[item_id], &[user_id]).await;
    seed_user(&pool, user_id, 500).await;
    seed_item(&pool, item_id, "FRAME", "Race Frame", 120).await;

    let svc = Arc::new(setup_shop_service(&pool));

    let (r1, r2) = tokio::join!(svc.purchase(user_id, item_id), svc.purchase(user_id, item_id));

    let successes = [&r1, &r2].iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1, "并发购买应恰好成功一次");

    let loser = if r1.is_err() { r1 } else { r2 };
    assert!(
        matches!(
            loser.unwrap_err(),
            RewardError::AlreadyOwned { item_id: iid, .. } if iid == item_id
        ),
        "失败方应返回 AlreadyOwned"
    );

    // 余额只扣一次，库存恰好一条
    assert_eq!(get_balance(&pool, user_id).await, 380, "余额只应扣一次");
    let entry_count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM inventory_entries WHERE user_id = $1 AND item_id = $2",
    )
    .bind(user_id)
    .bind(item_id)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(entry_count, 1, "库存应恰好一条");

    cleanup_test_data(&pool, &[item_id], &[user_id]).await;
}

/// 激活互斥：激活第二个同类型商品后，恰好它一条 active，选中列同步
#[tokio::test]
#[ignore = "需要 PostgreSQL 和 Redis"]
async fn test_activate_exclusive_per_type() {
    let pool = PgPool::connect(&database_url()).await.unwrap();
    let theme_a = 97005;
    let theme_b = 97006;
    let user_id = "integ_shop_excl_001";

    cleanup_test_data(&pool, &[theme_a, theme_b], &[user_id]).await;
    seed_user(&pool, user_id, 500).await;
    seed_item(&pool, theme_a, "THEME", "Theme A", 100).await;
    seed_item(&pool, theme_b, "THEME", "Theme B", 100).await;

    let svc = setup_shop_service(&pool);

    svc.purchase(user_id, theme_a).await.unwrap();
    svc.purchase(user_id, theme_b).await.unwrap();

    // 先激活 A，再激活 B
    let view = svc.activate(user_id, theme_a).await.unwrap();
    assert_eq!(view.selected_theme, Some(theme_a));

    let view = svc.activate(user_id, theme_b).await.unwrap();
    assert_eq!(view.selected_theme, Some(theme_b), "视图应镜像最新选中");

    // 恰好一条 THEME 类型的条目 active，且是 B
    let active_items: Vec<(i64,)> = sqlx::query_as(
        r#"
        SELECT ie.item_id
        FROM inventory_entries ie
        JOIN shop_items si ON ie.item_id = si.id
        WHERE ie.user_id = $1 AND si.item_type = 'THEME' AND ie.active = TRUE
        "#,
    )
    .bind(user_id)
    .fetch_all(&pool)
    .await
    .unwrap();
    assert_eq!(active_items.len(), 1, "同类型应恰好一条 active");
    assert_eq!(active_items[0].0, theme_b);

    // users.selected_theme 镜像一致
    let selected: Option<i64> =
        sqlx::query_scalar("SELECT selected_theme FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(selected, Some(theme_b), "选中列应与库存 active 一致");

    cleanup_test_data(&pool, &[theme_a, theme_b], &[user_id]).await;
}

/// 不同类型的激活互不影响
#[tokio::test]
#[ignore = "需要 PostgreSQL 和 Redis"]
async fn test_activate_types_are_independent() {
    let pool = PgPool::connect(&database_url()).await.unwrap();
    let theme_id = 97007;
    let frame_id = 97008;
    let user_id = "integ_shop_types_001";

    cleanup_test_data(&pool, &[theme_id, frame_id], &[user_id]).await;
    seed_user(&pool, user_id, 500).await;
    seed_item(&pool, theme_id, "THEME", "Indep Theme", 100).await;
    seed_item(&pool, frame_id, "FRAME", "Indep Frame", 100).await;

    let svc = setup_shop_service(&pool);

    svc.purchase(user_id, theme_id).await.unwrap();
    svc.purchase(user_id, frame_id).await.unwrap();

    svc.activate(user_id, theme_id).await.unwrap();
    let view = svc.activate(user_id, frame_id).await.unwrap();

    // 头像框的激活不影响主题的选中
    assert_eq!(view.selected_frame, Some(frame_id));

    let active_count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM inventory_entries WHERE user_id = $1 AND active = TRUE",
    )
    .bind(user_id)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(active_count, 2, "不同类型可以同时各有一条 active");

    cleanup_test_data(&pool, &[theme_id, frame_id], &[user_id]).await;
}

/// 激活未持有的商品返回 ItemNotInInventory
#[tokio::test]
#[ignore = "需要 PostgreSQL 和 Redis"]
async fn test_activate_not_owned() {
    let pool = PgPool::connect(&database_url()).await.unwrap();
    let item_id = 97009;
    let user_id = "integ_shop_notown_001";

    cleanup_test_data(&pool, &[item_id], &[user_id]).await;
    seed_user(&pool, user_id, 500).await;
    seed_item(&pool, item_id, "BADGE", "Unowned Badge", 100).await;

    let svc = setup_shop_service(&pool);
    let result = svc.activate(user_id, item_id).await;

    assert!(
        matches!(
            result.unwrap_err(),
            RewardError::ItemNotInInventory { item_id: iid, .. } if iid == item_id
        ),
        "未持有应返回 ItemNotInInventory"
    );

    cleanup_test_data(&pool, &[item_id], &[user_id]).await;
}

/// 商品不存在时购买/激活返回 ItemNotFound
#[tokio::test]
#[ignore = "需要 PostgreSQL 和 Redis"]
async fn test_item_not_found() {
    let pool = PgPool::connect(&database_url()).await.unwrap();
    let user_id = "integ_shop_noitem_001";

    seed_user(&pool, user_id, 500).await;

    let svc = setup_shop_service(&pool);
    let nonexistent = 999999;

    assert!(
        matches!(
            svc.purchase(user_id, nonexistent).await.unwrap_err(),
            RewardError::ItemNotFound(iid) if iid == nonexistent
        ),
        "购买不存在的商品应返回 ItemNotFound"
    );
    assert!(
        matches!(
            svc.activate(user_id, nonexistent).await.unwrap_err(),
            RewardError::ItemNotFound(iid) if iid == nonexistent
        ),
        "激活不存在的商品应返回 ItemNotFound"
    );

    cleanup_test_data(&pool, &[], &[user_id]).await;
}

/// 用户不存在时购买返回 UserNotFound
#[tokio::test]
#[ignore = "需要 PostgreSQL 和 Redis"]
async fn test_purchase_user_not_found() {
    let pool = PgPool::connect(&database_url()).await.unwrap();
    let item_id = 97010;

    cleanup_test_data(&pool, &[item_id], &[]).await;
    seed_item(&pool, item_id, "THEME", "Ghost Theme", 100).await;

    let svc = setup_shop_service(&pool);
    let result = svc.purchase("integ_shop_ghost_user", item_id).await;

    assert!(
        matches!(result.unwrap_err(), RewardError::UserNotFound(_)),
        "不存在的用户应返回 UserNotFound"
    );

    cleanup_test_data(&pool, &[item_id], &[]).await;
}

/// 目录排序：按类型、价格排序（直接走仓储，避开缓存共享键）
#[tokio::test]
#[ignore = "需要 PostgreSQL"]
async fn test_list_items_ordering() {
    let pool = PgPool::connect(&database_url()).await.unwrap();
    let items = [97011, 97012, 97013];

    cleanup_test_data(&pool, &items, &[]).await;
    seed_item(&pool, 97011, "THEME", "Order Theme Cheap", 50).await;
    seed_item(&pool, 97012, "THEME", "Order Theme Pricey", 200).await;
    seed_item(&pool, 97013, "BADGE", "Order Badge", 80).await;

    let repo = ShopRepository::new(pool.clone());
    let listed = repo.list_items().await.unwrap();

    let ours: Vec<i64> = listed
        .iter()
        .filter(|i| items.contains(&i.id))
        .map(|i| i.id)
        .collect();

    // BADGE < THEME（字典序），同类型内按价格升序
    assert_eq!(ours, vec![97013, 97011, 97012], "目录应按类型、价格排序");

    cleanup_test_data(&pool, &items, &[]).await;
}
