//! 商店服务
//!
//! 处理商品购买与库存激活的核心业务逻辑，包括：
//! - 商品目录查询（带缓存）
//! - 事务性购买（余额校验、重复购买校验、扣款 + 建档 + 流水）
//! - 激活互斥（同类型至多一条 active，选中列镜像同事务更新）
//!
//! ## 购买流程
//!
//! 1. 商品有效性 -> 2. 锁定用户行 -> 3. 重复购买再校验 -> 4. 余额再校验
//!    -> 5. 扣款 + 写入库存 + 流水同事务提交 -> 6. 提交后派发事件
//!
//! (user_id, item_id) 唯一约束是重复购买的最终防线：并发购买的失败方
//! 无论死于事务内再校验还是约束冲突，对外都表现为 AlreadyOwned。

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{Serialize, de::DeserializeOwned};
use sqlx::PgPool;
use tracing::{info, instrument, warn};

use reward_shared::cache::{Cache, CacheKey};
use reward_shared::events::RewardEvent;

use crate::error::{Result, RewardError, is_check_violation, is_unique_violation};
use crate::models::{CoinLedger, ItemType, ShopItem};
use crate::notification::EffectDispatcher;
use crate::repository::{
    CoinLedgerRepository, ShopRepository, ShopRepositoryTrait, UserRepository,
};
use crate::service::dto::{PurchaseResponse, UserView};

/// 缓存 TTL 常量（秒）
mod cache_ttl {
    pub const CATALOG: u64 = 600; // 10 min
}

/// 商店服务
pub struct ShopService<SR>
where
    SR: ShopRepositoryTrait,
{
    shop_repo: Arc<SR>,
    cache: Arc<Cache>,
    pool: PgPool,
    dispatcher: EffectDispatcher,
}

impl<SR> ShopService<SR>
where
    SR: ShopRepositoryTrait,
{
    pub fn new(
        shop_repo: Arc<SR>,
        cache: Arc<Cache>,
        pool: PgPool,
        dispatcher: EffectDispatcher,
    ) -> Self {
        Self {
            shop_repo,
            cache,
            pool,
            dispatcher,
        }
    }

    // ==================== 查询接口 ====================

    /// 获取商品目录
    ///
    /// 按类型、价格排序；缓存键 reward:catalog:shop, TTL 10min
    #[instrument(skip(self))]
    pub async fn list_items(&self) -> Result<Vec<ShopItem>> {
        let cache_key = CacheKey::shop_catalog();

        self.get_cached_or_fetch(
            &cache_key,
            Duration::from_secs(cache_ttl::CATALOG),
            || async { self.shop_repo.list_items().await },
        )
        .await
    }

    /// 目录变更后显式失效缓存
    pub async fn invalidate_catalog_cache(&self) {
        let key = CacheKey::shop_catalog();
        if let Err(e) = self.cache.delete(&key).await {
            warn!(key = %key, error = %e, "缓存失效失败");
        }
    }

    // ==================== 购买 ====================

    /// 购买商品
    ///
    /// 原子事务：校验用户与商品存在、未曾购买（AlreadyOwned）、
    /// 余额充足（InsufficientFunds），然后扣款并写入一条未激活的
    /// 库存条目。全部步骤同进同退。提交后派发购买事件。
    #[instrument(skip(self), fields(user_id = %user_id, item_id = item_id))]
    pub async fn purchase(&self, user_id: &str, item_id: i64) -> Result<PurchaseResponse> {
        let item = self
            .shop_repo
            .get_item(item_id)
            .await?
            .ok_or(RewardError::ItemNotFound(item_id))?;

        let (response, events) = self.execute_purchase(user_id, &item).await?;

        self.dispatcher.dispatch_all(events);

        info!(
            user_id = %user_id,
            item_id = item_id,
            price = item.price,
            new_balance = response.new_balance,
            "商品购买成功"
        );

        Ok(response)
    }

    // ==================== 激活 ====================

    /// 激活库存商品
    ///
    /// 先校验持有（ItemNotInInventory），然后在单个事务内：
    /// 取消该用户同类型全部条目的激活状态（同类型互斥）、激活目标条目、
    /// 并把选中结果镜像到 users.selected_* 列。返回更新后的用户视图。
    ///
    /// 库存 active 标记是选中状态的唯一事实来源，selected_* 列只是
    /// 同事务维护的文档化镜像。
    #[instrument(skip(self), fields(user_id = %user_id, item_id = item_id))]
    pub async fn activate(&self, user_id: &str, item_id: i64) -> Result<UserView> {
        let item = self
            .shop_repo
            .get_item(item_id)
            .await?
            .ok_or(RewardError::ItemNotFound(item_id))?;

        let entry = self
            .shop_repo
            .get_entry(user_id, item_id)
            .await?
            .ok_or_else(|| RewardError::ItemNotInInventory {
                user_id: user_id.to_string(),
                item_id,
            })?;

        let mut tx = self.pool.begin().await?;

        let user = UserRepository::get_user_for_update(&mut tx, user_id)
            .await?
            .ok_or_else(|| RewardError::UserNotFound(user_id.to_string()))?;

        // 同类型整体清零后再激活目标条目，保证至多一条 active
        ShopRepository::deactivate_type_in_tx(&mut tx, user_id, item.item_type).await?;
        ShopRepository::activate_entry_in_tx(&mut tx, entry.id).await?;
        UserRepository::set_selected_in_tx(&mut tx, user_id, item.item_type, item_id).await?;

        tx.commit().await?;

        info!(
            user_id = %user_id,
            item_id = item_id,
            item_type = ?item.item_type,
            "商品激活成功"
        );

        // 基于事务内读到的用户行构造视图，叠加本次选中
        let mut view = UserView::from(user);
        match item.item_type {
            ItemType::Theme => view.selected_theme = Some(item_id),
            ItemType::Badge => view.selected_badge = Some(item_id),
            ItemType::Frame => view.selected_frame = Some(item_id),
        }

        Ok(view)
    }

    // ==================== 私有方法 ====================

    /// 执行购买事务
    async fn execute_purchase(
        &self,
        user_id: &str,
        item: &ShopItem,
    ) -> Result<(PurchaseResponse, Vec<RewardEvent>)> {
        let mut tx = self.pool.begin().await?;

        let user = UserRepository::get_user_for_update(&mut tx, user_id)
            .await?
            .ok_or_else(|| RewardError::UserNotFound(user_id.to_string()))?;

        // 重复购买再校验
        if ShopRepository::get_entry_in_tx(&mut tx, user_id, item.id)
            .await?
            .is_some()
        {
            return Err(RewardError::AlreadyOwned {
                user_id: user_id.to_string(),
                item_id: item.id,
            });
        }

        // 余额再校验
        if !user.can_afford(item.price) {
            return Err(RewardError::InsufficientFunds {
                required: item.price,
                available: user.coin_balance,
            });
        }

        // 写入库存；唯一约束冲突翻译为与再校验一致的 AlreadyOwned
        let entry_id = ShopRepository::create_entry_in_tx(&mut tx, user_id, item.id)
            .await
            .map_err(|e| match e {
                RewardError::Database(ref db_err)
                    if is_unique_violation(db_err, "uq_inventory_user_item") =>
                {
                    RewardError::AlreadyOwned {
                        user_id: user_id.to_string(),
                        item_id: item.id,
                    }
                }
                other => other,
            })?;

        // 扣款；CHECK 约束冲突翻译为与再校验一致的 InsufficientFunds
        let new_balance = UserRepository::adjust_balance_in_tx(&mut tx, user_id, -item.price)
            .await
            .map_err(|e| match e {
                RewardError::Database(ref db_err)
                    if is_check_violation(db_err, "ck_users_coin_balance") =>
                {
                    RewardError::InsufficientFunds {
                        required: item.price,
                        available: user.coin_balance,
                    }
                }
                other => other,
            })?;

        CoinLedgerRepository::create_in_tx(
            &mut tx,
            &CoinLedger::purchase(user_id.to_string(), item.id, item.price, new_balance),
        )
        .await?;

        tx.commit().await?;

        let events = vec![RewardEvent::item_purchased(user_id, item.id, item.price)];

        let response = PurchaseResponse {
            item_id: item.id,
            inventory_entry_id: entry_id,
            price: item.price,
            new_balance,
        };

        Ok((response, events))
    }

    /// 带缓存的数据获取辅助方法
    ///
    /// 缓存故障降级为直读数据库，读写缓存失败只记录警告
    async fn get_cached_or_fetch<T, F, Fut>(&self, key: &str, ttl: Duration, fetch: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        match self.cache.get::<T>(key).await {
            Ok(Some(cached)) => return Ok(cached),
            Ok(None) => {}
            Err(e) => {
                warn!(key = %key, error = %e, "缓存读取失败，回退数据库");
            }
        }

        let data = fetch().await?;

        if let Err(e) = self.cache.set(key, &data, ttl).await {
            warn!(key = %key, error = %e, "缓存写入失败");
        }

        Ok(data)
    }
}
