//! 仓储 Trait 定义
//!
//! 定义仓储接口，便于服务层依赖抽象而非具体实现，支持 mock 测试

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::{
    Achievement, CoinLedger, InventoryEntry, Quest, QuestType, ShopItem, User,
    UserAchievementProgress,
};

/// 用户仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepositoryTrait: Send + Sync {
    async fn get_user(&self, user_id: &str) -> Result<Option<User>>;
    async fn user_exists(&self, user_id: &str) -> Result<bool>;
}

/// 成就仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AchievementRepositoryTrait: Send + Sync {
    // 目录
    async fn list_achievements(&self) -> Result<Vec<Achievement>>;
    async fn get_achievement(&self, id: i64) -> Result<Option<Achievement>>;

    // 进度
    async fn list_progress(&self, user_id: &str) -> Result<Vec<UserAchievementProgress>>;
    async fn get_progress(
        &self,
        user_id: &str,
        achievement_id: i64,
    ) -> Result<Option<UserAchievementProgress>>;

    /// 惰性创建或刷新进度记录
    ///
    /// 不存在则按给定进度创建；存在且未解锁则刷新进度；
    /// 已解锁的记录保持不变。返回落库后的记录。
    async fn upsert_progress(
        &self,
        user_id: &str,
        achievement_id: i64,
        progress: i64,
    ) -> Result<UserAchievementProgress>;
}

/// 任务仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QuestRepositoryTrait: Send + Sync {
    async fn list_active_quests(&self, user_id: &str, now: DateTime<Utc>) -> Result<Vec<Quest>>;
    async fn get_quest(&self, id: i64) -> Result<Option<Quest>>;

    /// 定位进度更新的目标任务：最近生成的未过期、未领取的同类型任务
    async fn find_progress_target(
        &self,
        user_id: &str,
        quest_type: QuestType,
        now: DateTime<Utc>,
    ) -> Result<Option<Quest>>;

    /// 单语句增量更新任务进度
    ///
    /// 达标时同步置位 completed；任务已领取或已过期时不更新。
    /// 返回更新后的记录，未命中时返回 None。
    async fn apply_progress(
        &self,
        quest_id: i64,
        amount: i32,
        now: DateTime<Utc>,
    ) -> Result<Option<Quest>>;

    /// 删除已过期的任务，返回删除条数
    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64>;
}

/// 商店仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ShopRepositoryTrait: Send + Sync {
    async fn list_items(&self) -> Result<Vec<ShopItem>>;
    async fn get_item(&self, id: i64) -> Result<Option<ShopItem>>;

    async fn list_inventory(&self, user_id: &str) -> Result<Vec<InventoryEntry>>;
    async fn get_entry(&self, user_id: &str, item_id: i64) -> Result<Option<InventoryEntry>>;
}

/// 金币账本仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CoinLedgerRepositoryTrait: Send + Sync {
    async fn create(&self, ledger: &CoinLedger) -> Result<i64>;
    async fn list_by_user(&self, user_id: &str, limit: i64) -> Result<Vec<CoinLedger>>;

    /// 用户全部流水的带符号汇总
    ///
    /// 守恒校验：任意操作序列后，余额变化量应等于此汇总值
    async fn sum_signed(&self, user_id: &str) -> Result<i64>;
}
