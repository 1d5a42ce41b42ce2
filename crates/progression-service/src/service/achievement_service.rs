//! 成就服务
//!
//! 处理成就评估与解锁的核心业务逻辑，包括：
//! - 成就目录查询（带缓存）
//! - 用户进度查询（惰性物化，不落库）
//! - 按统计快照批量评估并解锁
//! - 事务性解锁（再校验 + 金币入账 + 账本流水）
//! - 提交后事件派发
//!
//! ## 解锁流程
//!
//! 1. 评估入口读取统计快照 -> 2. 惰性创建/刷新进度 -> 3. 达标则进入解锁事务
//!    -> 4. 事务内再校验（未解锁、进度达标）-> 5. 入账 + 置位 + 流水同事务提交
//!    -> 6. 提交后派发事件（失败不影响已提交的解锁）
//!
//! 事务内的再校验不可省略：评估入口的读与解锁写之间存在竞争窗口，
//! 并发的重复调用靠再校验 + 行锁收敛为恰好一次解锁。

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Serialize, de::DeserializeOwned};
use sqlx::PgPool;
use tracing::{info, instrument, warn};

use reward_shared::cache::{Cache, CacheKey};
use reward_shared::events::RewardEvent;

use crate::error::{Result, RewardError};
use crate::models::{Achievement, CoinLedger};
use crate::notification::EffectDispatcher;
use crate::repository::{
    AchievementRepository, AchievementRepositoryTrait, CoinLedgerRepository, UserRepository,
};
use crate::service::dto::{AchievementProgressDto, UnlockedAchievementDto};
use crate::stats::StatsProvider;

/// 缓存 TTL 常量（秒）
mod cache_ttl {
    pub const CATALOG: u64 = 600; // 10 min
}

/// 成就服务
///
/// 目录是静态配置，允许缓存；进度、余额、解锁状态是权威状态，
/// 一律直读数据库。
pub struct AchievementService<AR, SP>
where
    AR: AchievementRepositoryTrait,
    SP: StatsProvider,
{
    achievement_repo: Arc<AR>,
    stats: Arc<SP>,
    cache: Arc<Cache>,
    pool: PgPool,
    dispatcher: EffectDispatcher,
}

impl<AR, SP> AchievementService<AR, SP>
where
    AR: AchievementRepositoryTrait,
    SP: StatsProvider,
{
    pub fn new(
        achievement_repo: Arc<AR>,
        stats: Arc<SP>,
        cache: Arc<Cache>,
        pool: PgPool,
        dispatcher: EffectDispatcher,
    ) -> Self {
        Self {
            achievement_repo,
            stats,
            cache,
            pool,
            dispatcher,
        }
    }

    // ==================== 查询接口 ====================

    /// 获取成就目录
    ///
    /// 按奖励金币升序；缓存键 reward:catalog:achievements, TTL 10min
    #[instrument(skip(self))]
    pub async fn list_catalog(&self) -> Result<Vec<Achievement>> {
        let cache_key = CacheKey::achievement_catalog();

        self.get_cached_or_fetch(
            &cache_key,
            Duration::from_secs(cache_ttl::CATALOG),
            || async { self.achievement_repo.list_achievements().await },
        )
        .await
    }

    /// 目录变更后显式失效缓存
    pub async fn invalidate_catalog_cache(&self) {
        let key = CacheKey::achievement_catalog();
        if let Err(e) = self.cache.delete(&key).await {
            warn!(key = %key, error = %e, "缓存失效失败");
        }
    }

    /// 获取用户的成就进度视图
    ///
    /// 目录与进度记录做左联合：没有进度记录的成就以 progress=0,
    /// unlocked=false 呈现，查询不产生任何写入
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn get_user_progress(&self, user_id: &str) -> Result<Vec<AchievementProgressDto>> {
        self.ensure_user_exists(user_id).await?;

        let catalog = self.list_catalog().await?;
        let progress = self.achievement_repo.list_progress(user_id).await?;

        let progress_map: HashMap<i64, _> = progress
            .into_iter()
            .map(|p| (p.achievement_id, p))
            .collect();

        let result = catalog
            .into_iter()
            .map(|achievement| {
                let record = progress_map.get(&achievement.id);
                AchievementProgressDto {
                    achievement_id: achievement.id,
                    title: achievement.title,
                    description: achievement.description,
                    criteria_type: achievement.criteria_type,
                    target_value: achievement.target_value,
                    coin_reward: achievement.coin_reward,
                    badge_ref: achievement.badge_ref,
                    current_progress: record.map(|p| p.current_progress).unwrap_or(0),
                    unlocked: record.map(|p| p.unlocked).unwrap_or(false),
                    unlocked_at: record.and_then(|p| p.unlocked_at),
                }
            })
            .collect();

        Ok(result)
    }

    // ==================== 评估与解锁 ====================

    /// 按当前统计快照评估全部成就并解锁达标项
    ///
    /// 返回本次调用期间解锁的成就列表；统计未变化的重复调用返回空列表。
    /// 可以被重复、并发调用：并发竞争的失败方把 "已解锁" 视为既成事实
    /// 跳过，不产生首次解锁之外的副作用。
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn evaluate_and_unlock(&self, user_id: &str) -> Result<Vec<UnlockedAchievementDto>> {
        self.ensure_user_exists(user_id).await?;

        let stats = self.stats.compute_user_stats(user_id).await?;
        let catalog = self.list_catalog().await?;

        let mut unlocked = Vec::new();

        for achievement in &catalog {
            let value = stats.value_for(achievement.criteria_type);

            // 惰性创建/刷新进度；已解锁的记录保持不变
            let progress = self
                .achievement_repo
                .upsert_progress(user_id, achievement.id, value)
                .await?;

            if !progress.is_unlockable(achievement.target_value) {
                continue;
            }

            match self.unlock_achievement(user_id, achievement.id).await {
                Ok(dto) => unlocked.push(dto),
                // 并发评估的失败方：已被其他调用解锁，按既成事实跳过
                Err(e) if e.is_already_done() => continue,
                // 评估读与解锁写之间统计回退（如内容被删除），跳过该成就
                Err(RewardError::CriteriaNotMet { .. }) => continue,
                Err(e) => return Err(e),
            }
        }

        if !unlocked.is_empty() {
            info!(
                user_id = %user_id,
                count = unlocked.len(),
                "本次评估解锁成就"
            );
        }

        Ok(unlocked)
    }

    /// 解锁单个成就（原子边界）
    ///
    /// 单个事务内：再读成就与进度、再校验（未解锁、进度达标）、
    /// 入账 coin_reward、置位 unlocked，并写入账本流水。
    /// 提交成功后异步派发解锁事件，事件投递失败绝不回滚解锁。
    #[instrument(skip(self), fields(user_id = %user_id, achievement_id = achievement_id))]
    pub async fn unlock_achievement(
        &self,
        user_id: &str,
        achievement_id: i64,
    ) -> Result<UnlockedAchievementDto> {
        let (response, events) = self.execute_unlock(user_id, achievement_id).await?;

        // 事务已提交，事件进入后台派发
        self.dispatcher.dispatch_all(events);

        info!(
            user_id = %user_id,
            achievement_id = achievement_id,
            coins_awarded = response.coins_awarded,
            new_balance = response.new_balance,
            "成就解锁成功"
        );

        Ok(response)
    }

    // ==================== 私有方法 ====================

    /// 执行解锁事务
    ///
    /// 返回解锁结果和待派发的事件列表；事件只在提交成功后产出
    async fn execute_unlock(
        &self,
        user_id: &str,
        achievement_id: i64,
    ) -> Result<(UnlockedAchievementDto, Vec<RewardEvent>)> {
        let mut tx = self.pool.begin().await?;

        // 事务内再读：目录行、用户行（锁定）、进度行（锁定）
        let achievement = AchievementRepository::get_achievement_in_tx(&mut tx, achievement_id)
            .await?
            .ok_or(RewardError::AchievementNotFound(achievement_id))?;

        UserRepository::get_user_for_update(&mut tx, user_id)
            .await?
            .ok_or_else(|| RewardError::UserNotFound(user_id.to_string()))?;

        let progress =
            AchievementRepository::get_progress_for_update(&mut tx, user_id, achievement_id)
                .await?
                .ok_or_else(|| RewardError::ProgressRecordMissing {
                    user_id: user_id.to_string(),
                    achievement_id,
                })?;

        // 再校验：关闭评估读与本次写之间的竞争窗口
        if progress.unlocked {
            return Err(RewardError::AlreadyUnlocked(achievement_id));
        }
        if progress.current_progress < achievement.target_value {
            return Err(RewardError::CriteriaNotMet {
                achievement_id,
                current: progress.current_progress,
                target: achievement.target_value,
            });
        }

        // 置位解锁标记；0 行受影响说明被并发事务抢先
        let now = Utc::now();
        let rows = AchievementRepository::mark_unlocked_in_tx(
            &mut tx,
            progress.id,
            progress.current_progress,
            now,
        )
        .await?;
        if rows == 0 {
            return Err(RewardError::AlreadyUnlocked(achievement_id));
        }

        // 入账与流水：与解锁标记同事务提交
        let new_balance =
            UserRepository::adjust_balance_in_tx(&mut tx, user_id, achievement.coin_reward).await?;
        CoinLedgerRepository::create_in_tx(
            &mut tx,
            &CoinLedger::achievement_reward(
                user_id.to_string(),
                achievement_id,
                achievement.coin_reward,
                new_balance,
            ),
        )
        .await?;

        tx.commit().await?;

        let events = vec![RewardEvent::achievement_unlocked(
            user_id,
            achievement_id,
            &achievement.title,
            achievement.coin_reward,
        )];

        let response = UnlockedAchievementDto {
            achievement_id,
            title: achievement.title,
            badge_ref: achievement.badge_ref,
            coins_awarded: achievement.coin_reward,
            new_balance,
        };

        Ok((response, events))
    }

    /// 校验用户存在
    async fn ensure_user_exists(&self, user_id: &str) -> Result<()> {
        let exists = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        if exists {
            Ok(())
        } else {
            Err(RewardError::UserNotFound(user_id.to_string()))
        }
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
