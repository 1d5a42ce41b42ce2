//! 每日任务服务
//!
//! 处理每日任务的生成、进度更新、奖励领取与过期清理，包括：
//! - 幂等生成（已有未过期任务则原样返回）
//! - 尽力而为的进度更新（绝不拖垮活动侧的主操作）
//! - 事务性领取（再校验 + 金币入账 + 账本流水）
//! - 过期清理（只暴露操作，调度节奏由外部负责）
//!
//! ## 领取流程
//!
//! 1. 锁定任务行 -> 2. 再校验（归属、已完成、未领取、未过期）
//!    -> 3. 锁定用户行 -> 4. 置位 claimed + 入账 + 流水同事务提交
//!    -> 5. 提交后派发事件

use std::sync::Arc;

use chrono::Utc;
use sqlx::PgPool;
use tracing::{debug, info, instrument, warn};

use reward_shared::events::RewardEvent;

use crate::error::{Result, RewardError};
use crate::models::{CoinLedger, Quest, QuestType, daily_templates, next_expiry};
use crate::notification::EffectDispatcher;
use crate::repository::{
    CoinLedgerRepository, QuestRepository, QuestRepositoryTrait, UserRepository,
};
use crate::service::dto::ClaimRewardResponse;

/// 每日任务服务
pub struct QuestService<QR>
where
    QR: QuestRepositoryTrait,
{
    quest_repo: Arc<QR>,
    pool: PgPool,
    dispatcher: EffectDispatcher,
}

impl<QR> QuestService<QR>
where
    QR: QuestRepositoryTrait,
{
    pub fn new(quest_repo: Arc<QR>, pool: PgPool, dispatcher: EffectDispatcher) -> Self {
        Self {
            quest_repo,
            pool,
            dispatcher,
        }
    }

    // ==================== 任务生成 ====================

    /// 生成每日任务（幂等）
    ///
    /// 用户已有未过期任务时原样返回，否则按固定模板生成一组新任务，
    /// 24 小时后过期。用户行锁串行化同一用户的并发生成，避免重复生成。
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn generate_daily_quests(&self, user_id: &str) -> Result<Vec<Quest>> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        UserRepository::get_user_for_update(&mut tx, user_id)
            .await?
            .ok_or_else(|| RewardError::UserNotFound(user_id.to_string()))?;

        // 幂等判断：有未过期任务就不再生成
        let existing = QuestRepository::list_active_in_tx(&mut tx, user_id, now).await?;
        if !existing.is_empty() {
            tx.commit().await?;
            debug!(user_id = %user_id, count = existing.len(), "已有有效任务，跳过生成");
            return Ok(existing);
        }

        let quests =
            QuestRepository::create_quests_in_tx(&mut tx, user_id, &daily_templates(), next_expiry(now))
                .await?;

        tx.commit().await?;

        info!(
            user_id = %user_id,
            count = quests.len(),
            "每日任务生成完成"
        );

        Ok(quests)
    }

    // ==================== 进度更新 ====================

    /// 活动侧挂钩：吞掉一切错误的进度上报
    ///
    /// 点赞、评论、发帖的主流程在自身提交后调用此方法；
    /// 任务簿记失败只记录警告，绝不影响主操作的结果
    pub async fn track_activity(&self, user_id: &str, quest_type: QuestType) {
        if let Err(e) = self.update_progress(user_id, quest_type, 1).await {
            warn!(
                user_id = %user_id,
                quest_type = ?quest_type,
                error = %e,
                "任务进度更新失败，不影响主流程"
            );
        }
    }

    /// 更新任务进度（尽力而为）
    ///
    /// 定位最近生成的未过期、未领取的同类型任务并累加进度，
    /// 达标时置位 completed。没有匹配任务时静默返回 None。
    /// 单语句更新，不开事务、不持用户行锁，不会阻塞调用方的主操作。
    #[instrument(skip(self), fields(user_id = %user_id, quest_type = ?quest_type))]
    pub async fn update_progress(
        &self,
        user_id: &str,
        quest_type: QuestType,
        amount: i32,
    ) -> Result<Option<Quest>> {
        if amount <= 0 {
            return Err(RewardError::Validation("进度增量必须大于0".to_string()));
        }

        let now = Utc::now();

        let Some(target) = self
            .quest_repo
            .find_progress_target(user_id, quest_type, now)
            .await?
        else {
            debug!(user_id = %user_id, quest_type = ?quest_type, "无匹配任务，跳过进度更新");
            return Ok(None);
        };

        let updated = self.quest_repo.apply_progress(target.id, amount, now).await?;

        if let Some(quest) = &updated {
            if quest.completed && !target.completed {
                info!(
                    user_id = %user_id,
                    quest_id = quest.id,
                    quest_type = ?quest_type,
                    "任务完成，等待领取"
                );
            }
        }

        Ok(updated)
    }

    // ==================== 奖励领取 ====================

    /// 领取任务奖励
    ///
    /// 原子事务：再校验归属、completed=true、claimed=false、未过期，
    /// 然后入账并置位 claimed。提交后派发领取事件。
    #[instrument(skip(self), fields(user_id = %user_id, quest_id = quest_id))]
    pub async fn claim_reward(&self, user_id: &str, quest_id: i64) -> Result<ClaimRewardResponse> {
        let (response, events) = self.execute_claim(user_id, quest_id).await?;

        self.dispatcher.dispatch_all(events);

        info!(
            user_id = %user_id,
            quest_id = quest_id,
            coins_awarded = response.coins_awarded,
            new_balance = response.new_balance,
            "任务奖励领取成功"
        );

        Ok(response)
    }

    // ==================== 过期清理 ====================

    /// 删除已过期的任务
    ///
    /// 只暴露操作本身；调用节奏由外部调度器决定
    #[instrument(skip(self))]
    pub async fn reset_expired(&self) -> Result<u64> {
        let deleted = self.quest_repo.delete_expired(Utc::now()).await?;

        if deleted > 0 {
            info!(deleted = deleted, "过期任务清理完成");
        }

        Ok(deleted)
    }

    // ==================== 私有方法 ====================

    /// 执行领取事务
    async fn execute_claim(
        &self,
        user_id: &str,
        quest_id: i64,
    ) -> Result<(ClaimRewardResponse, Vec<RewardEvent>)> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let quest = QuestRepository::get_quest_for_update(&mut tx, quest_id)
            .await?
            .ok_or(RewardError::QuestNotFound(quest_id))?;

        // 归属校验：他人任务与不存在的任务返回同一错误，不泄露任务归属
        if quest.user_id != user_id {
            return Err(RewardError::QuestNotFound(quest_id));
        }

        if quest.claimed {
            return Err(RewardError::AlreadyClaimed(quest_id));
        }
        if !quest.completed {
            return Err(RewardError::QuestNotCompleted(quest_id));
        }
        if quest.is_expired(now) {
            return Err(RewardError::QuestExpired(quest_id));
        }

        UserRepository::get_user_for_update(&mut tx, user_id)
            .await?
            .ok_or_else(|| RewardError::UserNotFound(user_id.to_string()))?;

        // 置位领取标记；0 行受影响说明被并发事务抢先
        let rows = QuestRepository::mark_claimed_in_tx(&mut tx, quest_id).await?;
        if rows == 0 {
            return Err(RewardError::AlreadyClaimed(quest_id));
        }

        // 入账与流水：与领取标记同事务提交
        let new_balance = UserRepository::adjust_balance_in_tx(&mut tx, user_id, quest.reward).await?;
        CoinLedgerRepository::create_in_tx(
            &mut tx,
            &CoinLedger::quest_reward(user_id.to_string(), quest_id, quest.reward, new_balance),
        )
        .await?;

        tx.commit().await?;

        let events = vec![RewardEvent::quest_reward_claimed(
            user_id,
            quest_id,
            quest.reward,
        )];

        let response = ClaimRewardResponse {
            quest_id,
            coins_awarded: quest.reward,
            new_balance,
        };

        Ok((response, events))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::QuestTemplate;

    #[test]
    fn test_daily_templates_match_generation_contract() {
        // 生成流程使用的固定模板集：发帖 ×1/50，评论 ×3/30，点赞 ×5/20
        let templates = daily_templates();
        let expected = [
            QuestTemplate {
                quest_type: QuestType::CreatePost,
                target_amount: 1,
                reward: 50,
            },
            QuestTemplate {
                quest_type: QuestType::CommentPost,
                target_amount: 3,
                reward: 30,
            },
            QuestTemplate {
                quest_type: QuestType::LikePost,
                target_amount: 5,
                reward: 20,
            },
        ];
        assert_eq!(templates, expected);
    }

    #[test]
    fn test_claim_precondition_order() {
        // 领取校验顺序：claimed 优先于 completed 优先于过期，
        // 已领取的任务即便随后过期也返回 AlreadyClaimed
        let now = Utc::now();
        let quest = Quest {
            id: 1,
            user_id: "user-1".to_string(),
            quest_type: QuestType::LikePost,
            target_amount: 5,
            current_amount: 5,
            reward: 20,
            completed: true,
            claimed: true,
            expires_at: now - chrono::Duration::hours(1),
            created_at: now - chrono::Duration::hours(25),
        };

        assert!(quest.claimed);
        assert!(!quest.is_claimable(now));
    }
}
