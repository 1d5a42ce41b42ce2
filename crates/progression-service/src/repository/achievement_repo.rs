//! 成就仓储
//!
//! 提供成就目录的只读访问和用户进度的惰性创建/更新。
//! 进度记录在首次评估时按需创建，(user_id, achievement_id) 唯一约束
//! 保证并发评估下每对至多一条记录。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use super::traits::AchievementRepositoryTrait;
use crate::error::Result;
use crate::models::{Achievement, UserAchievementProgress};

const PROGRESS_COLUMNS: &str = "id, user_id, achievement_id, current_progress, unlocked, \
     unlocked_at, created_at, updated_at";

/// 成就仓储
pub struct AchievementRepository {
    pool: PgPool,
}

impl AchievementRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // ==================== 目录查询 ====================

    /// 列出全部成就，按奖励金币升序
    pub async fn list_achievements(&self) -> Result<Vec<Achievement>> {
        let achievements = sqlx::query_as::<_, Achievement>(
            r#"
            SELECT id, title, description, criteria_type, target_value, coin_reward,
                   badge_ref, created_at
            FROM achievements
            ORDER BY coin_reward ASC, id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(achievements)
    }

    /// 获取单个成就
    pub async fn get_achievement(&self, id: i64) -> Result<Option<Achievement>> {
        let achievement = sqlx::query_as::<_, Achievement>(
            r#"
            SELECT id, title, description, criteria_type, target_value, coin_reward,
                   badge_ref, created_at
            FROM achievements
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(achievement)
    }

    /// 在事务中获取成就
    pub async fn get_achievement_in_tx(
        tx: &mut PgConnection,
        id: i64,
    ) -> Result<Option<Achievement>> {
        let achievement = sqlx::query_as::<_, Achievement>(
            r#"
            SELECT id, title, description, criteria_type, target_value, coin_reward,
                   badge_ref, created_at
            FROM achievements
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(tx)
        .await?;

        Ok(achievement)
    }

    // ==================== 进度查询 ====================

    /// 列出用户的全部进度记录
    pub async fn list_progress(&self, user_id: &str) -> Result<Vec<UserAchievementProgress>> {
        let progress = sqlx::query_as::<_, UserAchievementProgress>(&format!(
            r#"
            SELECT {PROGRESS_COLUMNS}
            FROM user_achievement_progress
            WHERE user_id = $1
            "#
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(progress)
    }

    /// 获取单条进度记录
    pub async fn get_progress(
        &self,
        user_id: &str,
        achievement_id: i64,
    ) -> Result<Option<UserAchievementProgress>> {
        let progress = sqlx::query_as::<_, UserAchievementProgress>(&format!(
            r#"
            SELECT {PROGRESS_COLUMNS}
            FROM user_achievement_progress
            WHERE user_id = $1 AND achievement_id = $2
            "#
        ))
        .bind(user_id)
        .bind(achievement_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(progress)
    }

    // ==================== 进度写入 ====================

    /// 惰性创建或刷新进度记录
    ///
    /// 单语句 upsert：不存在则创建，存在且未解锁则刷新进度；
    /// 已解锁的记录不做任何修改（ON CONFLICT 的 WHERE 子句过滤），
    /// 此时回退到查询返回现有记录。
    pub async fn upsert_progress(
        &self,
        user_id: &str,
        achievement_id: i64,
        progress: i64,
    ) -> Result<UserAchievementProgress> {
        let upserted = sqlx::query_as::<_, UserAchievementProgress>(&format!(
            r#"
            INSERT INTO user_achievement_progress
                (user_id, achievement_id, current_progress, unlocked, created_at, updated_at)
            VALUES ($1, $2, $3, FALSE, NOW(), NOW())
            ON CONFLICT (user_id, achievement_id) DO UPDATE
                SET current_progress = EXCLUDED.current_progress, updated_at = NOW()
                WHERE user_achievement_progress.unlocked = FALSE
            RETURNING {PROGRESS_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(achievement_id)
        .bind(progress)
        .fetch_optional(&self.pool)
        .await?;

        match upserted {
            Some(row) => Ok(row),
            // 已解锁的记录被 upsert 跳过，读回现有行
            None => {
                let existing = self.get_progress(user_id, achievement_id).await?;
                existing.ok_or_else(|| {
                    crate::error::RewardError::Internal(format!(
                        "进度记录 upsert 后缺失: user_id={user_id}, achievement_id={achievement_id}"
                    ))
                })
            }
        }
    }

    // ==================== 事务操作 ====================

    /// 在事务中获取进度记录（带行级锁）
    ///
    /// 解锁事务内的再校验基于此读，FOR UPDATE 防止两次并发解锁同时通过校验
    pub async fn get_progress_for_update(
        tx: &mut PgConnection,
        user_id: &str,
        achievement_id: i64,
    ) -> Result<Option<UserAchievementProgress>> {
        let progress = sqlx::query_as::<_, UserAchievementProgress>(&format!(
            r#"
            SELECT {PROGRESS_COLUMNS}
            FROM user_achievement_progress
            WHERE user_id = $1 AND achievement_id = $2
            FOR UPDATE
            "#
        ))
        .bind(user_id)
        .bind(achievement_id)
        .fetch_optional(tx)
        .await?;

        Ok(progress)
    }

    /// 在事务中写入解锁标记
    ///
    /// WHERE unlocked = FALSE 保证 false -> true 至多发生一次；
    /// 返回受影响行数，0 表示已被并发事务抢先解锁
    pub async fn mark_unlocked_in_tx(
        tx: &mut PgConnection,
        progress_id: i64,
        final_progress: i64,
        unlocked_at: DateTime<Utc>,
    ) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE user_achievement_progress
            SET unlocked = TRUE, unlocked_at = $2, current_progress = $3, updated_at = NOW()
            WHERE id = $1 AND unlocked = FALSE
            "#,
        )
        .bind(progress_id)
        .bind(unlocked_at)
        .bind(final_progress)
        .execute(tx)
        .await?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl AchievementRepositoryTrait for AchievementRepository {
    async fn list_achievements(&self) -> Result<Vec<Achievement>> {
        self.list_achievements().await
    }

    async fn get_achievement(&self, id: i64) -> Result<Option<Achievement>> {
        self.get_achievement(id).await
    }

    async fn list_progress(&self, user_id: &str) -> Result<Vec<UserAchievementProgress>> {
        self.list_progress(user_id).await
    }

    async fn get_progress(
        &self,
        user_id: &str,
        achievement_id: i64,
    ) -> Result<Option<UserAchievementProgress>> {
        self.get_progress(user_id, achievement_id).await
    }

    async fn upsert_progress(
        &self,
        user_id: &str,
        achievement_id: i64,
        progress: i64,
    ) -> Result<UserAchievementProgress> {
        self.upsert_progress(user_id, achievement_id, progress).await
    }
}
