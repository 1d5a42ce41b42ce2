//! 任务仓储
//!
//! 提供每日任务的生成、进度更新、领取与过期清理的数据访问。
//! 进度更新走单条 UPDATE 语句，不开启事务也不持额外的锁，
//! 满足活动侧调用 "尽力而为、不阻塞主操作" 的要求。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use super::traits::QuestRepositoryTrait;
use crate::error::Result;
use crate::models::{Quest, QuestTemplate, QuestType};

const QUEST_COLUMNS: &str = "id, user_id, quest_type, target_amount, current_amount, reward, \
     completed, claimed, expires_at, created_at";

/// 任务仓储
pub struct QuestRepository {
    pool: PgPool,
}

impl QuestRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // ==================== 查询操作 ====================

    /// 列出用户当前有效（未过期）的任务
    pub async fn list_active_quests(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<Quest>> {
        let quests = sqlx::query_as::<_, Quest>(&format!(
            r#"
            SELECT {QUEST_COLUMNS}
            FROM quests
            WHERE user_id = $1 AND expires_at > $2
            ORDER BY id ASC
            "#
        ))
        .bind(user_id)
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        Ok(quests)
    }

    /// 获取单个任务
    pub async fn get_quest(&self, id: i64) -> Result<Option<Quest>> {
        let quest = sqlx::query_as::<_, Quest>(&format!(
            r#"
            SELECT {QUEST_COLUMNS}
            FROM quests
            WHERE id = $1
            "#
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(quest)
    }

    /// 定位进度更新的目标任务
    ///
    /// 最近生成的未过期、未领取的同类型任务；已完成但未领取的任务
    /// 仍会命中（进度可以溢出目标值，不影响领取）
    pub async fn find_progress_target(
        &self,
        user_id: &str,
        quest_type: QuestType,
        now: DateTime<Utc>,
    ) -> Result<Option<Quest>> {
        let quest = sqlx::query_as::<_, Quest>(&format!(
            r#"
            SELECT {QUEST_COLUMNS}
            FROM quests
            WHERE user_id = $1 AND quest_type = $2 AND claimed = FALSE AND expires_at > $3
            ORDER BY created_at DESC, id DESC
            LIMIT 1
            "#
        ))
        .bind(user_id)
        .bind(quest_type)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(quest)
    }

    // ==================== 写入操作 ====================

    /// 单语句增量更新任务进度
    ///
    /// 进度累加与 completed 置位在同一条 UPDATE 内原子完成；
    /// WHERE 条件兜底排除已领取和已过期的任务（目标定位与此更新
    /// 之间的窗口期内任务可能被领取或过期）
    pub async fn apply_progress(
        &self,
        quest_id: i64,
        amount: i32,
        now: DateTime<Utc>,
    ) -> Result<Option<Quest>> {
        let quest = sqlx::query_as::<_, Quest>(&format!(
            r#"
            UPDATE quests
            SET current_amount = current_amount + $2,
                completed = completed OR current_amount + $2 >= target_amount
            WHERE id = $1 AND claimed = FALSE AND expires_at > $3
            RETURNING {QUEST_COLUMNS}
            "#
        ))
        .bind(quest_id)
        .bind(amount)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(quest)
    }

    /// 删除已过期的任务
    pub async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM quests WHERE expires_at <= $1
            "#,
        )
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    // ==================== 事务操作 ====================

    /// 在事务中列出用户当前有效的任务
    ///
    /// 生成流程在锁住用户行后用此读做幂等判断
    pub async fn list_active_in_tx(
        tx: &mut PgConnection,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<Quest>> {
        let quests = sqlx::query_as::<_, Quest>(&format!(
            r#"
            SELECT {QUEST_COLUMNS}
            FROM quests
            WHERE user_id = $1 AND expires_at > $2
            ORDER BY id ASC
            "#
        ))
        .bind(user_id)
        .bind(now)
        .fetch_all(tx)
        .await?;

        Ok(quests)
    }

    /// 在事务中按模板批量创建任务
    pub async fn create_quests_in_tx(
        tx: &mut PgConnection,
        user_id: &str,
        templates: &[QuestTemplate],
        expires_at: DateTime<Utc>,
    ) -> Result<Vec<Quest>> {
        let mut created = Vec::with_capacity(templates.len());

        for template in templates {
            let quest = sqlx::query_as::<_, Quest>(&format!(
                r#"
                INSERT INTO quests
                    (user_id, quest_type, target_amount, current_amount, reward,
                     completed, claimed, expires_at, created_at)
                VALUES ($1, $2, $3, 0, $4, FALSE, FALSE, $5, NOW())
                RETURNING {QUEST_COLUMNS}
                "#
            ))
            .bind(user_id)
            .bind(template.quest_type)
            .bind(template.target_amount)
            .bind(template.reward)
            .bind(expires_at)
            .fetch_one(&mut *tx)
            .await?;

            created.push(quest);
        }

        Ok(created)
    }

    /// 在事务中获取任务（带行级锁）
    ///
    /// 领取流程的再校验基于此读
    pub async fn get_quest_for_update(
        tx: &mut PgConnection,
        quest_id: i64,
    ) -> Result<Option<Quest>> {
        let quest = sqlx::query_as::<_, Quest>(&format!(
            r#"
            SELECT {QUEST_COLUMNS}
            FROM quests
            WHERE id = $1
            FOR UPDATE
            "#
        ))
        .bind(quest_id)
        .fetch_optional(tx)
        .await?;

        Ok(quest)
    }

    /// 在事务中写入领取标记
    ///
    /// WHERE claimed = FALSE 保证 false -> true 至多发生一次；
    /// 返回受影响行数，0 表示已被并发事务抢先领取
    pub async fn mark_claimed_in_tx(tx: &mut PgConnection, quest_id: i64) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE quests
            SET claimed = TRUE
            WHERE id = $1 AND claimed = FALSE
            "#,
        )
        .bind(quest_id)
        .execute(tx)
        .await?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl QuestRepositoryTrait for QuestRepository {
    async fn list_active_quests(&self, user_id: &str, now: DateTime<Utc>) -> Result<Vec<Quest>> {
        self.list_active_quests(user_id, now).await
    }

    async fn get_quest(&self, id: i64) -> Result<Option<Quest>> {
        self.get_quest(id).await
    }

    async fn find_progress_target(
        &self,
        user_id: &str,
        quest_type: QuestType,
        now: DateTime<Utc>,
    ) -> Result<Option<Quest>> {
        self.find_progress_target(user_id, quest_type, now).await
    }

    async fn apply_progress(
        &self,
        quest_id: i64,
        amount: i32,
        now: DateTime<Utc>,
    ) -> Result<Option<Quest>> {
        self.apply_progress(quest_id, amount, now).await
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        self.delete_expired(now).await
    }
}
