//! 用户仓储
//!
//! 提供用户余额与外观选中状态的数据访问，支持事务和行级锁。
//! 余额变动必须走 `adjust_balance_in_tx`，与配对的状态转移同事务提交。

use async_trait::async_trait;
use sqlx::{PgConnection, PgPool, Row};

use super::traits::UserRepositoryTrait;
use crate::error::Result;
use crate::models::{ItemType, User};

/// 用户仓储
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // ==================== 查询操作 ====================

    /// 获取用户
    pub async fn get_user(&self, user_id: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, coin_balance, selected_theme, selected_badge, selected_frame,
                   created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// 检查用户是否存在
    pub async fn user_exists(&self, user_id: &str) -> Result<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    // ==================== 事务操作 ====================

    /// 在事务中获取用户（带行级锁）
    ///
    /// 使用 FOR UPDATE 锁定用户行，余额的读-改-写全程持锁，
    /// 并发的奖励入账和购买扣减在此串行化
    pub async fn get_user_for_update(
        tx: &mut PgConnection,
        user_id: &str,
    ) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, coin_balance, selected_theme, selected_badge, selected_frame,
                   created_at, updated_at
            FROM users
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(user_id)
        .fetch_optional(tx)
        .await?;

        Ok(user)
    }

    /// 在事务中调整用户余额，返回调整后的余额
    ///
    /// 使用增量更新而非覆盖；coin_balance 的 CHECK 约束兜底保证不为负
    pub async fn adjust_balance_in_tx(
        tx: &mut PgConnection,
        user_id: &str,
        delta: i64,
    ) -> Result<i64> {
        let row = sqlx::query(
            r#"
            UPDATE users
            SET coin_balance = coin_balance + $2, updated_at = NOW()
            WHERE id = $1
            RETURNING coin_balance
            "#,
        )
        .bind(user_id)
        .bind(delta)
        .fetch_one(tx)
        .await?;

        Ok(row.get("coin_balance"))
    }

    /// 在事务中更新用户的外观选中列
    ///
    /// selected_* 是库存 active 标记的文档化镜像，必须与库存翻转同事务提交
    pub async fn set_selected_in_tx(
        tx: &mut PgConnection,
        user_id: &str,
        item_type: ItemType,
        item_id: i64,
    ) -> Result<()> {
        // 列名来自封闭枚举的穷尽匹配，不存在注入面
        let column = item_type.selected_column();
        let sql = format!(
            "UPDATE users SET {column} = $2, updated_at = NOW() WHERE id = $1"
        );

        sqlx::query(&sql).bind(user_id).bind(item_id).execute(tx).await?;

        Ok(())
    }
}

#[async_trait]
impl UserRepositoryTrait for UserRepository {
    async fn get_user(&self, user_id: &str) -> Result<Option<User>> {
        self.get_user(user_id).await
    }

    async fn user_exists(&self, user_id: &str) -> Result<bool> {
        self.user_exists(user_id).await
    }
}
