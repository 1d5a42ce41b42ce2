//! 金币账本仓储
//!
//! 提供金币流水记录的数据访问，支持余额追溯和守恒校验

use async_trait::async_trait;
use sqlx::{PgConnection, PgPool, Row};

use super::traits::CoinLedgerRepositoryTrait;
use crate::error::Result;
use crate::models::CoinLedger;

/// 金币账本仓储
///
/// 采用复式记账思想，记录余额的每一次变动，确保数据可追溯
pub struct CoinLedgerRepository {
    pool: PgPool,
}

impl CoinLedgerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 创建流水记录
    ///
    /// 返回新记录的 ID
    pub async fn create(&self, ledger: &CoinLedger) -> Result<i64> {
        let row = sqlx::query(
            r#"
            INSERT INTO coin_ledger
                (user_id, change_type, amount, balance_after, ref_id, remark, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(&ledger.user_id)
        .bind(ledger.change_type)
        .bind(ledger.amount)
        .bind(ledger.balance_after)
        .bind(&ledger.ref_id)
        .bind(&ledger.remark)
        .bind(ledger.created_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.get("id"))
    }

    /// 在事务中创建流水记录
    ///
    /// 余额变动与配对的状态转移必须经由此方法在同一事务内落流水
    pub async fn create_in_tx(tx: &mut PgConnection, ledger: &CoinLedger) -> Result<i64> {
        let row = sqlx::query(
            r#"
            INSERT INTO coin_ledger
                (user_id, change_type, amount, balance_after, ref_id, remark, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(&ledger.user_id)
        .bind(ledger.change_type)
        .bind(ledger.amount)
        .bind(ledger.balance_after)
        .bind(&ledger.ref_id)
        .bind(&ledger.remark)
        .bind(ledger.created_at)
        .fetch_one(tx)
        .await?;

        Ok(row.get("id"))
    }

    /// 列出用户的流水记录
    ///
    /// 按时间倒序排列，返回最近的 limit 条记录
    pub async fn list_by_user(&self, user_id: &str, limit: i64) -> Result<Vec<CoinLedger>> {
        let ledgers = sqlx::query_as::<_, CoinLedger>(
            r#"
            SELECT id, user_id, change_type, amount, balance_after, ref_id, remark, created_at
            FROM coin_ledger
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(ledgers)
    }

    /// 用户全部流水的带符号汇总
    ///
    /// 入账为正、扣减为负；任意操作序列后余额变化量应等于此值
    pub async fn sum_signed(&self, user_id: &str) -> Result<i64> {
        let row = sqlx::query(
            r#"
            SELECT COALESCE(
                SUM(amount * CASE WHEN change_type = 'PURCHASE' THEN -1 ELSE 1 END),
                0
            )::BIGINT AS total
            FROM coin_ledger
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.get("total"))
    }
}

#[async_trait]
impl CoinLedgerRepositoryTrait for CoinLedgerRepository {
    async fn create(&self, ledger: &CoinLedger) -> Result<i64> {
        self.create(ledger).await
    }

    async fn list_by_user(&self, user_id: &str, limit: i64) -> Result<Vec<CoinLedger>> {
        self.list_by_user(user_id, limit).await
    }

    async fn sum_signed(&self, user_id: &str) -> Result<i64> {
        self.sum_signed(user_id).await
    }
}
