//! 金币账本流水实体定义
//!
//! 每条记录包含变动类型、金额和变动后余额，与配对的状态转移
//! （解锁标记、领取标记、库存写入）在同一事务内落库，确保余额
//! 历史可追溯、守恒性质可按查询验证。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::CoinChangeType;

/// 金币账本流水
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CoinLedger {
    pub id: i64,
    pub user_id: String,
    /// 变动类型
    pub change_type: CoinChangeType,
    /// 变动金额（始终为正数，符号由 change_type 决定）
    pub amount: i64,
    /// 变动后的余额
    pub balance_after: i64,
    /// 关联的业务 ID（成就 ID、任务 ID、商品 ID）
    #[sqlx(default)]
    pub ref_id: Option<String>,
    /// 备注
    #[sqlx(default)]
    pub remark: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl CoinLedger {
    /// 计算实际变动值（带符号）
    pub fn signed_amount(&self) -> i64 {
        self.amount * self.change_type.sign()
    }

    /// 创建成就奖励流水
    pub fn achievement_reward(
        user_id: String,
        achievement_id: i64,
        amount: i64,
        balance_after: i64,
    ) -> Self {
        Self {
            id: 0,
            user_id,
            change_type: CoinChangeType::AchievementReward,
            amount,
            balance_after,
            ref_id: Some(achievement_id.to_string()),
            remark: None,
            created_at: Utc::now(),
        }
    }

    /// 创建任务奖励流水
    pub fn quest_reward(user_id: String, quest_id: i64, amount: i64, balance_after: i64) -> Self {
        Self {
            id: 0,
            user_id,
            change_type: CoinChangeType::QuestReward,
            amount,
            balance_after,
            ref_id: Some(quest_id.to_string()),
            remark: None,
            created_at: Utc::now(),
        }
    }

    /// 创建购买扣减流水
    pub fn purchase(user_id: String, item_id: i64, amount: i64, balance_after: i64) -> Self {
        Self {
            id: 0,
            user_id,
            change_type: CoinChangeType::Purchase,
            amount,
            balance_after,
            ref_id: Some(item_id.to_string()),
            remark: None,
            created_at: Utc::now(),
        }
    }
}
