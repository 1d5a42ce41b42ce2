//! 成就相关实体定义
//!
//! 成就目录由运营侧配置，引擎只读；进度记录由引擎在首次评估时惰性创建。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::CriteriaType;

/// 成就定义
///
/// 不可变目录数据，目录整体可缓存（TTL + 显式失效）
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Achievement {
    pub id: i64,
    /// 成就名称
    pub title: String,
    #[sqlx(default)]
    pub description: Option<String>,
    /// 判定依据的活动计数器
    pub criteria_type: CriteriaType,
    /// 达标阈值
    pub target_value: i64,
    /// 解锁奖励金币数
    pub coin_reward: i64,
    /// 解锁后授予的徽章标识
    #[sqlx(default)]
    pub badge_ref: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Achievement {
    /// 给定进度值是否达标
    pub fn is_satisfied_by(&self, progress: i64) -> bool {
        progress >= self.target_value
    }
}

/// 用户成就进度
///
/// (user_id, achievement_id) 全局唯一；unlocked 只允许 false -> true
/// 一次性转移，解锁后进度不再更新
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UserAchievementProgress {
    pub id: i64,
    pub user_id: String,
    pub achievement_id: i64,
    pub current_progress: i64,
    pub unlocked: bool,
    #[sqlx(default)]
    pub unlocked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserAchievementProgress {
    /// 是否满足解锁前提：尚未解锁且进度达标
    pub fn is_unlockable(&self, target_value: i64) -> bool {
        !self.unlocked && self.current_progress >= target_value
    }
}
