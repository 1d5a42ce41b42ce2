//! 每日任务相关实体定义

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::enums::QuestType;

/// 每日任务有效时长
pub const DAILY_QUEST_VALIDITY_HOURS: i64 = 24;

/// 每日任务
///
/// 按用户生成的时间盒任务；claimed 只允许 false -> true 一次性转移，
/// 领取后记录不再变更，过期记录由清理操作删除
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Quest {
    pub id: i64,
    pub user_id: String,
    pub quest_type: QuestType,
    /// 目标次数
    pub target_amount: i32,
    /// 当前进度
    pub current_amount: i32,
    /// 领取奖励金币数
    pub reward: i64,
    pub completed: bool,
    pub claimed: bool,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Quest {
    /// 任务是否已过期
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// 任务奖励是否可领取：已完成、未领取、未过期
    pub fn is_claimable(&self, now: DateTime<Utc>) -> bool {
        self.completed && !self.claimed && !self.is_expired(now)
    }
}

/// 任务模板
///
/// 每日任务的生成蓝本，固定三条
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuestTemplate {
    pub quest_type: QuestType,
    pub target_amount: i32,
    pub reward: i64,
}

/// 每日任务模板集
///
/// 发帖 ×1 / 50 金币，评论 ×3 / 30 金币，点赞 ×5 / 20 金币
pub fn daily_templates() -> [QuestTemplate; 3] {
    [
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
    ]
}

/// 计算本轮任务的过期时间
pub fn next_expiry(now: DateTime<Utc>) -> DateTime<Utc> {
    now + Duration::hours(DAILY_QUEST_VALIDITY_HOURS)
}
