//! 用户与活动统计实体定义

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::CriteriaType;

/// 用户
///
/// 引擎只关心金币余额与外观选中状态；资料、会话等归属其他子系统。
/// selected_* 三列是库存 active 标记的文档化镜像，真实来源是
/// inventory_entries 表，两者在同一事务内更新。
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    /// 金币余额，数据库 CHECK 约束保证永不为负
    pub coin_balance: i64,
    #[sqlx(default)]
    pub selected_theme: Option<i64>,
    #[sqlx(default)]
    pub selected_badge: Option<i64>,
    #[sqlx(default)]
    pub selected_frame: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// 余额是否足够支付
    pub fn can_afford(&self, price: i64) -> bool {
        self.coin_balance >= price
    }
}

/// 用户活动统计快照
///
/// 由 StatsProvider 实时聚合，不缓存：快照直接决定解锁判定，
/// 过期数据会导致错误的解锁或漏发
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub posts_created: i64,
    pub posts_read: i64,
    pub comments_made: i64,
    pub likes_given: i64,
    pub followers_gained: i64,
}

impl StatsSnapshot {
    /// 按条件类型取出对应的计数值
    ///
    /// 穷尽匹配，新增条件类型时编译器会强制补全此处
    pub fn value_for(&self, criteria: CriteriaType) -> i64 {
        match criteria {
            CriteriaType::PostsCreated => self.posts_created,
            CriteriaType::PostsRead => self.posts_read,
            CriteriaType::CommentsMade => self.comments_made,
            CriteriaType::LikesGiven => self.likes_given,
            CriteriaType::FollowersGained => self.followers_gained,
        }
    }
}
