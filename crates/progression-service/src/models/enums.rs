//! 进度引擎枚举类型定义
//!
//! 所有枚举都支持数据库（sqlx）和 JSON（serde）序列化。
//! 原来以字符串标签驱动的分支逻辑全部收敛为封闭枚举，
//! 由编译器保证每个变体都有对应的处理分支。

use serde::{Deserialize, Serialize};

/// 成就条件类型
///
/// 选择哪个活动计数器作为成就的判定依据，
/// 每个变体对应 StatsSnapshot 中的一个计数字段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "varchar", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CriteriaType {
    /// 发帖数
    PostsCreated,
    /// 阅读帖子数
    PostsRead,
    /// 评论数
    CommentsMade,
    /// 点赞数
    LikesGiven,
    /// 获得的关注者数
    FollowersGained,
}

/// 每日任务类型
///
/// 活动动作完成后以此类型路由到对应的任务进度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "varchar", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuestType {
    /// 发布帖子
    CreatePost,
    /// 评论帖子
    CommentPost,
    /// 点赞帖子
    LikePost,
}

/// 商品类型
///
/// 同一类型的库存条目在激活时互斥：一个用户至多一个 active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "varchar", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemType {
    /// 主题皮肤
    Theme,
    /// 徽章挂件
    Badge,
    /// 头像框
    Frame,
}

impl ItemType {
    /// 该类型对应的用户选中列
    ///
    /// users 表的 selected_* 列是库存 active 标记的文档化镜像，
    /// 与库存翻转在同一事务内更新
    pub fn selected_column(&self) -> &'static str {
        match self {
            Self::Theme => "selected_theme",
            Self::Badge => "selected_badge",
            Self::Frame => "selected_frame",
        }
    }
}

/// 账本变动类型
///
/// 记录金币余额的每一次变动来源，符号由类型决定
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "varchar", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CoinChangeType {
    /// 成就奖励（+）
    AchievementReward,
    /// 任务奖励（+）
    QuestReward,
    /// 商品购买（-）
    Purchase,
}

impl CoinChangeType {
    /// 返回该变动类型的金额符号
    /// 正数表示入账，负数表示扣减
    pub fn sign(&self) -> i64 {
        match self {
            Self::AchievementReward | Self::QuestReward => 1,
            Self::Purchase => -1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_criteria_type_serialization() {
        assert_eq!(
            serde_json::to_string(&CriteriaType::PostsCreated).unwrap(),
            "\"POSTS_CREATED\""
        );
        assert_eq!(
            serde_json::from_str::<CriteriaType>("\"FOLLOWERS_GAINED\"").unwrap(),
            CriteriaType::FollowersGained
        );
    }

    #[test]
    fn test_quest_type_serialization() {
        assert_eq!(
            serde_json::to_string(&QuestType::CommentPost).unwrap(),
            "\"COMMENT_POST\""
        );
        assert_eq!(
            serde_json::from_str::<QuestType>("\"LIKE_POST\"").unwrap(),
            QuestType::LikePost
        );
    }

    #[test]
    fn test_item_type_selected_column() {
        assert_eq!(ItemType::Theme.selected_column(), "selected_theme");
        assert_eq!(ItemType::Badge.selected_column(), "selected_badge");
        assert_eq!(ItemType::Frame.selected_column(), "selected_frame");
    }

    #[test]
    fn test_coin_change_type_sign() {
        assert_eq!(CoinChangeType::AchievementReward.sign(), 1);
        assert_eq!(CoinChangeType::QuestReward.sign(), 1);
        assert_eq!(CoinChangeType::Purchase.sign(), -1);
    }
}
