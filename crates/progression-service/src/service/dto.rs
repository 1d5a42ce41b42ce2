//! 服务层数据传输对象
//!
//! 定义服务层与外部交互使用的 DTO，与内部领域模型解耦

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{CriteriaType, User};

/// 成就解锁结果 DTO
///
/// unlock_achievement 的返回值，描述一次已提交的解锁事务
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnlockedAchievementDto {
    pub achievement_id: i64,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub badge_ref: Option<String>,
    pub coins_awarded: i64,
    pub new_balance: i64,
}

/// 用户成就进度 DTO
///
/// 目录与用户进度的联合视图；没有进度记录的成就以
/// progress=0 / unlocked=false 呈现（惰性物化，不落库）
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AchievementProgressDto {
    pub achievement_id: i64,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub criteria_type: CriteriaType,
    pub target_value: i64,
    pub coin_reward: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub badge_ref: Option<String>,
    pub current_progress: i64,
    pub unlocked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unlocked_at: Option<DateTime<Utc>>,
}

/// 任务奖励领取结果 DTO
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimRewardResponse {
    pub quest_id: i64,
    pub coins_awarded: i64,
    pub new_balance: i64,
}

/// 购买结果 DTO
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseResponse {
    pub item_id: i64,
    pub inventory_entry_id: i64,
    pub price: i64,
    pub new_balance: i64,
}

/// 用户视图 DTO
///
/// activate 返回的用户外观与余额快照
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub user_id: String,
    pub coin_balance: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_theme: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_badge: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_frame: Option<i64>,
}

impl From<User> for UserView {
    fn from(user: User) -> Self {
        Self {
            user_id: user.id,
            coin_balance: user.coin_balance,
            selected_theme: user.selected_theme,
            selected_badge: user.selected_badge,
            selected_frame: user.selected_frame,
        }
    }
}
