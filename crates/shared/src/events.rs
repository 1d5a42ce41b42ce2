//! 奖励事件模型
//!
//! 定义引擎对外发布的奖励事件的统一信封格式。事件在奖励事务提交之后
//! 由派发器交给通知通道，事件本身只承载事实，不关心投递方式。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// RewardEventKind — 事件类型枚举
// ---------------------------------------------------------------------------

/// 奖励事件类型
///
/// 每个变体对应一次已提交的奖励事务；事件只在事务提交后发布，
/// 因此订阅方看到的事件一定对应数据库中已生效的状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RewardEventKind {
    /// 成就解锁 — 进度达标后的一次性解锁，伴随金币入账
    AchievementUnlocked,
    /// 任务奖励领取 — 用户主动领取已完成的每日任务奖励
    QuestRewardClaimed,
    /// 商品购入 — 金币扣减并写入库存
    ItemPurchased,
}

impl RewardEventKind {
    /// 该事件是否伴随金币入账
    pub fn is_coin_credit(&self) -> bool {
        matches!(self, Self::AchievementUnlocked | Self::QuestRewardClaimed)
    }

    /// 该事件是否伴随金币扣减
    pub fn is_coin_debit(&self) -> bool {
        matches!(self, Self::ItemPurchased)
    }
}

impl std::fmt::Display for RewardEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // 序列化为 SCREAMING_SNAKE_CASE 保持与 serde 的一致性，便于日志统一引用
        let s = match self {
            Self::AchievementUnlocked => "ACHIEVEMENT_UNLOCKED",
            Self::QuestRewardClaimed => "QUEST_REWARD_CLAIMED",
            Self::ItemPurchased => "ITEM_PURCHASED",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// RewardEvent — 事件信封
// ---------------------------------------------------------------------------

/// 奖励事件信封
///
/// 所有离开引擎的事件都包装在此信封中：
/// - `event_id`（UUID v7）时间有序，便于订阅方做幂等去重
/// - `payload` 以 JSON 承载不同事件的业务数据，避免为每种事件定义独立结构
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardEvent {
    /// 事件唯一标识（UUID v7）
    pub event_id: String,
    /// 事件类型
    pub kind: RewardEventKind,
    /// 事件归属用户
    pub user_id: String,
    /// 事务提交时间
    pub occurred_at: DateTime<Utc>,
    /// 事件业务数据
    pub payload: serde_json::Value,
}

impl RewardEvent {
    /// 创建事件
    pub fn new(
        user_id: impl Into<String>,
        kind: RewardEventKind,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            event_id: Uuid::now_v7().to_string(),
            kind,
            user_id: user_id.into(),
            occurred_at: Utc::now(),
            payload,
        }
    }

    /// 成就解锁事件
    pub fn achievement_unlocked(
        user_id: impl Into<String>,
        achievement_id: i64,
        title: &str,
        coins_awarded: i64,
    ) -> Self {
        Self::new(
            user_id,
            RewardEventKind::AchievementUnlocked,
            serde_json::json!({
                "achievementId": achievement_id,
                "title": title,
                "coinsAwarded": coins_awarded,
            }),
        )
    }

    /// 任务奖励领取事件
    pub fn quest_reward_claimed(
        user_id: impl Into<String>,
        quest_id: i64,
        coins_awarded: i64,
    ) -> Self {
        Self::new(
            user_id,
            RewardEventKind::QuestRewardClaimed,
            serde_json::json!({
                "questId": quest_id,
                "coinsAwarded": coins_awarded,
            }),
        )
    }

    /// 商品购入事件
    pub fn item_purchased(user_id: impl Into<String>, item_id: i64, price: i64) -> Self {
        Self::new(
            user_id,
            RewardEventKind::ItemPurchased,
            serde_json::json!({
                "itemId": item_id,
                "price": price,
            }),
        )
    }
}
