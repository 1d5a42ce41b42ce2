//! 进度引擎领域模型
//!
//! 包含奖励系统的所有核心实体定义

pub mod achievement;
pub mod enums;
pub mod ledger;
pub mod quest;
pub mod shop;
pub mod user;

// 重新导出常用类型
pub use achievement::{Achievement, UserAchievementProgress};
pub use enums::{CoinChangeType, CriteriaType, ItemType, QuestType};
pub use ledger::CoinLedger;
pub use quest::{
    DAILY_QUEST_VALIDITY_HOURS, Quest, QuestTemplate, daily_templates, next_expiry,
};
pub use shop::{InventoryEntry, ShopItem};
pub use user::{StatsSnapshot, User};
