//! 奖励账本与进度引擎
//!
//! 社区平台的奖励子系统核心：响应用户活动（发帖、评论、点赞、关注）
//! 与用户主动操作（购买、领取）对金币余额和解锁/持有状态的变更。
//!
//! ## 核心功能
//!
//! - **成就引擎**：按活动统计评估成就条件，恰好一次解锁并发放奖励
//! - **任务引擎**：生成 24 小时时间盒任务，接收尽力而为的进度上报，恰好一次发放领取奖励
//! - **商店引擎**：目录查询、购买（扣款 + 库存建档）、激活（同类型互斥选中）
//! - **金币账本**：每次余额变动与配对的状态转移同事务落流水，可追溯、可验守恒
//! - **事件派发**：奖励事务提交后异步投递事件，通知故障不影响已提交的奖励
//!
//! ## 模块结构
//!
//! - `models`: 领域模型定义
//! - `error`: 错误类型定义
//! - `repository`: 数据库仓储层
//! - `stats`: 活动统计提供方
//! - `service`: 业务服务层
//! - `notification`: 提交后事件派发
//!
//! ## 并发模型
//!
//! 每个检查-再-写入序列都收敛在单个数据库事务内：用户行 FOR UPDATE
//! 串行化余额变动，进度/任务/库存行上的条件更新保证标记位的一次性转移，
//! (user_id, achievement_id) 与 (user_id, item_id) 唯一约束兜底。
//! 约束冲突被翻译为与事务内再校验一致的业务错误。

pub mod error;
pub mod models;
pub mod notification;
pub mod repository;
pub mod service;
pub mod stats;

pub use error::{Result, RewardError};
pub use models::*;
pub use notification::{EffectDispatcher, LoggingSink, NotificationSink};
pub use repository::{
    AchievementRepository, CoinLedgerRepository, QuestRepository, ShopRepository, UserRepository,
};
pub use service::{AchievementService, QuestService, ShopService, dto};
pub use stats::{ActivityStatsProvider, StatsProvider};
