//! 进度引擎错误类型
//!
//! 定义引擎的业务错误和系统错误。全部可失败操作统一返回
//! `Result<T, RewardError>`，不再混用结构化的 `{success:false}` 返回值。
//! "已解锁/已领取/已拥有" 属于并发竞争下的预期终态，通过
//! `is_already_done` 区分，调用方可按需降级为跳过而非失败。

use thiserror::Error;

/// 进度引擎错误类型
#[derive(Debug, Error)]
pub enum RewardError {
    // === 用户相关错误 ===
    #[error("用户不存在: {0}")]
    UserNotFound(String),

    #[error("金币余额不足: 需要 {required}, 可用 {available}")]
    InsufficientFunds { required: i64, available: i64 },

    // === 成就相关错误 ===
    #[error("成就不存在: {0}")]
    AchievementNotFound(i64),

    #[error("成就进度记录不存在: user_id={user_id}, achievement_id={achievement_id}")]
    ProgressRecordMissing {
        user_id: String,
        achievement_id: i64,
    },

    #[error("成就已解锁: achievement_id={0}")]
    AlreadyUnlocked(i64),

    #[error("成就条件未满足: achievement_id={achievement_id}, 当前 {current}, 目标 {target}")]
    CriteriaNotMet {
        achievement_id: i64,
        current: i64,
        target: i64,
    },

    // === 任务相关错误 ===
    #[error("任务不存在: {0}")]
    QuestNotFound(i64),

    #[error("任务奖励已领取: quest_id={0}")]
    AlreadyClaimed(i64),

    #[error("任务尚未完成: quest_id={0}")]
    QuestNotCompleted(i64),

    #[error("任务已过期: quest_id={0}")]
    QuestExpired(i64),

    // === 商店相关错误 ===
    #[error("商品不存在: {0}")]
    ItemNotFound(i64),

    #[error("商品已拥有: user_id={user_id}, item_id={item_id}")]
    AlreadyOwned { user_id: String, item_id: i64 },

    #[error("商品不在库存中: user_id={user_id}, item_id={item_id}")]
    ItemNotInInventory { user_id: String, item_id: i64 },

    // === 系统错误 ===
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("JSON 序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("内部错误: {0}")]
    Internal(String),

    #[error("参数校验失败: {0}")]
    Validation(String),

    #[error("并发冲突，请重试")]
    ConcurrencyConflict,
}

/// 进度引擎 Result 类型别名
pub type Result<T> = std::result::Result<T, RewardError>;

impl RewardError {
    /// 检查是否为可重试的错误
    ///
    /// 仅瞬时故障可重试；逻辑校验失败（NotFound、余额不足、已完成）重试无意义。
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Database(_) | Self::ConcurrencyConflict)
    }

    /// 检查是否为业务错误（非系统错误）
    pub fn is_business_error(&self) -> bool {
        !matches!(
            self,
            Self::Database(_)
                | Self::Serialization(_)
                | Self::Internal(_)
                | Self::ConcurrencyConflict
        )
    }

    /// 检查是否为 "已完成" 终态
    ///
    /// 并发竞争的失败方会落在这些变体上，对评估类调用这是预期结果而非异常。
    pub fn is_already_done(&self) -> bool {
        matches!(
            self,
            Self::AlreadyUnlocked(_) | Self::AlreadyClaimed(_) | Self::AlreadyOwned { .. }
        )
    }

    /// 获取错误码（用于上游 API 响应）
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::UserNotFound(_) => "USER_NOT_FOUND",
            Self::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            Self::AchievementNotFound(_) => "ACHIEVEMENT_NOT_FOUND",
            Self::ProgressRecordMissing { .. } => "PROGRESS_RECORD_MISSING",
            Self::AlreadyUnlocked(_) => "ALREADY_UNLOCKED",
            Self::CriteriaNotMet { .. } => "CRITERIA_NOT_MET",
            Self::QuestNotFound(_) => "QUEST_NOT_FOUND",
            Self::AlreadyClaimed(_) => "ALREADY_CLAIMED",
            Self::QuestNotCompleted(_) => "QUEST_NOT_COMPLETED",
            Self::QuestExpired(_) => "QUEST_EXPIRED",
            Self::ItemNotFound(_) => "ITEM_NOT_FOUND",
            Self::AlreadyOwned { .. } => "ALREADY_OWNED",
            Self::ItemNotInInventory { .. } => "ITEM_NOT_IN_INVENTORY",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::ConcurrencyConflict => "CONCURRENCY_CONFLICT",
        }
    }
}

/// 判断 sqlx 错误是否为指定唯一约束的冲突
///
/// 并发写入时唯一约束是 "至多一次" 不变式的最终防线，
/// 冲突需要翻译成与事务内再校验一致的业务错误。
pub fn is_unique_violation(err: &sqlx::Error, constraint: &str) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.constraint() == Some(constraint),
        _ => false,
    }
}

/// 判断 sqlx 错误是否为指定 CHECK 约束的冲突
pub fn is_check_violation(err: &sqlx::Error, constraint: &str) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.constraint() == Some(constraint),
        _ => false,
    }
}
