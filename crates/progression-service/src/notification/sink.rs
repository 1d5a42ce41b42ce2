//! 通知通道接口
//!
//! 引擎对通知系统的全部认知就是这个接口：投递一个已提交的奖励事件。
//! 具体通道（站内信、推送、消息总线）由部署方注入实现。

use async_trait::async_trait;
use tracing::info;

use reward_shared::events::RewardEvent;

use crate::error::Result;

/// 通知通道
///
/// 实现方负责实际投递；引擎保证只在事务提交后调用，
/// 且投递失败绝不回滚已提交的奖励
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, event: &RewardEvent) -> Result<()>;
}

/// 日志通道
///
/// 默认实现：把事件写入结构化日志。本地联调和未接入
/// 通知系统的部署使用此实现。
pub struct LoggingSink;

#[async_trait]
impl NotificationSink for LoggingSink {
    async fn notify(&self, event: &RewardEvent) -> Result<()> {
        info!(
            event_id = %event.event_id,
            kind = %event.kind,
            user_id = %event.user_id,
            payload = %event.payload,
            "奖励事件"
        );
        Ok(())
    }
}
