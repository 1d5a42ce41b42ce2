//! 事件派发器
//!
//! 奖励事务在提交前只收集事件，提交后把事件列表整体交给派发器。
//! 业务逻辑因此不感知投递细节，测试可以直接断言事务产出的事件列表，
//! 而不需要在事务深处 mock 通知通道。

use std::sync::Arc;

use tracing::error;

use reward_shared::events::RewardEvent;

use super::sink::NotificationSink;
use crate::error::Result;

/// 提交后事件派发器
///
/// fire-and-forget：每个事件在独立的后台任务中投递，
/// 慢通道或故障通道不会阻塞、延迟或回滚奖励事务
#[derive(Clone)]
pub struct EffectDispatcher {
    sink: Arc<dyn NotificationSink>,
}

impl EffectDispatcher {
    pub fn new(sink: Arc<dyn NotificationSink>) -> Self {
        Self { sink }
    }

    /// 异步派发一组事件（fire-and-forget）
    ///
    /// 投递失败仅记录错误日志，绝不向调用方传播
    pub fn dispatch_all(&self, events: Vec<RewardEvent>) {
        for event in events {
            let sink = self.sink.clone();

            tokio::spawn(async move {
                if let Err(e) = sink.notify(&event).await {
                    error!(
                        event_id = %event.event_id,
                        kind = %event.kind,
                        user_id = %event.user_id,
                        error = %e,
                        "奖励事件投递失败"
                    );
                }
            });
        }
    }

    /// 同步派发单个事件（等待投递结果）
    ///
    /// 供测试和需要确认投递的场景使用
    pub async fn dispatch_sync(&self, event: &RewardEvent) -> Result<()> {
        self.sink.notify(event).await
    }
}
