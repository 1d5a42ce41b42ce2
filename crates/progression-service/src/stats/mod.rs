//! 活动统计提供方
//!
//! 成就判定消费的活动计数快照由此模块聚合。内容侧（帖子、评论、
//! 点赞、关注）只负责写入各自的表，引擎通过 StatsProvider 只读聚合，
//! 不持有也不缓存计数：快照直接决定解锁判定，必须反映当前状态。

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::instrument;

use crate::error::Result;
use crate::models::StatsSnapshot;

/// 活动统计提供方接口
///
/// 纯读操作，无副作用
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StatsProvider: Send + Sync {
    async fn compute_user_stats(&self, user_id: &str) -> Result<StatsSnapshot>;
}

/// 基于活动表的统计提供方
///
/// 一条语句聚合五个计数器，避免多轮查询间的计数漂移
pub struct ActivityStatsProvider {
    pool: PgPool,
}

impl ActivityStatsProvider {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StatsProvider for ActivityStatsProvider {
    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn compute_user_stats(&self, user_id: &str) -> Result<StatsSnapshot> {
        let snapshot = sqlx::query_as::<_, StatsSnapshot>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM posts WHERE author_id = $1)          AS posts_created,
                (SELECT COUNT(*) FROM post_reads WHERE user_id = $1)       AS posts_read,
                (SELECT COUNT(*) FROM comments WHERE author_id = $1)       AS comments_made,
                (SELECT COUNT(*) FROM likes WHERE user_id = $1)            AS likes_given,
                (SELECT COUNT(*) FROM follows WHERE followee_id = $1)      AS followers_gained
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(snapshot)
    }
}
