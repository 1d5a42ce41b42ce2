//! 商店相关实体定义

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::ItemType;

/// 商品定义
///
/// 不可变目录数据，目录整体可缓存（TTL + 显式失效）
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ShopItem {
    pub id: i64,
    pub item_type: ItemType,
    pub name: String,
    pub price: i64,
    pub created_at: DateTime<Utc>,
}

/// 用户库存条目
///
/// (user_id, item_id) 全局唯一，购买时创建且永不删除；
/// active 标记由激活操作翻转，同一商品类型下至多一条 active
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct InventoryEntry {
    pub id: i64,
    pub user_id: String,
    pub item_id: i64,
    pub active: bool,
    pub purchased_at: DateTime<Utc>,
}
