//! 商店仓储
//!
//! 提供商品目录的只读访问和用户库存的写入。
//! (user_id, item_id) 唯一约束是防止重复购买的最终防线，
//! 冲突由服务层翻译为 AlreadyOwned。

use async_trait::async_trait;
use sqlx::{PgConnection, PgPool, Row};

use super::traits::ShopRepositoryTrait;
use crate::error::Result;
use crate::models::{InventoryEntry, ItemType, ShopItem};

const ENTRY_COLUMNS: &str = "id, user_id, item_id, active, purchased_at";

/// 商店仓储
pub struct ShopRepository {
    pool: PgPool,
}

impl ShopRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // ==================== 目录查询 ====================

    /// 列出全部商品，按类型、价格排序
    pub async fn list_items(&self) -> Result<Vec<ShopItem>> {
        let items = sqlx::query_as::<_, ShopItem>(
            r#"
            SELECT id, item_type, name, price, created_at
            FROM shop_items
            ORDER BY item_type ASC, price ASC, id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// 获取单个商品
    pub async fn get_item(&self, id: i64) -> Result<Option<ShopItem>> {
        let item = sqlx::query_as::<_, ShopItem>(
            r#"
            SELECT id, item_type, name, price, created_at
            FROM shop_items
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(item)
    }

    // ==================== 库存查询 ====================

    /// 列出用户的全部库存
    pub async fn list_inventory(&self, user_id: &str) -> Result<Vec<InventoryEntry>> {
        let entries = sqlx::query_as::<_, InventoryEntry>(&format!(
            r#"
            SELECT {ENTRY_COLUMNS}
            FROM inventory_entries
            WHERE user_id = $1
            ORDER BY purchased_at DESC
            "#
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    /// 获取用户的单条库存
    pub async fn get_entry(&self, user_id: &str, item_id: i64) -> Result<Option<InventoryEntry>> {
        let entry = sqlx::query_as::<_, InventoryEntry>(&format!(
            r#"
            SELECT {ENTRY_COLUMNS}
            FROM inventory_entries
            WHERE user_id = $1 AND item_id = $2
            "#
        ))
        .bind(user_id)
        .bind(item_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(entry)
    }

    // ==================== 事务操作 ====================

    /// 在事务中获取用户的单条库存
    ///
    /// 购买事务内的重复购买再校验基于此读；用户行已被 FOR UPDATE
    /// 锁定，同一用户的并发购买在用户行上串行化，无需再锁库存行
    pub async fn get_entry_in_tx(
        tx: &mut PgConnection,
        user_id: &str,
        item_id: i64,
    ) -> Result<Option<InventoryEntry>> {
        let entry = sqlx::query_as::<_, InventoryEntry>(&format!(
            r#"
            SELECT {ENTRY_COLUMNS}
            FROM inventory_entries
            WHERE user_id = $1 AND item_id = $2
            "#
        ))
        .bind(user_id)
        .bind(item_id)
        .fetch_optional(tx)
        .await?;

        Ok(entry)
    }

    /// 在事务中创建库存条目（初始未激活）
    ///
    /// 唯一约束冲突原样向上抛出，由服务层翻译为 AlreadyOwned
    pub async fn create_entry_in_tx(
        tx: &mut PgConnection,
        user_id: &str,
        item_id: i64,
    ) -> Result<i64> {
        let row = sqlx::query(
            r#"
            INSERT INTO inventory_entries (user_id, item_id, active, purchased_at)
            VALUES ($1, $2, FALSE, NOW())
            RETURNING id
            "#,
        )
        .bind(user_id)
        .bind(item_id)
        .fetch_one(tx)
        .await?;

        Ok(row.get("id"))
    }

    /// 在事务中取消用户某类型全部库存的激活状态
    ///
    /// 激活前先整类清零，保证同类型下至多一条 active
    pub async fn deactivate_type_in_tx(
        tx: &mut PgConnection,
        user_id: &str,
        item_type: ItemType,
    ) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE inventory_entries ie
            SET active = FALSE
            FROM shop_items si
            WHERE ie.item_id = si.id
              AND ie.user_id = $1
              AND si.item_type = $2
              AND ie.active = TRUE
            "#,
        )
        .bind(user_id)
        .bind(item_type)
        .execute(tx)
        .await?;

        Ok(result.rows_affected())
    }

    /// 在事务中激活库存条目
    pub async fn activate_entry_in_tx(tx: &mut PgConnection, entry_id: i64) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE inventory_entries SET active = TRUE WHERE id = $1
            "#,
        )
        .bind(entry_id)
        .execute(tx)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl ShopRepositoryTrait for ShopRepository {
    async fn list_items(&self) -> Result<Vec<ShopItem>> {
        self.list_items().await
    }

    async fn get_item(&self, id: i64) -> Result<Option<ShopItem>> {
        self.get_item(id).await
    }

    async fn list_inventory(&self, user_id: &str) -> Result<Vec<InventoryEntry>> {
        self.list_inventory(user_id).await
    }

    async fn get_entry(&self, user_id: &str, item_id: i64) -> Result<Option<InventoryEntry>> {
        self.get_entry(user_id, item_id).await
    }
}
