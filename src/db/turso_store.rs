//! TursoStore - NodeStore Implementation for the libsql Backend
//!
//! Implements the [`NodeStore`] trait on top of [`DatabaseService`]. All
//! statements are parameterized; structural column names come from the
//! closed [`PositionColumn`] set, so no query text is ever assembled from
//! caller input.
//!
//! # Examples
//!
//! ```rust,no_run
//! use arbor_core::db::{DatabaseService, NodeStore, TursoStore};
//! use std::path::PathBuf;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let db = Arc::new(DatabaseService::new(PathBuf::from("./arbor.db")).await?);
//!     let store: Arc<dyn NodeStore> = Arc::new(TursoStore::new(db));
//!     let node = store.get_node("node-123").await?;
//!     Ok(())
//! }
//! ```

use crate::db::filter::{NodeFilter, PositionColumn};
use crate::db::node_store::{NodeStore, SubtreeRelocation};
use crate::db::DatabaseService;
use crate::models::TreeNode;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use libsql::Row;
use serde_json::Value;
use std::sync::Arc;

/// Column list shared by every SELECT, in `row_to_node` order.
const SELECT_COLUMNS: &str =
    "id, scope, lft, rgt, lvl, parent_id, content, path_part, path, created_at, modified_at, properties";

/// NodeStore implementation backed by libsql
pub struct TursoStore {
    /// Underlying database service (connection + schema management)
    db: Arc<DatabaseService>,
}

impl TursoStore {
    /// Create a new TursoStore over an initialized [`DatabaseService`]
    pub fn new(db: Arc<DatabaseService>) -> Self {
        Self { db }
    }

    /// Parse timestamp from database - handles both SQLite and RFC3339 formats
    ///
    /// SQLite CURRENT_TIMESTAMP returns: "YYYY-MM-DD HH:MM:SS"
    /// Old data might use RFC3339: "YYYY-MM-DDTHH:MM:SSZ"
    fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
            return Ok(naive.and_utc());
        }

        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Ok(dt.with_timezone(&Utc));
        }

        Err(anyhow::anyhow!(
            "Unable to parse timestamp '{}' as SQLite or RFC3339 format",
            s
        ))
    }

    /// Convert a libsql::Row to a TreeNode
    ///
    /// Expects the [`SELECT_COLUMNS`] layout. This is the single conversion
    /// point for every query path.
    fn row_to_node(row: &Row) -> Result<TreeNode> {
        let id: String = row.get(0).context("Failed to get id")?;
        let scope: String = row.get(1).context("Failed to get scope")?;
        let left: i64 = row.get(2).context("Failed to get lft")?;
        let right: i64 = row.get(3).context("Failed to get rgt")?;
        let level: i64 = row.get(4).context("Failed to get lvl")?;
        let parent_id: Option<String> = row.get(5).context("Failed to get parent_id")?;
        let content: String = row.get(6).context("Failed to get content")?;
        let path_part: Option<String> = row.get(7).context("Failed to get path_part")?;
        let path: Option<String> = row.get(8).context("Failed to get path")?;
        let created_at_str: String = row.get(9).context("Failed to get created_at")?;
        let modified_at_str: String = row.get(10).context("Failed to get modified_at")?;
        let properties_json: String = row.get(11).context("Failed to get properties")?;

        let created_at =
            Self::parse_timestamp(&created_at_str).context("Failed to parse created_at")?;
        let modified_at =
            Self::parse_timestamp(&modified_at_str).context("Failed to parse modified_at")?;

        let properties: Value =
            serde_json::from_str(&properties_json).context("Failed to parse properties JSON")?;

        Ok(TreeNode {
            id,
            scope,
            left,
            right,
            level,
            parent_id,
            content,
            path_part,
            path,
            created_at,
            modified_at,
            properties,
        })
    }

    /// Render a timestamp in the SQLite `CURRENT_TIMESTAMP` format.
    fn format_timestamp(ts: &DateTime<Utc>) -> String {
        ts.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

#[async_trait]
impl NodeStore for TursoStore {
    async fn create_node(&self, node: TreeNode) -> Result<TreeNode> {
        let properties_json =
            serde_json::to_string(&node.properties).context("Failed to serialize properties")?;

        let conn = self.db.connect_with_timeout().await?;
        conn.execute(
            "INSERT INTO nodes (id, scope, lft, rgt, lvl, parent_id, content, path_part, path, created_at, modified_at, properties)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            (
                node.id.as_str(),
                node.scope.as_str(),
                node.left,
                node.right,
                node.level,
                node.parent_id.as_deref(),
                node.content.as_str(),
                node.path_part.as_deref(),
                node.path.as_deref(),
                Self::format_timestamp(&node.created_at),
                Self::format_timestamp(&node.modified_at),
                properties_json,
            ),
        )
        .await
        .context("Failed to insert node")?;

        // Fetch and return the persisted row
        self.get_node(&node.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Node not found after creation"))
    }

    async fn get_node(&self, id: &str) -> Result<Option<TreeNode>> {
        let conn = self.db.connect_with_timeout().await?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM nodes WHERE id = ?",
                SELECT_COLUMNS
            ))
            .await
            .context("Failed to prepare get_node query")?;

        let mut rows = stmt
            .query([id])
            .await
            .context("Failed to execute get_node query")?;

        match rows.next().await.context("Failed to fetch row")? {
            Some(row) => Ok(Some(Self::row_to_node(&row)?)),
            None => Ok(None),
        }
    }

    async fn select_nodes(&self, filter: NodeFilter) -> Result<Vec<TreeNode>> {
        let (suffix, params) = filter.to_sql();
        let sql = format!("SELECT {} FROM nodes{}", SELECT_COLUMNS, suffix);

        let conn = self.db.connect_with_timeout().await?;
        let mut stmt = conn
            .prepare(&sql)
            .await
            .context("Failed to prepare select query")?;

        let mut rows = stmt
            .query(libsql::params_from_iter(params))
            .await
            .context("Failed to execute select query")?;

        let mut nodes = Vec::new();
        while let Some(row) = rows.next().await.context("Failed to fetch row")? {
            nodes.push(Self::row_to_node(&row)?);
        }

        Ok(nodes)
    }

    async fn count_nodes(&self, filter: NodeFilter) -> Result<u64> {
        let (suffix, params) = filter.to_sql();
        let sql = format!("SELECT COUNT(*) FROM nodes{}", suffix);

        let conn = self.db.connect_with_timeout().await?;
        let mut stmt = conn
            .prepare(&sql)
            .await
            .context("Failed to prepare count query")?;

        let mut rows = stmt
            .query(libsql::params_from_iter(params))
            .await
            .context("Failed to execute count query")?;

        let row = rows
            .next()
            .await
            .context("Failed to fetch count row")?
            .ok_or_else(|| anyhow::anyhow!("COUNT(*) returned no row"))?;

        let count: i64 = row.get(0).context("Failed to get count")?;
        Ok(count as u64)
    }

    async fn shift_positions(
        &self,
        scope: &str,
        column: PositionColumn,
        boundary: i64,
        inclusive: bool,
        delta: i64,
    ) -> Result<u64> {
        let col = column.column_name();
        let op = if inclusive { ">=" } else { ">" };
        let sql = format!(
            "UPDATE nodes SET {col} = {col} + ? WHERE {col} {op} ? AND scope = ?",
            col = col,
            op = op
        );

        let conn = self.db.connect_with_timeout().await?;
        let affected = conn
            .execute(&sql, (delta, boundary, scope))
            .await
            .context("Failed to shift positions")?;

        Ok(affected)
    }

    async fn relocate_subtree(&self, relocation: SubtreeRelocation<'_>) -> Result<u64> {
        let conn = self.db.connect_with_timeout().await?;
        let affected = conn
            .execute(
                "UPDATE nodes
                 SET lft = lft + ?, rgt = rgt + ?, lvl = lvl + ?, scope = ?,
                     modified_at = CURRENT_TIMESTAMP
                 WHERE lft >= ? AND rgt <= ? AND scope = ?",
                (
                    relocation.shift,
                    relocation.shift,
                    relocation.level_delta,
                    relocation.to_scope,
                    relocation.low,
                    relocation.high,
                    relocation.from_scope,
                ),
            )
            .await
            .context("Failed to relocate subtree")?;

        Ok(affected)
    }

    async fn delete_subtree(&self, scope: &str, low: i64, high: i64) -> Result<u64> {
        let conn = self.db.connect_with_timeout().await?;
        let affected = conn
            .execute(
                "DELETE FROM nodes WHERE lft >= ? AND rgt <= ? AND scope = ?",
                (low, high, scope),
            )
            .await
            .context("Failed to delete subtree")?;

        Ok(affected)
    }

    async fn update_structure(&self, node: &TreeNode) -> Result<()> {
        let conn = self.db.connect_with_timeout().await?;
        conn.execute(
            "UPDATE nodes
             SET lft = ?, rgt = ?, lvl = ?, parent_id = ?, scope = ?,
                 modified_at = CURRENT_TIMESTAMP
             WHERE id = ?",
            (
                node.left,
                node.right,
                node.level,
                node.parent_id.as_deref(),
                node.scope.as_str(),
                node.id.as_str(),
            ),
        )
        .await
        .context("Failed to update node structure")?;

        Ok(())
    }

    async fn update_path(&self, id: &str, path: Option<&str>) -> Result<()> {
        let conn = self.db.connect_with_timeout().await?;
        conn.execute(
            "UPDATE nodes SET path = ?, modified_at = CURRENT_TIMESTAMP WHERE id = ?",
            (path, id),
        )
        .await
        .context("Failed to update node path")?;

        Ok(())
    }

    async fn list_scopes(&self) -> Result<Vec<String>> {
        let conn = self.db.connect_with_timeout().await?;
        let mut stmt = conn
            .prepare("SELECT scope FROM nodes GROUP BY scope ORDER BY scope")
            .await
            .context("Failed to prepare list_scopes query")?;

        let mut rows = stmt
            .query(())
            .await
            .context("Failed to execute list_scopes query")?;

        let mut scopes = Vec::new();
        while let Some(row) = rows.next().await.context("Failed to fetch scope row")? {
            let scope: String = row.get(0).context("Failed to get scope")?;
            scopes.push(scope);
        }

        Ok(scopes)
    }

    async fn close(&self) -> Result<()> {
        // libsql local databases release their resources on drop
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::filter::{Cmp, OrderDirection};
    use serde_json::json;
    use tempfile::TempDir;

    async fn create_test_store() -> Result<(TursoStore, TempDir)> {
        let temp_dir = TempDir::new()?;
        let db_path = temp_dir.path().join("test.db");
        let db = Arc::new(DatabaseService::new(db_path).await?);
        Ok((TursoStore::new(db), temp_dir))
    }

    fn leaf(scope: &str, left: i64, level: i64, parent: Option<&str>) -> TreeNode {
        let now = Utc::now();
        TreeNode {
            id: uuid::Uuid::new_v4().to_string(),
            scope: scope.to_string(),
            left,
            right: left + 1,
            level,
            parent_id: parent.map(|p| p.to_string()),
            content: format!("node@{}", left),
            path_part: None,
            path: None,
            created_at: now,
            modified_at: now,
            properties: json!({}),
        }
    }

    #[tokio::test]
    async fn test_create_and_get_node() -> Result<()> {
        let (store, _temp_dir) = create_test_store().await?;

        let node = TreeNode::new_root("shop".to_string(), "Shop".to_string(), json!({"a": 1}));
        let created = store.create_node(node.clone()).await?;
        assert_eq!(created.id, node.id);
        assert_eq!(created.left, 1);
        assert_eq!(created.right, 2);
        assert_eq!(created.properties, json!({"a": 1}));

        let fetched = store.get_node(&node.id).await?;
        assert!(fetched.is_some());
        assert_eq!(fetched.unwrap().scope, "shop");

        assert!(store.get_node("missing").await?.is_none());

        Ok(())
    }

    #[tokio::test]
    async fn test_select_nodes_filters_and_orders() -> Result<()> {
        let (store, _temp_dir) = create_test_store().await?;

        // root [1,6] with children [2,3] and [4,5]
        let mut root = TreeNode::new_root("shop".to_string(), "root".to_string(), json!({}));
        root.right = 6;
        let root = store.create_node(root).await?;
        let a = store.create_node(leaf("shop", 2, 1, Some(&root.id))).await?;
        let b = store.create_node(leaf("shop", 4, 1, Some(&root.id))).await?;
        store
            .create_node(leaf("other", 1, 0, None))
            .await?;

        let children = store
            .select_nodes(
                NodeFilter::new()
                    .scope("shop")
                    .parent(&root.id)
                    .order_by_left(OrderDirection::Asc),
            )
            .await?;
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].id, a.id);
        assert_eq!(children[1].id, b.id);

        let descendants = store
            .select_nodes(
                NodeFilter::new()
                    .scope("shop")
                    .left(Cmp::Gt, root.left)
                    .right(Cmp::Lt, root.right)
                    .order_by_left(OrderDirection::Desc),
            )
            .await?;
        assert_eq!(descendants.len(), 2);
        assert_eq!(descendants[0].id, b.id);

        let count = store.count_nodes(NodeFilter::new().scope("shop")).await?;
        assert_eq!(count, 3);

        Ok(())
    }

    #[tokio::test]
    async fn test_shift_positions_inclusive_vs_exclusive() -> Result<()> {
        let (store, _temp_dir) = create_test_store().await?;

        let node = store.create_node(leaf("s", 4, 1, None)).await?;

        // boundary 4, inclusive: lft 4 moves
        let affected = store
            .shift_positions("s", PositionColumn::Left, 4, true, 2)
            .await?;
        assert_eq!(affected, 1);
        assert_eq!(store.get_node(&node.id).await?.unwrap().left, 6);

        // boundary 6, exclusive: lft 6 stays
        let affected = store
            .shift_positions("s", PositionColumn::Left, 6, false, 2)
            .await?;
        assert_eq!(affected, 0);
        assert_eq!(store.get_node(&node.id).await?.unwrap().left, 6);

        // other scopes are never touched
        let foreign = store.create_node(leaf("t", 4, 1, None)).await?;
        store
            .shift_positions("s", PositionColumn::Left, 1, true, 10)
            .await?;
        assert_eq!(store.get_node(&foreign.id).await?.unwrap().left, 4);

        Ok(())
    }

    #[tokio::test]
    async fn test_relocate_subtree_moves_and_rescopes() -> Result<()> {
        let (store, _temp_dir) = create_test_store().await?;

        let inner = store.create_node(leaf("src", 4, 2, None)).await?;
        let outside = store.create_node(leaf("src", 8, 1, None)).await?;

        let affected = store
            .relocate_subtree(SubtreeRelocation {
                from_scope: "src",
                to_scope: "dst",
                low: 4,
                high: 5,
                shift: -2,
                level_delta: -1,
            })
            .await?;
        assert_eq!(affected, 1);

        let moved = store.get_node(&inner.id).await?.unwrap();
        assert_eq!(moved.scope, "dst");
        assert_eq!(moved.left, 2);
        assert_eq!(moved.right, 3);
        assert_eq!(moved.level, 1);

        let untouched = store.get_node(&outside.id).await?.unwrap();
        assert_eq!(untouched.scope, "src");
        assert_eq!(untouched.left, 8);

        Ok(())
    }

    #[tokio::test]
    async fn test_delete_subtree_is_range_scoped() -> Result<()> {
        let (store, _temp_dir) = create_test_store().await?;

        let inside = store.create_node(leaf("s", 2, 1, None)).await?;
        let outside = store.create_node(leaf("s", 6, 1, None)).await?;

        let affected = store.delete_subtree("s", 2, 5).await?;
        assert_eq!(affected, 1);
        assert!(store.get_node(&inside.id).await?.is_none());
        assert!(store.get_node(&outside.id).await?.is_some());

        // deleting an empty range affects nothing
        assert_eq!(store.delete_subtree("s", 100, 200).await?, 0);

        Ok(())
    }

    #[tokio::test]
    async fn test_update_structure_and_path() -> Result<()> {
        let (store, _temp_dir) = create_test_store().await?;

        let mut node = store.create_node(leaf("s", 2, 1, None)).await?;
        node.left = 10;
        node.right = 11;
        node.level = 3;
        node.scope = "t".to_string();
        store.update_structure(&node).await?;

        let reloaded = store.get_node(&node.id).await?.unwrap();
        assert_eq!(reloaded.left, 10);
        assert_eq!(reloaded.right, 11);
        assert_eq!(reloaded.level, 3);
        assert_eq!(reloaded.scope, "t");

        store.update_path(&node.id, Some("a/b/c")).await?;
        assert_eq!(
            store.get_node(&node.id).await?.unwrap().path.as_deref(),
            Some("a/b/c")
        );

        store.update_path(&node.id, None).await?;
        assert!(store.get_node(&node.id).await?.unwrap().path.is_none());

        Ok(())
    }

    #[tokio::test]
    async fn test_list_scopes() -> Result<()> {
        let (store, _temp_dir) = create_test_store().await?;

        store.create_node(leaf("beta", 1, 0, None)).await?;
        store.create_node(leaf("alpha", 1, 0, None)).await?;
        store.create_node(leaf("alpha", 4, 1, None)).await?;

        let scopes = store.list_scopes().await?;
        assert_eq!(scopes, vec!["alpha".to_string(), "beta".to_string()]);

        Ok(())
    }
}
