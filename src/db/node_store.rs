//! NodeStore Trait - Row Store Abstraction
//!
//! This trait is the boundary between the tree engine and the relational
//! substrate. The engine only ever asks for: row CRUD by id, filtered
//! selects, three bulk statements (boundary shift, subtree relocation,
//! subtree delete), and scope enumeration. Anything satisfying this trait
//! can host the forest.
//!
//! # Design Decisions
//!
//! 1. **Async-first**: all methods are async so embedded and networked
//!    backends share one interface
//! 2. **`anyhow::Result`**: backend errors propagate with context attached;
//!    the service layer wraps them into its own taxonomy
//! 3. **Structural writes are explicit**: `update_structure` is the only way
//!    to write one node's `lft`/`rgt`/`lvl`/`parent_id`/`scope`, and only the
//!    mutation engine calls it

use crate::db::filter::{NodeFilter, PositionColumn};
use crate::models::TreeNode;
use anyhow::Result;
use async_trait::async_trait;

/// Parameters for the single bulk update a subtree move issues
/// (avoids too-many-arguments lint)
#[derive(Debug, Clone)]
pub struct SubtreeRelocation<'a> {
    /// Scope currently containing the subtree
    pub from_scope: &'a str,
    /// Scope the subtree ends up in (equal to `from_scope` for local moves)
    pub to_scope: &'a str,
    /// Subtree lower boundary: rows with `lft >= low`
    pub low: i64,
    /// Subtree upper boundary: rows with `rgt <= high`
    pub high: i64,
    /// Added to both `lft` and `rgt` of every matched row
    pub shift: i64,
    /// Added to `lvl` of every matched row
    pub level_delta: i64,
}

/// Abstraction layer for nested-set row persistence
///
/// Implementations must be `Send + Sync`; futures may migrate between
/// threads under Tokio.
#[async_trait]
pub trait NodeStore: Send + Sync {
    /// Persist a brand-new row. Fails on duplicate id.
    async fn create_node(&self, node: TreeNode) -> Result<TreeNode>;

    /// Fetch the latest persisted state of a node.
    ///
    /// `Ok(None)` when the row does not exist (not an error); this doubles
    /// as the engine's reload primitive.
    async fn get_node(&self, id: &str) -> Result<Option<TreeNode>>;

    /// Select all rows matching a typed filter, in the filter's order.
    async fn select_nodes(&self, filter: NodeFilter) -> Result<Vec<TreeNode>>;

    /// Count rows matching a typed filter (verifier support).
    async fn count_nodes(&self, filter: NodeFilter) -> Result<u64>;

    /// The relational increment capability: `column = column + delta` for
    /// every row of `scope` whose `column` is `>= boundary` (`inclusive`)
    /// or `> boundary` (not `inclusive`). Returns the affected row count.
    ///
    /// This is the allocator's whole interface to the store; the column is
    /// picked from the closed [`PositionColumn`] set.
    async fn shift_positions(
        &self,
        scope: &str,
        column: PositionColumn,
        boundary: i64,
        inclusive: bool,
        delta: i64,
    ) -> Result<u64>;

    /// One bulk update moving an entire subtree: boundaries shifted, levels
    /// adjusted, scope rewritten. Returns the affected row count.
    async fn relocate_subtree(&self, relocation: SubtreeRelocation<'_>) -> Result<u64>;

    /// Bulk delete of every row with `lft >= low AND rgt <= high` in `scope`.
    /// Returns the affected row count.
    async fn delete_subtree(&self, scope: &str, low: i64, high: i64) -> Result<u64>;

    /// Persist one node's own structural columns
    /// (`lft`, `rgt`, `lvl`, `parent_id`, `scope`) and bump `modified_at`.
    async fn update_structure(&self, node: &TreeNode) -> Result<()>;

    /// Persist a node's materialized `path` (None clears it).
    async fn update_path(&self, id: &str, path: Option<&str>) -> Result<()>;

    /// Enumerate every scope that has at least one row.
    async fn list_scopes(&self) -> Result<Vec<String>>;

    /// Close the store and release resources.
    async fn close(&self) -> Result<()>;
}
