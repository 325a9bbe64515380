//! Space Allocator
//!
//! Opens and closes numeric gaps in a scope's `left`/`right` sequence.
//! Opening makes room for an arriving node or subtree; closing collapses
//! the hole a departing one leaves behind.
//!
//! Each gap operation is two independent bulk updates against the same
//! constant boundary - the updates never depend on each other's results, so
//! their predicates are both evaluated against the pre-gap numbering. The
//! right column is shifted first on open and last on close, mirroring the
//! classic MPTT ordering.
//!
//! Side effect to respect: a gap operation renumbers arbitrarily many rows.
//! Any in-memory node held across a call must be reloaded afterward.

use crate::db::{NodeStore, PositionColumn};
use crate::services::error::TreeError;
use std::sync::Arc;
use tracing::debug;

/// Default gap width: one leaf node occupies two boundary values.
pub const DEFAULT_GAP: i64 = 2;

/// Gap management over a [`NodeStore`].
pub struct SpaceAllocator {
    store: Arc<dyn NodeStore>,
}

impl SpaceAllocator {
    pub fn new(store: Arc<dyn NodeStore>) -> Self {
        Self { store }
    }

    /// Open a gap of `size` at `boundary` in `scope`.
    ///
    /// Every row with `right >= boundary` gets `right += size`, every row
    /// with `left >= boundary` gets `left += size`. Rows outside `scope`
    /// are untouched.
    pub async fn open_gap(&self, scope: &str, boundary: i64, size: i64) -> Result<(), TreeError> {
        debug!(scope, boundary, size, "opening gap");

        self.store
            .shift_positions(scope, PositionColumn::Right, boundary, true, size)
            .await?;
        self.store
            .shift_positions(scope, PositionColumn::Left, boundary, true, size)
            .await?;

        Ok(())
    }

    /// Close a gap of `size` after `boundary` in `scope`.
    ///
    /// Symmetric to [`open_gap`](Self::open_gap) but strictly-greater: rows
    /// sitting exactly on the boundary stay put.
    pub async fn close_gap(&self, scope: &str, boundary: i64, size: i64) -> Result<(), TreeError> {
        debug!(scope, boundary, size, "closing gap");

        self.store
            .shift_positions(scope, PositionColumn::Left, boundary, false, -size)
            .await?;
        self.store
            .shift_positions(scope, PositionColumn::Right, boundary, false, -size)
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{DatabaseService, TursoStore};
    use crate::models::TreeNode;
    use serde_json::json;
    use tempfile::TempDir;
    use uuid::Uuid;

    async fn allocator_over_tempdb() -> anyhow::Result<(SpaceAllocator, Arc<TursoStore>, TempDir)> {
        let temp = TempDir::new()?;
        let db = Arc::new(DatabaseService::new(temp.path().join("test.db")).await?);
        let store = Arc::new(TursoStore::new(db));
        Ok((SpaceAllocator::new(store.clone()), store, temp))
    }

    fn row(scope: &str, left: i64, right: i64) -> TreeNode {
        let mut node = TreeNode::new_root(scope.to_string(), String::new(), json!({}));
        node.id = Uuid::new_v4().to_string();
        node.left = left;
        node.right = right;
        node.level = if left == 1 { 0 } else { 1 };
        node
    }

    async fn boundaries(store: &TursoStore, ids: &[String]) -> anyhow::Result<Vec<(i64, i64)>> {
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            let node = store
                .get_node(id)
                .await?
                .ok_or_else(|| anyhow::anyhow!("row {id} missing"))?;
            out.push((node.left, node.right));
        }
        Ok(out)
    }

    #[tokio::test]
    async fn close_after_open_restores_every_boundary() -> anyhow::Result<()> {
        let (allocator, store, _temp) = allocator_over_tempdb().await?;

        // root [1,6] with leaves [2,3] and [4,5]
        let mut ids = Vec::new();
        for (left, right) in [(1, 6), (2, 3), (4, 5)] {
            ids.push(store.create_node(row("s", left, right)).await?.id);
        }
        let before = boundaries(&store, &ids).await?;

        allocator.open_gap("s", 4, 2).await?;
        let opened = boundaries(&store, &ids).await?;
        assert_eq!(opened, vec![(1, 8), (2, 3), (6, 7)]);

        allocator.close_gap("s", 4, 2).await?;
        assert_eq!(boundaries(&store, &ids).await?, before);
        Ok(())
    }

    #[tokio::test]
    async fn gaps_never_leak_into_other_scopes() -> anyhow::Result<()> {
        let (allocator, store, _temp) = allocator_over_tempdb().await?;

        let foreign = store.create_node(row("other", 1, 2)).await?;
        store.create_node(row("s", 1, 2)).await?;

        allocator.open_gap("s", 1, 2).await?;

        let untouched = store
            .get_node(&foreign.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("foreign row missing"))?;
        assert_eq!((untouched.left, untouched.right), (1, 2));
        Ok(())
    }
}
