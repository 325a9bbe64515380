//! Tree Service - Nested-Set Mutation Engine and Traversal Queries
//!
//! This module is the single writer of structural columns. Every mutation
//! follows the same shape: acquire the per-scope exclusivity guard, reload
//! the freshest row state, compute the target position, open/close gaps
//! through the space allocator, write the affected rows, and release the
//! guard only after the final write.
//!
//! Traversal queries are read-only predicate builds against the store; they
//! take no lock and read committed state, so a query racing a mutation on
//! the same scope may observe a transiently inconsistent tree.
//!
//! # Operations
//!
//! - `new_scope` - create (or return) the root of an independent tree
//! - four insert variants - first/last child, prev/next sibling
//! - four move variants - same placements, for existing subtrees
//! - `delete` - remove a node and its entire subtree
//! - traversal - root, parent, ancestors, children, descendants, siblings,
//!   leaves, scope enumeration
//! - `verify` / `verify_all` - structural integrity scans
//! - `update_path` - recompute the materialized path (optional feature)

use crate::db::{Cmp, NodeFilter, NodeStore, OrderDirection, SubtreeRelocation};
use crate::models::{NewNodeParams, TreeNode};
use crate::services::error::TreeError;
use crate::services::position::{plan_insert, plan_move, Placement};
use crate::services::scope_lock::{ScopeGuard, ScopeLocks};
use crate::services::space::{SpaceAllocator, DEFAULT_GAP};
use crate::services::verifier::{IntegrityVerifier, IntegrityViolation};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Tree engine configuration.
#[derive(Debug, Clone)]
pub struct TreeConfig {
    /// Maintain the materialized `path` column on insert and move
    pub path_enabled: bool,
    /// Separator joining path segments
    pub path_separator: String,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            path_enabled: false,
            path_separator: "/".to_string(),
        }
    }
}

/// The nested-set mutation engine and query facade.
///
/// Owns the store handle explicitly - there is no ambient connection state.
/// Clone-cheap when shared behind an `Arc`.
pub struct TreeService {
    store: Arc<dyn NodeStore>,
    locks: ScopeLocks,
    allocator: SpaceAllocator,
    verifier: IntegrityVerifier,
    config: TreeConfig,
}

impl TreeService {
    /// Create a service with default configuration (paths disabled).
    pub fn new(store: Arc<dyn NodeStore>) -> Self {
        Self::with_config(store, TreeConfig::default())
    }

    /// Create a service with explicit configuration.
    pub fn with_config(store: Arc<dyn NodeStore>, config: TreeConfig) -> Self {
        Self {
            allocator: SpaceAllocator::new(store.clone()),
            verifier: IntegrityVerifier::new(store.clone()),
            locks: ScopeLocks::new(),
            store,
            config,
        }
    }

    //
    // SCOPE LIFECYCLE
    //

    /// Create a new scope with its root node, or return the existing root
    /// if the scope is already populated.
    ///
    /// The root always starts as `left=1, right=2, level=0, parent=None`.
    pub async fn new_scope(
        &self,
        scope: &str,
        params: NewNodeParams,
    ) -> Result<TreeNode, TreeError> {
        let _guard = self.locks.acquire(scope).await;

        if let Some(existing) = self.find_root(scope).await? {
            debug!(scope, root = %existing.id, "scope already has a root");
            return Ok(existing);
        }

        let now = Utc::now();
        let root = TreeNode {
            id: params.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            scope: scope.to_string(),
            left: 1,
            right: 2,
            level: 0,
            parent_id: None,
            content: params.content,
            path_part: params.path_part,
            path: None,
            created_at: now,
            modified_at: now,
            properties: params.properties,
        };
        root.validate()?;

        let created = self.store.create_node(root).await?;
        let created = if self.config.path_enabled {
            self.refresh_path(&created).await?
        } else {
            created
        };

        info!(scope, root = %created.id, "created new scope");
        Ok(created)
    }

    /// Enumerate every scope that currently has at least one node.
    pub async fn scopes(&self) -> Result<Vec<String>, TreeError> {
        Ok(self.store.list_scopes().await?)
    }

    //
    // INSERT (brand-new nodes only)
    //

    /// Insert a new node as the first child of `target_id`.
    pub async fn insert_as_first_child(
        &self,
        params: NewNodeParams,
        target_id: &str,
    ) -> Result<TreeNode, TreeError> {
        self.insert(params, target_id, Placement::FirstChild).await
    }

    /// Insert a new node as the last child of `target_id`.
    pub async fn insert_as_last_child(
        &self,
        params: NewNodeParams,
        target_id: &str,
    ) -> Result<TreeNode, TreeError> {
        self.insert(params, target_id, Placement::LastChild).await
    }

    /// Insert a new node as the previous sibling of `target_id`.
    pub async fn insert_as_prev_sibling(
        &self,
        params: NewNodeParams,
        target_id: &str,
    ) -> Result<TreeNode, TreeError> {
        self.insert(params, target_id, Placement::PrevSibling).await
    }

    /// Insert a new node as the next sibling of `target_id`.
    pub async fn insert_as_next_sibling(
        &self,
        params: NewNodeParams,
        target_id: &str,
    ) -> Result<TreeNode, TreeError> {
        self.insert(params, target_id, Placement::NextSibling).await
    }

    /// Generic insert: compute the landing position relative to the target,
    /// open a two-wide gap there, persist the new leaf.
    ///
    /// Insert is for brand-new nodes only; an id already present in any tree
    /// is rejected - that node has to be moved, not inserted again.
    pub async fn insert(
        &self,
        params: NewNodeParams,
        target_id: &str,
        placement: Placement,
    ) -> Result<TreeNode, TreeError> {
        let (_guard, target) = self.lock_and_reload(target_id).await?;

        // Checked under the guard so a racing insert of the same id in this
        // scope cannot slip between check and create.
        if let Some(id) = &params.id {
            if self.store.get_node(id).await?.is_some() {
                return Err(TreeError::already_persisted(id.clone()));
            }
        }

        if !placement.allows_root_target() && target.is_root() {
            return Err(TreeError::root_target_not_allowed(target.id));
        }

        let plan = plan_insert(&target, placement);
        self.allocator
            .open_gap(&plan.scope, plan.left, DEFAULT_GAP)
            .await?;

        let node = TreeNode::from_params(params, plan.scope, plan.left, plan.level, plan.parent_id);
        node.validate()?;

        let created = self.store.create_node(node).await?;
        let created = if self.config.path_enabled {
            self.refresh_path(&created).await?
        } else {
            created
        };

        debug!(
            node = %created.id,
            target = %target.id,
            ?placement,
            left = created.left,
            level = created.level,
            "inserted node"
        );
        Ok(created)
    }

    //
    // MOVE (existing subtrees)
    //

    /// Move a subtree to be the first child of `target_id`.
    pub async fn move_to_first_child(
        &self,
        node_id: &str,
        target_id: &str,
    ) -> Result<TreeNode, TreeError> {
        self.move_node(node_id, target_id, Placement::FirstChild)
            .await
    }

    /// Move a subtree to be the last child of `target_id`.
    pub async fn move_to_last_child(
        &self,
        node_id: &str,
        target_id: &str,
    ) -> Result<TreeNode, TreeError> {
        self.move_node(node_id, target_id, Placement::LastChild)
            .await
    }

    /// Move a subtree to be the previous sibling of `target_id`.
    pub async fn move_to_prev_sibling(
        &self,
        node_id: &str,
        target_id: &str,
    ) -> Result<TreeNode, TreeError> {
        self.move_node(node_id, target_id, Placement::PrevSibling)
            .await
    }

    /// Move a subtree to be the next sibling of `target_id`.
    pub async fn move_to_next_sibling(
        &self,
        node_id: &str,
        target_id: &str,
    ) -> Result<TreeNode, TreeError> {
        self.move_node(node_id, target_id, Placement::NextSibling)
            .await
    }

    /// Generic subtree move, possibly across scopes.
    ///
    /// Sequence: open a gap of the subtree's width at the destination,
    /// reload the source (the gap may have displaced it when destination
    /// and source share a scope), relocate every subtree row in one bulk
    /// update, then collapse the hole left at the source position.
    pub async fn move_node(
        &self,
        node_id: &str,
        target_id: &str,
        placement: Placement,
    ) -> Result<TreeNode, TreeError> {
        let (_guards, node, target) = self.lock_pair_and_reload(node_id, target_id).await?;

        // Cycle guard: a node cannot land inside its own subtree.
        if target.id == node.id || target.is_descendant_of(&node) {
            return Err(TreeError::circular_reference(node.id, target.id));
        }
        if !placement.allows_root_target() && target.is_root() {
            return Err(TreeError::root_target_not_allowed(target.id));
        }

        let plan = plan_move(&node, &target, placement);
        let source_scope = node.scope.clone();

        // The destination gap opens in the scope that contains raw_left.
        // For same-scope moves this may renumber the source subtree itself,
        // hence the reload before computing the actual shift.
        self.allocator
            .open_gap(&target.scope, plan.raw_left, plan.size)
            .await?;

        let node = self.reload(node_id).await?;
        let shift = plan.raw_left - node.left;

        self.store
            .relocate_subtree(SubtreeRelocation {
                from_scope: &node.scope,
                to_scope: &target.scope,
                low: node.left,
                high: node.right,
                shift,
                level_delta: plan.level_delta,
            })
            .await?;

        // Collapse the hole at the source's (post-gap, pre-move) position.
        self.allocator
            .close_gap(&source_scope, node.left, plan.size)
            .await?;

        // Boundary shifts never touch parentage, so reattach explicitly.
        let mut moved = self.reload(node_id).await?;
        if moved.parent_id != plan.parent_id {
            moved.parent_id = plan.parent_id.clone();
            self.store.update_structure(&moved).await?;
        }
        if self.config.path_enabled {
            self.refresh_subtree_paths(&moved).await?;
            moved = self.reload(node_id).await?;
        }

        debug!(
            node = %moved.id,
            target = %target.id,
            ?placement,
            from_scope = %source_scope,
            to_scope = %moved.scope,
            left = moved.left,
            "moved subtree"
        );
        Ok(moved)
    }

    //
    // DELETE
    //

    /// Delete a node and its entire subtree; returns the number of removed
    /// rows. A node that is already absent is a no-op, not an error.
    pub async fn delete(&self, node_id: &str) -> Result<u64, TreeError> {
        let Some(probe) = self.store.get_node(node_id).await? else {
            return Ok(0);
        };

        let _guard = self.locks.acquire(&probe.scope).await;

        // Re-read under the lock; a concurrent delete may have won.
        let Some(node) = self.store.get_node(node_id).await? else {
            return Ok(0);
        };

        let affected = self
            .store
            .delete_subtree(&node.scope, node.left, node.right)
            .await?;

        if affected > 0 {
            self.allocator
                .close_gap(&node.scope, node.left, node.size())
                .await?;
        }

        debug!(node = %node.id, scope = %node.scope, rows = affected, "deleted subtree");
        Ok(affected)
    }

    //
    // TRAVERSAL QUERIES (read-only, no exclusivity)
    //

    /// The unique root of a scope (`left = 1`).
    pub async fn root(&self, scope: &str) -> Result<TreeNode, TreeError> {
        self.find_root(scope)
            .await?
            .ok_or_else(|| TreeError::root_not_found(scope))
    }

    /// Fetch one node by id; `Ok(None)` when absent.
    pub async fn node(&self, id: &str) -> Result<Option<TreeNode>, TreeError> {
        Ok(self.store.get_node(id).await?)
    }

    /// The immediate parent of a node; `None` for a root.
    pub async fn parent(&self, node: &TreeNode) -> Result<Option<TreeNode>, TreeError> {
        if node.is_root() {
            return Ok(None);
        }
        let parents = self
            .store
            .select_nodes(
                NodeFilter::new()
                    .scope(&node.scope)
                    .left(Cmp::Le, node.left)
                    .right(Cmp::Ge, node.right)
                    .id_ne(&node.id)
                    .level(Cmp::Eq, node.level - 1)
                    .limit(1),
            )
            .await?;
        Ok(parents.into_iter().next())
    }

    /// All ancestors of a node, ordered by `left` (ascending = root first).
    pub async fn ancestors(
        &self,
        node: &TreeNode,
        include_root: bool,
        direction: OrderDirection,
    ) -> Result<Vec<TreeNode>, TreeError> {
        let mut filter = NodeFilter::new()
            .scope(&node.scope)
            .left(Cmp::Le, node.left)
            .right(Cmp::Ge, node.right)
            .id_ne(&node.id)
            .order_by_left(direction);
        if !include_root {
            filter = filter.left(Cmp::Ne, 1);
        }
        Ok(self.store.select_nodes(filter).await?)
    }

    /// Direct children of a node, ordered by `left`.
    pub async fn children(
        &self,
        node: &TreeNode,
        direction: OrderDirection,
    ) -> Result<Vec<TreeNode>, TreeError> {
        Ok(self
            .store
            .select_nodes(
                NodeFilter::new()
                    .scope(&node.scope)
                    .parent(&node.id)
                    .order_by_left(direction),
            )
            .await?)
    }

    /// All descendants of a node, optionally including the node itself.
    pub async fn descendants(
        &self,
        node: &TreeNode,
        include_self: bool,
        direction: OrderDirection,
    ) -> Result<Vec<TreeNode>, TreeError> {
        let (left_cmp, right_cmp) = if include_self {
            (Cmp::Ge, Cmp::Le)
        } else {
            (Cmp::Gt, Cmp::Lt)
        };
        Ok(self
            .store
            .select_nodes(
                NodeFilter::new()
                    .scope(&node.scope)
                    .left(left_cmp, node.left)
                    .right(right_cmp, node.right)
                    .order_by_left(direction),
            )
            .await?)
    }

    /// Siblings of a node (same parent, same level), optionally including
    /// the node itself. A root has no siblings.
    pub async fn siblings(
        &self,
        node: &TreeNode,
        include_self: bool,
        direction: OrderDirection,
    ) -> Result<Vec<TreeNode>, TreeError> {
        let Some(parent) = self.parent(node).await? else {
            return Ok(if include_self {
                vec![node.clone()]
            } else {
                Vec::new()
            });
        };

        let mut filter = NodeFilter::new()
            .scope(&node.scope)
            .left(Cmp::Gt, parent.left)
            .right(Cmp::Lt, parent.right)
            .level(Cmp::Eq, node.level)
            .order_by_left(direction);
        if !include_self {
            filter = filter.id_ne(&node.id);
        }
        Ok(self.store.select_nodes(filter).await?)
    }

    /// Leaves at or below a node (`right = left + 1`), preorder.
    pub async fn leaves(&self, node: &TreeNode) -> Result<Vec<TreeNode>, TreeError> {
        Ok(self
            .store
            .select_nodes(
                NodeFilter::new()
                    .scope(&node.scope)
                    .left(Cmp::Ge, node.left)
                    .right(Cmp::Le, node.right)
                    .leaf()
                    .order_by_left(OrderDirection::Asc),
            )
            .await?)
    }

    //
    // INTEGRITY
    //

    /// Scan one scope for structural violations; `Ok(None)` means healthy.
    pub async fn verify(&self, scope: &str) -> Result<Option<IntegrityViolation>, TreeError> {
        self.verifier.verify(scope).await
    }

    /// Scan every scope; returns the failures.
    pub async fn verify_all(&self) -> Result<Vec<(String, IntegrityViolation)>, TreeError> {
        self.verifier.verify_all().await
    }

    //
    // MATERIALIZED PATH
    //

    /// Recompute and persist the materialized path of one node: the trimmed
    /// `path_part` of every ancestor (root first) plus the node's own,
    /// separator-joined.
    pub async fn update_path(&self, node_id: &str) -> Result<TreeNode, TreeError> {
        let node = self.reload(node_id).await?;
        self.refresh_path(&node).await
    }

    async fn refresh_path(&self, node: &TreeNode) -> Result<TreeNode, TreeError> {
        let ancestors = self
            .ancestors(node, true, OrderDirection::Asc)
            .await?;

        let mut segments: Vec<&str> = Vec::with_capacity(ancestors.len() + 1);
        for ancestor in &ancestors {
            if let Some(part) = ancestor.path_part.as_deref() {
                let part = part.trim_matches(|c: char| self.config.path_separator.contains(c));
                if !part.is_empty() {
                    segments.push(part);
                }
            }
        }
        if let Some(part) = node.path_part.as_deref() {
            let part = part.trim_matches(|c: char| self.config.path_separator.contains(c));
            if !part.is_empty() {
                segments.push(part);
            }
        }

        let path = segments.join(&self.config.path_separator);
        self.store.update_path(&node.id, Some(&path)).await?;

        self.reload(&node.id).await
    }

    /// Recompute paths for a moved node and every descendant - their whole
    /// ancestry changed.
    async fn refresh_subtree_paths(&self, node: &TreeNode) -> Result<(), TreeError> {
        for member in self.descendants(node, true, OrderDirection::Asc).await? {
            self.refresh_path(&member).await?;
        }
        Ok(())
    }

    //
    // INTERNALS
    //

    async fn find_root(&self, scope: &str) -> Result<Option<TreeNode>, TreeError> {
        let roots = self
            .store
            .select_nodes(NodeFilter::new().scope(scope).left(Cmp::Eq, 1).limit(1))
            .await?;
        Ok(roots.into_iter().next())
    }

    async fn reload(&self, id: &str) -> Result<TreeNode, TreeError> {
        self.store
            .get_node(id)
            .await?
            .ok_or_else(|| TreeError::node_not_found(id))
    }

    /// Acquire the scope guard for a node and return its freshest state.
    ///
    /// The scope is read before locking, so a concurrent cross-scope move
    /// can invalidate the choice; re-read under the guard and retry until
    /// the locked scope matches the row's scope.
    async fn lock_and_reload(&self, id: &str) -> Result<(ScopeGuard, TreeNode), TreeError> {
        loop {
            let probe = self.reload(id).await?;
            let guard = self.locks.acquire(&probe.scope).await;
            let fresh = self.reload(id).await?;
            if fresh.scope == probe.scope {
                return Ok((guard, fresh));
            }
        }
    }

    /// Lock the scopes of a moving node and its target (sorted order), with
    /// the same revalidation loop as [`lock_and_reload`](Self::lock_and_reload).
    async fn lock_pair_and_reload(
        &self,
        node_id: &str,
        target_id: &str,
    ) -> Result<
        (
            (ScopeGuard, Option<ScopeGuard>),
            TreeNode,
            TreeNode,
        ),
        TreeError,
    > {
        loop {
            let node = self
                .store
                .get_node(node_id)
                .await?
                .ok_or_else(|| TreeError::not_persisted(node_id))?;
            let target = self.reload(target_id).await?;

            let guards = self.locks.acquire_pair(&node.scope, &target.scope).await;

            let fresh_node = self
                .store
                .get_node(node_id)
                .await?
                .ok_or_else(|| TreeError::not_persisted(node_id))?;
            let fresh_target = self.reload(target_id).await?;

            if fresh_node.scope == node.scope && fresh_target.scope == target.scope {
                return Ok((guards, fresh_node, fresh_target));
            }
        }
    }
}
