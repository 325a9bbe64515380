//! Tree Node Data Structures
//!
//! This module defines the core `TreeNode` struct: one row per node in the
//! nested-set (Modified Preorder Tree Traversal) encoding.
//!
//! # Architecture
//!
//! - **Flat rows**: every node is one row in the `nodes` table
//! - **Nested-set columns**: `left`/`right`/`level` encode the tree shape,
//!   so ancestry and ordering are pure integer comparisons
//! - **Scopes**: multiple independent trees share the table, partitioned by
//!   the `scope` column
//! - **Pure JSON properties**: entity-specific data lives in `properties`,
//!   never in structural columns
//!
//! # Examples
//!
//! ```rust
//! use arbor_core::models::TreeNode;
//! use serde_json::json;
//!
//! let root = TreeNode::new_root("shop".to_string(), "Shop".to_string(), json!({}));
//! assert!(root.is_root());
//! assert!(root.is_leaf());
//! assert_eq!(root.size(), 2);
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Validation errors for TreeNode field values
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Invalid left/right pair: left {left} must be < right {right}")]
    InvalidBounds { left: i64, right: i64 },

    #[error("Invalid level {level}: must be >= 0")]
    InvalidLevel { level: i64 },

    #[error("Scope must not be empty")]
    EmptyScope,

    #[error("Root node must have no parent, got parent {0}")]
    RootWithParent(String),
}

/// One node of an ordered tree, stored as a nested-set row.
///
/// # Structural columns
///
/// - `left`/`right`: preorder entry/exit boundaries. The subtree of a node
///   is exactly the rows whose boundaries fall inside `[left, right]`.
/// - `level`: depth from the root (root = 0).
/// - `parent_id`: immediate parent's id, `None` for the root.
/// - `scope`: which independent tree this row belongs to.
///
/// These five columns are owned by the mutation engine
/// ([`crate::services::TreeService`]); nothing else writes them.
///
/// # Materialized path (optional)
///
/// `path_part` is the node's own segment; `path` is the derived full path
/// from the root, separator-joined. `path` is recomputed by the engine
/// whenever ancestry changes and is never an input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeNode {
    /// Unique identifier (UUID)
    pub id: String,

    /// Which independent tree this node belongs to
    pub scope: String,

    /// Preorder entry boundary (>= 1)
    pub left: i64,

    /// Preorder exit boundary (> left)
    pub right: i64,

    /// Depth from root (root = 0)
    pub level: i64,

    /// Immediate parent's id (None for the root)
    pub parent_id: Option<String>,

    /// Primary content/text of the node
    pub content: String,

    /// This node's own path segment (optional feature)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path_part: Option<String>,

    /// Precomputed full path from root (derived, engine-maintained)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last modification timestamp (bumped by structural writes)
    pub modified_at: DateTime<Utc>,

    /// All entity-specific fields (Pure JSON)
    pub properties: serde_json::Value,
}

/// Caller-supplied fields for a node about to enter a tree.
///
/// Structural columns are always computed by the engine from the insertion
/// target, so callers only provide payload fields. `id` is optional: `None`
/// auto-generates a UUID, `Some` lets a frontend pre-assign one.
#[derive(Debug, Clone, Default)]
pub struct NewNodeParams {
    /// Optional id; auto-generated UUID when None
    pub id: Option<String>,
    /// Primary content/text
    pub content: String,
    /// Own path segment (used only when path calculation is enabled)
    pub path_part: Option<String>,
    /// Entity-specific JSON fields
    pub properties: serde_json::Value,
}

impl TreeNode {
    /// Create a root node for a fresh scope: `left=1, right=2, level=0`.
    pub fn new_root(scope: String, content: String, properties: serde_json::Value) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            scope,
            left: 1,
            right: 2,
            level: 0,
            parent_id: None,
            content,
            path_part: None,
            path: None,
            created_at: now,
            modified_at: now,
            properties,
        }
    }

    /// Build a node from caller params plus engine-computed structural values.
    ///
    /// Used by the insert path only; `right` is always `left + 1` because a
    /// brand-new node is a leaf.
    pub fn from_params(
        params: NewNodeParams,
        scope: String,
        left: i64,
        level: i64,
        parent_id: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: params.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            scope,
            left,
            right: left + 1,
            level,
            parent_id,
            content: params.content,
            path_part: params.path_part,
            path: None,
            created_at: now,
            modified_at: now,
            properties: params.properties,
        }
    }

    /// Validate structural fields against the nested-set invariants that are
    /// checkable on a single row.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.left >= self.right {
            return Err(ValidationError::InvalidBounds {
                left: self.left,
                right: self.right,
            });
        }
        if self.level < 0 {
            return Err(ValidationError::InvalidLevel { level: self.level });
        }
        if self.scope.is_empty() {
            return Err(ValidationError::EmptyScope);
        }
        if self.left == 1 {
            if let Some(parent) = &self.parent_id {
                return Err(ValidationError::RootWithParent(parent.clone()));
            }
        }
        Ok(())
    }

    /// Width of the node's interval: `right - left + 1`.
    ///
    /// This is the gap size a move or delete of this subtree works with
    /// (2 for a leaf, 2 * subtree node count in general).
    pub fn size(&self) -> i64 {
        self.right - self.left + 1
    }

    /// Does this node have children?
    pub fn has_children(&self) -> bool {
        (self.right - self.left) > 1
    }

    /// Is this node a leaf?
    pub fn is_leaf(&self) -> bool {
        !self.has_children()
    }

    /// Is this node the root of its scope?
    pub fn is_root(&self) -> bool {
        self.left == 1
    }

    /// Is this node a descendant of `other`?
    ///
    /// Strict containment: a node is not a descendant of itself.
    pub fn is_descendant_of(&self, other: &TreeNode) -> bool {
        self.left > other.left && self.right < other.right && self.scope == other.scope
    }

    /// Is this node a direct child of `other`?
    pub fn is_child_of(&self, other: &TreeNode) -> bool {
        self.parent_id.as_deref() == Some(other.id.as_str())
    }

    /// Is this node the direct parent of `other`?
    pub fn is_parent_of(&self, other: &TreeNode) -> bool {
        other.parent_id.as_deref() == Some(self.id.as_str())
    }

    /// Is this node a sibling of `other` (same parent, different node)?
    pub fn is_sibling_of(&self, other: &TreeNode) -> bool {
        if self.id == other.id {
            return false;
        }
        match (&self.parent_id, &other.parent_id) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn node(scope: &str, left: i64, right: i64, level: i64, parent: Option<&str>) -> TreeNode {
        let now = Utc::now();
        TreeNode {
            id: Uuid::new_v4().to_string(),
            scope: scope.to_string(),
            left,
            right,
            level,
            parent_id: parent.map(|p| p.to_string()),
            content: String::new(),
            path_part: None,
            path: None,
            created_at: now,
            modified_at: now,
            properties: json!({}),
        }
    }

    #[test]
    fn root_predicates() {
        let root = TreeNode::new_root("shop".to_string(), "Shop".to_string(), json!({}));
        assert!(root.is_root());
        assert!(root.is_leaf());
        assert!(!root.has_children());
        assert_eq!(root.size(), 2);
        assert!(root.validate().is_ok());
    }

    #[test]
    fn descendant_requires_strict_containment_and_same_scope() {
        let outer = node("shop", 1, 6, 0, None);
        let inner = node("shop", 2, 5, 1, Some(&outer.id));
        let foreign = node("other", 2, 5, 1, None);

        assert!(inner.is_descendant_of(&outer));
        assert!(!outer.is_descendant_of(&inner));
        assert!(!outer.is_descendant_of(&outer));
        assert!(!foreign.is_descendant_of(&outer));
    }

    #[test]
    fn parent_child_sibling_predicates() {
        let parent = node("shop", 1, 8, 0, None);
        let a = node("shop", 2, 3, 1, Some(&parent.id));
        let b = node("shop", 4, 5, 1, Some(&parent.id));
        let orphan = node("shop", 6, 7, 1, None);

        assert!(a.is_child_of(&parent));
        assert!(parent.is_parent_of(&a));
        assert!(a.is_sibling_of(&b));
        assert!(!a.is_sibling_of(&a));
        assert!(!a.is_sibling_of(&orphan));
    }

    #[test]
    fn validate_rejects_inverted_bounds_and_rooted_parent() {
        let mut bad = node("shop", 4, 4, 1, None);
        assert!(matches!(
            bad.validate(),
            Err(ValidationError::InvalidBounds { .. })
        ));

        bad.left = 1;
        bad.right = 2;
        bad.parent_id = Some("someone".to_string());
        assert!(matches!(
            bad.validate(),
            Err(ValidationError::RootWithParent(_))
        ));
    }

    #[test]
    fn from_params_builds_a_leaf() {
        let params = NewNodeParams {
            id: Some("fixed-id".to_string()),
            content: "A".to_string(),
            path_part: Some("a".to_string()),
            properties: json!({"k": 1}),
        };
        let node =
            TreeNode::from_params(params, "shop".to_string(), 2, 1, Some("root-id".to_string()));
        assert_eq!(node.id, "fixed-id");
        assert_eq!(node.left, 2);
        assert_eq!(node.right, 3);
        assert_eq!(node.level, 1);
        assert_eq!(node.parent_id.as_deref(), Some("root-id"));
        assert!(node.is_leaf());
    }
}
