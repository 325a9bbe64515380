//! Service Layer Error Types
//!
//! Error taxonomy for tree operations. Precondition violations and missing
//! rows are ordinary `Err` results so batch callers can continue; store
//! failures propagate unchanged and are never retried.

use crate::db::DatabaseError;
use crate::models::ValidationError;
use thiserror::Error;

/// Tree operation errors
#[derive(Error, Debug)]
pub enum TreeError {
    /// Node not found by id
    #[error("Node not found: {id}")]
    NodeNotFound { id: String },

    /// A scope has no root row
    #[error("Root not found for scope: {scope}")]
    RootNotFound { scope: String },

    /// Insert called with an id that is already in a tree
    #[error("Node already persisted: {id} (use a move operation instead)")]
    AlreadyPersisted { id: String },

    /// Move called on a node that was never inserted
    #[error("Node not persisted: {id} (insert it before moving)")]
    NotPersisted { id: String },

    /// Move would place a node inside its own subtree
    #[error("Circular reference: {target_id} is a descendant of {node_id}")]
    CircularReference { node_id: String, target_id: String },

    /// Sibling-relative move aimed at a root (roots have no siblings)
    #[error("Root node {target_id} cannot be the target of a sibling move")]
    RootTargetNotAllowed { target_id: String },

    /// Node field validation failed
    #[error("Node validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),

    /// Database operation failed
    #[error("Database operation failed: {0}")]
    Database(#[from] DatabaseError),

    /// Store operation failed (via the NodeStore trait boundary)
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl TreeError {
    /// Create a node not found error
    pub fn node_not_found(id: impl Into<String>) -> Self {
        Self::NodeNotFound { id: id.into() }
    }

    /// Create a root not found error
    pub fn root_not_found(scope: impl Into<String>) -> Self {
        Self::RootNotFound {
            scope: scope.into(),
        }
    }

    /// Create an already persisted error
    pub fn already_persisted(id: impl Into<String>) -> Self {
        Self::AlreadyPersisted { id: id.into() }
    }

    /// Create a not persisted error
    pub fn not_persisted(id: impl Into<String>) -> Self {
        Self::NotPersisted { id: id.into() }
    }

    /// Create a circular reference error
    pub fn circular_reference(node_id: impl Into<String>, target_id: impl Into<String>) -> Self {
        Self::CircularReference {
            node_id: node_id.into(),
            target_id: target_id.into(),
        }
    }

    /// Create a root target not allowed error
    pub fn root_target_not_allowed(target_id: impl Into<String>) -> Self {
        Self::RootTargetNotAllowed {
            target_id: target_id.into(),
        }
    }
}
