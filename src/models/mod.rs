//! Data Models
//!
//! Core data structures for the nested-set forest:
//!
//! - [`TreeNode`] - one stored row per tree node
//! - [`NewNodeParams`] - caller-supplied fields for node creation
//! - [`ValidationError`] - per-row structural validation failures

mod node;

pub use node::{NewNodeParams, TreeNode, ValidationError};
