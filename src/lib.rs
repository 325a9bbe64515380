//! # Arbor Core
//!
//! A nested-set (Modified Preorder Tree Traversal) forest engine over an
//! embedded libsql database. Ordered trees are stored as flat rows whose
//! `left`/`right`/`level` columns encode the full tree shape, so ancestry,
//! ordering, and subtree membership are pure integer comparisons - and every
//! structural mutation is a handful of bulk `UPDATE`s.
//!
//! ## Layers
//!
//! - [`models`] - the [`TreeNode`](models::TreeNode) row and its invariants
//! - [`db`] - libsql persistence behind the [`NodeStore`](db::NodeStore)
//!   trait, with typed predicates instead of SQL at call sites
//! - [`services`] - the [`TreeService`](services::TreeService) mutation
//!   engine: placement math, gap allocation, per-scope locking, integrity
//!   verification
//!
//! ## Example
//!
//! ```rust,no_run
//! use arbor_core::db::{DatabaseService, TursoStore};
//! use arbor_core::models::NewNodeParams;
//! use arbor_core::services::TreeService;
//! use std::sync::Arc;
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let db = Arc::new(DatabaseService::new("trees.db".into()).await?);
//! let service = TreeService::new(Arc::new(TursoStore::new(db)));
//!
//! let root = service.new_scope("shop", NewNodeParams::default()).await?;
//! let child = service
//!     .insert_as_first_child(NewNodeParams::default(), &root.id)
//!     .await?;
//! assert_eq!((child.left, child.right, child.level), (2, 3, 1));
//! # Ok(())
//! # }
//! ```

pub mod db;
pub mod models;
pub mod services;

pub use db::{DatabaseService, NodeStore, TursoStore};
pub use models::{NewNodeParams, TreeNode};
pub use services::{TreeConfig, TreeError, TreeService};
