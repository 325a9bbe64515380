//! Database Layer
//!
//! This module handles all database interactions using libsql:
//!
//! - Database initialization and connection management
//! - Typed predicate building (no ad-hoc SQL at call sites)
//! - The [`NodeStore`] trait: the boundary the tree engine talks through
//! - [`TursoStore`]: the libsql implementation of that boundary
//!
//! # Architecture
//!
//! The engine never constructs SQL. Reads go through [`NodeFilter`]; the
//! only writes are the three bulk statements ([`NodeStore::shift_positions`],
//! [`NodeStore::relocate_subtree`], [`NodeStore::delete_subtree`]) plus
//! single-row create/update, all parameterized inside [`TursoStore`].

mod database;
mod error;
mod filter;
mod node_store;
mod turso_store;

pub use database::DatabaseService;
pub use error::DatabaseError;
pub use filter::{Cmp, NodeFilter, OrderDirection, PositionColumn};
pub use node_store::{NodeStore, SubtreeRelocation};
pub use turso_store::TursoStore;
