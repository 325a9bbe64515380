//! Service Layer
//!
//! The tree engine proper, layered over the [`crate::db`] row store:
//!
//! - [`TreeService`] - the mutation engine and query facade
//! - [`position`] - pure placement math (where a node lands)
//! - [`SpaceAllocator`] - gap opening/closing in the boundary sequence
//! - [`ScopeLocks`] - per-scope mutation exclusivity
//! - [`IntegrityVerifier`] - post-hoc structural scans
//!
//! Everything structural flows through [`TreeService`]; the other pieces
//! are its internals, exported for direct use in tests and tooling.

pub mod error;
pub mod position;
pub mod scope_lock;
pub mod space;
pub mod tree_service;
pub mod verifier;


pub use error::TreeError;
pub use position::{plan_insert, plan_move, InsertPlan, MovePlan, Placement};
pub use scope_lock::{ScopeGuard, ScopeLocks};
pub use space::{SpaceAllocator, DEFAULT_GAP};
pub use tree_service::{TreeConfig, TreeService};
pub use verifier::{IntegrityVerifier, IntegrityViolation};
