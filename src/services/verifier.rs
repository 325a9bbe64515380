//! Integrity Verifier
//!
//! Post-hoc structural scan of a scope. Detects boundary values that
//! slipped past the root's interval, inverted rows, and duplicated
//! boundary values. Reports the first violation found and never repairs
//! anything.
//!
//! This is diagnostic and test tooling, not a hot path: the duplicate scan
//! issues two count queries per boundary value by design - correctness over
//! speed.

use crate::db::{Cmp, NodeFilter, NodeStore};
use crate::services::error::TreeError;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

/// One detected structural violation, categorized.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IntegrityViolation {
    /// Rows whose boundaries exceed the root's right value
    #[error("Some nodes slipped out of bounds: {count} row(s) beyond boundary {end}")]
    OutOfBounds { end: i64, count: u64 },

    /// Rows with `left >= right`
    #[error("Disturbance of structure: {count} row(s) with left >= right")]
    Inverted { count: u64 },

    /// A boundary value used by more than one row
    #[error("Broken structure: boundary value {value} is used by more than one node")]
    DuplicateBoundary { value: i64 },
}

impl IntegrityViolation {
    /// Short category tag for operator-facing reports.
    pub fn category(&self) -> &'static str {
        match self {
            IntegrityViolation::OutOfBounds { .. } => "out-of-bounds",
            IntegrityViolation::Inverted { .. } => "inversion",
            IntegrityViolation::DuplicateBoundary { .. } => "duplicate-boundary",
        }
    }
}

/// Read-only structural scanner over a [`NodeStore`].
pub struct IntegrityVerifier {
    store: Arc<dyn NodeStore>,
}

impl IntegrityVerifier {
    pub fn new(store: Arc<dyn NodeStore>) -> Self {
        Self { store }
    }

    /// Scan one scope. `Ok(None)` means the scope passed all three checks;
    /// `Ok(Some(violation))` reports the first failure.
    ///
    /// Fails with [`TreeError::RootNotFound`] when the scope has no root
    /// row to anchor the boundary interval.
    pub async fn verify(&self, scope: &str) -> Result<Option<IntegrityViolation>, TreeError> {
        let roots = self
            .store
            .select_nodes(NodeFilter::new().scope(scope).left(Cmp::Eq, 1).limit(1))
            .await?;
        let root = roots
            .into_iter()
            .next()
            .ok_or_else(|| TreeError::root_not_found(scope))?;

        let end = root.right;

        // 1. Out of bounds: either boundary beyond the root's right value.
        // A row can trip both counts; subtract the overlap so every
        // offending row is reported once.
        let past_left = self
            .store
            .count_nodes(NodeFilter::new().scope(scope).left(Cmp::Gt, end))
            .await?;
        let past_right = self
            .store
            .count_nodes(NodeFilter::new().scope(scope).right(Cmp::Gt, end))
            .await?;
        let past_both = self
            .store
            .count_nodes(
                NodeFilter::new()
                    .scope(scope)
                    .left(Cmp::Gt, end)
                    .right(Cmp::Gt, end),
            )
            .await?;
        if past_left + past_right > past_both {
            let violation = IntegrityViolation::OutOfBounds {
                end,
                count: past_left + past_right - past_both,
            };
            warn!(scope, %violation, "integrity check failed");
            return Ok(Some(violation));
        }

        // 2. Inversion: left >= right is impossible in a well-formed tree.
        let inverted = self
            .store
            .count_nodes(NodeFilter::new().scope(scope).inverted())
            .await?;
        if inverted > 0 {
            let violation = IntegrityViolation::Inverted { count: inverted };
            warn!(scope, %violation, "integrity check failed");
            return Ok(Some(violation));
        }

        // 3. Duplication: every value in [1, end] may appear at most once
        // across both boundary columns. A single row can never match twice
        // here because check 2 already guaranteed left < right.
        for value in 1..=end {
            let lefts = self
                .store
                .count_nodes(NodeFilter::new().scope(scope).left(Cmp::Eq, value))
                .await?;
            let rights = self
                .store
                .count_nodes(NodeFilter::new().scope(scope).right(Cmp::Eq, value))
                .await?;
            if lefts + rights > 1 {
                let violation = IntegrityViolation::DuplicateBoundary { value };
                warn!(scope, %violation, "integrity check failed");
                return Ok(Some(violation));
            }
        }

        Ok(None)
    }

    /// Scan every scope in the store; returns the scopes that failed with
    /// their first violation each.
    pub async fn verify_all(&self) -> Result<Vec<(String, IntegrityViolation)>, TreeError> {
        let mut failures = Vec::new();
        for scope in self.store.list_scopes().await? {
            if let Some(violation) = self.verify(&scope).await? {
                failures.push((scope, violation));
            }
        }
        Ok(failures)
    }
}
