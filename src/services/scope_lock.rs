//! Per-Scope Exclusivity
//!
//! Tree mutation is a critical section per scope: the gap arithmetic assumes
//! no other mutation renumbers the same scope mid-flight. [`ScopeLocks`]
//! hands out one async mutex per scope, created lazily and held as an owned
//! guard for the full duration of a mutation (reload, gap open/close, row
//! writes). Mutations on different scopes proceed concurrently; traversal
//! queries never take a lock and read committed state.

use std::collections::HashMap;
use std::sync::Mutex as StdMutex;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Guard held for the duration of one mutation on one scope.
pub type ScopeGuard = OwnedMutexGuard<()>;

/// Lazily-populated map of per-scope mutexes.
///
/// The std mutex only protects the map itself and is never held across an
/// await; waiting for a scope happens on the tokio mutex.
#[derive(Default)]
pub struct ScopeLocks {
    inner: StdMutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ScopeLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, scope: &str) -> Arc<Mutex<()>> {
        let mut map = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        map.entry(scope.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Acquire the exclusivity guard for one scope.
    pub async fn acquire(&self, scope: &str) -> ScopeGuard {
        self.lock_for(scope).lock_owned().await
    }

    /// Acquire guards for two scopes, always in sorted order so concurrent
    /// cross-scope moves cannot deadlock. When both names are equal a single
    /// guard is returned.
    pub async fn acquire_pair(&self, a: &str, b: &str) -> (ScopeGuard, Option<ScopeGuard>) {
        if a == b {
            return (self.acquire(a).await, None);
        }
        let (first, second) = if a < b { (a, b) } else { (b, a) };
        let first_guard = self.acquire(first).await;
        let second_guard = self.acquire(second).await;
        (first_guard, Some(second_guard))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn same_scope_serializes() {
        let locks = Arc::new(ScopeLocks::new());

        let guard = locks.acquire("shop").await;

        let locks2 = locks.clone();
        let contender = tokio::spawn(async move {
            let _g = locks2.acquire("shop").await;
        });

        // the second acquire must block while the guard lives
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), contender)
            .await
            .expect("contender should finish after release")
            .unwrap();
    }

    #[tokio::test]
    async fn different_scopes_are_independent() {
        let locks = ScopeLocks::new();
        let _shop = locks.acquire("shop").await;

        // must not block
        let other = tokio::time::timeout(Duration::from_millis(100), locks.acquire("blog"))
            .await
            .expect("independent scope should lock immediately");
        drop(other);
    }

    #[tokio::test]
    async fn pair_acquisition_orders_scopes() {
        let locks = ScopeLocks::new();
        let (first, second) = locks.acquire_pair("zebra", "apple").await;
        assert!(second.is_some());
        drop(first);
        drop(second);

        let (_only, none) = locks.acquire_pair("same", "same").await;
        assert!(none.is_none());
    }
}
