//! Route table (C1): a concurrent map from route id to compiled route,
//! implemented as an RCU structure per spec §9's redesign note — an
//! `ArcSwap<HashMap<...>>` swapped atomically on every mutation, with a
//! short-lived mutex serializing concurrent writers so two mutations never
//! race on the clone-and-swap. Readers never take a lock.

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use tokio::sync::Mutex as AsyncMutex;

use super::route::{Route, RouteId};

type Table = HashMap<RouteId, Arc<Route>>;

pub struct RouteTable {
    inner: ArcSwap<Table>,
    // Serializes writers so a read-modify-swap cycle never loses a
    // concurrent mutation; readers are entirely unaffected by this lock.
    write_lock: AsyncMutex<()>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self {
            inner: ArcSwap::from_pointee(HashMap::new()),
            write_lock: AsyncMutex::new(()),
        }
    }

    /// Insert `route`, keyed by its `uid`. Overwrites a route already stored
    /// under the same uid (not expected in normal operation — uids are
    /// freshly generated per `Route::new`).
    pub async fn store(&self, route: Route) {
        let _guard = self.write_lock.lock().await;
        let current = self.inner.load();
        let mut next: Table = (**current).clone();
        next.insert(route.uid, Arc::new(route));
        self.inner.store(Arc::new(next));
    }

    /// Remove a route by id. Idempotent: removing an unknown id is a no-op
    /// (spec §4.3 "removeRoute... idempotent").
    pub async fn delete(&self, id: RouteId) -> Option<Arc<Route>> {
        let _guard = self.write_lock.lock().await;
        let current = self.inner.load();
        if !current.contains_key(&id) {
            return None;
        }
        let mut next: Table = (**current).clone();
        let removed = next.remove(&id);
        self.inner.store(Arc::new(next));
        removed
    }

    /// Load the current snapshot `Arc` once. The returned snapshot is
    /// immutable and can't observe a write that starts after this load —
    /// the precise guarantee spec §4.1 requires of `rangeSnapshot`.
    pub fn snapshot(&self) -> Arc<Table> {
        self.inner.load_full()
    }

    pub fn get(&self, id: RouteId) -> Option<Arc<Route>> {
        self.inner.load().get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::new()
    }
}
