//! Per-entity exclusive ownership for concurrent merges

use crate::types::EntityId;
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;
use tracing::debug;

/// Set of entity ids currently owned by an in-flight merge.
///
/// A merge claims both of its ids before the existence check and releases
/// them after apply. Merges on disjoint pairs never wait on each other.
#[derive(Debug, Default)]
pub struct EntityLocks {
    held: Mutex<HashSet<EntityId>>,
    released: Notify,
}

impl EntityLocks {
    /// Create an empty lock set
    pub fn new() -> Self {
        Self::default()
    }

    fn held(&self) -> MutexGuard<'_, HashSet<EntityId>> {
        self.held.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claim every id in `ids`, or none if any is already held
    pub fn try_claim(&self, ids: &[EntityId]) -> Option<EntityClaim<'_>> {
        let mut held = self.held();
        if ids.iter().any(|id| held.contains(id)) {
            return None;
        }
        let ids: Vec<EntityId> = ids.iter().copied().collect::<HashSet<_>>().into_iter().collect();
        held.extend(ids.iter().copied());
        Some(EntityClaim { locks: self, ids })
    }

    /// Wait until every id in `ids` can be claimed together
    pub async fn claim(&self, ids: &[EntityId]) -> EntityClaim<'_> {
        loop {
            // Registered before the check so a release in between is not missed.
            let released = self.released.notified();
            if let Some(claim) = self.try_claim(ids) {
                return claim;
            }
            debug!(?ids, "waiting for entity claim");
            released.await;
        }
    }

    /// Whether `id` is currently claimed
    pub fn is_held(&self, id: EntityId) -> bool {
        self.held().contains(&id)
    }
}

/// Ownership of a set of entity ids; released on drop
#[derive(Debug)]
pub struct EntityClaim<'a> {
    locks: &'a EntityLocks,
    ids: Vec<EntityId>,
}

impl EntityClaim<'_> {
    /// Claimed ids
    pub fn ids(&self) -> &[EntityId] {
        &self.ids
    }
}

impl Drop for EntityClaim<'_> {
    fn drop(&mut self) {
        let mut held = self.locks.held();
        for id in &self.ids {
            held.remove(id);
        }
        drop(held);
        self.locks.released.notify_waiters();
    }
}
