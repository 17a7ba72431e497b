//! # Per-Identity Locks
//!
//! Serializes ledger writes that touch the same `(user_id, CardIdentity)`
//! group inside this process.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  record_sale(Charizard NM) ──┐                                          │
//! │                              ├── same key → second waits for first     │
//! │  delete_sale(Charizard NM) ──┘                                          │
//! │                                                                         │
//! │  record_sale(Pikachu LP)   ───── different key → runs in parallel      │
//! │                                                                         │
//! │  update_sale(Charizard NM → Charizard LP)                               │
//! │       └── locks BOTH keys, always in sorted order                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Other processes are kept honest by the guarded lot decrements and SQLite's
//! single-writer transactions, not by these locks.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use cardledger_core::CardIdentity;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;

type LockKey = (String, CardIdentity);

/// Registry of async mutexes, one per identity group.
///
/// Cheap to clone; clones share the registry.
#[derive(Debug, Clone, Default)]
pub struct IdentityLocks {
    registry: Arc<Mutex<HashMap<LockKey, Arc<AsyncMutex<()>>>>>,
}

/// Holds every lock taken by one [`IdentityLocks::acquire`] call.
/// Dropping it releases them.
#[derive(Debug)]
pub struct IdentityGuard {
    _guards: Vec<OwnedMutexGuard<()>>,
}

impl IdentityLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks every distinct identity in `identities` for `user_id`.
    ///
    /// Keys are deduplicated and taken in sorted order, so two callers
    /// locking the same pair of groups can never deadlock.
    pub async fn acquire<I>(&self, user_id: &str, identities: I) -> IdentityGuard
    where
        I: IntoIterator<Item = CardIdentity>,
    {
        let mut keys: Vec<LockKey> = identities
            .into_iter()
            .map(|identity| (user_id.to_string(), identity))
            .collect();
        keys.sort();
        keys.dedup();

        let mutexes: Vec<Arc<AsyncMutex<()>>> = {
            let mut registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
            // Drop entries nobody is holding or waiting on
            registry.retain(|_, mutex| Arc::strong_count(mutex) > 1);
            keys.iter()
                .map(|key| registry.entry(key.clone()).or_default().clone())
                .collect()
        };

        let mut guards = Vec::with_capacity(mutexes.len());
        for (mutex, (_, identity)) in mutexes.into_iter().zip(&keys) {
            debug!(user_id = %user_id, card = %identity, "Acquiring identity lock");
            guards.push(mutex.lock_owned().await);
        }

        IdentityGuard { _guards: guards }
    }

    /// Number of keys currently tracked (for diagnostics).
    pub fn tracked(&self) -> usize {
        self.registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
