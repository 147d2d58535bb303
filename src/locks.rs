//! Per-connector advisory locks
//!
//! Sync execution and on-demand token refresh must not interleave for the
//! same connector: both end in a delete-then-insert on the single OAuth
//! credentials row. A concurrent trigger gets a clean conflict instead of a
//! race. Connectors are independent, so distinct connectors never contend.
//!
//! The lock is in-process; cross-process deployments keep a single writer
//! per connector as a documented constraint.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Advisory try-lock map keyed by connector id.
#[derive(Clone, Default)]
pub struct ConnectorLocks {
    held: Arc<Mutex<HashMap<Uuid, ()>>>,
}

/// RAII guard releasing the connector lock on drop.
pub struct ConnectorLockGuard {
    held: Arc<Mutex<HashMap<Uuid, ()>>>,
    connector_id: Uuid,
}

impl ConnectorLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to acquire the lock for a connector. Returns `None` when another
    /// sync or refresh currently holds it.
    pub fn try_acquire(&self, connector_id: Uuid) -> Option<ConnectorLockGuard> {
        let mut held = self.held.lock().expect("lock map poisoned");
        if held.contains_key(&connector_id) {
            return None;
        }
        held.insert(connector_id, ());
        Some(ConnectorLockGuard {
            held: self.held.clone(),
            connector_id,
        })
    }
}

impl Drop for ConnectorLockGuard {
    fn drop(&mut self) {
        let mut held = self.held.lock().expect("lock map poisoned");
        held.remove(&self.connector_id);
    }
}
