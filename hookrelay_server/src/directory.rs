//! Registry of live viewer connections, partitioned by endpoint

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Identifier of one live viewer session
pub type ConnectionId = Uuid;

/// Outbound half of a viewer: serialized events, shared between recipients
pub type ViewerSender = mpsc::Sender<Arc<str>>;

#[derive(Default)]
struct Inner {
    /// endpoint -> connection -> delivery handle
    endpoints: HashMap<String, HashMap<ConnectionId, ViewerSender>>,
    /// connection -> endpoint, for removal without knowing the endpoint
    connections: HashMap<ConnectionId, String>,
}

/// Live viewers by endpoint.
///
/// Both indexes sit behind one lock so every operation updates them
/// together. The lock is only held for map operations, never across an
/// await or a send.
#[derive(Default)]
pub struct ConnectionDirectory {
    inner: Mutex<Inner>,
}

impl ConnectionDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register a viewer. Re-adding a known connection replaces it,
    /// moving it to `endpoint_id` if it was watching another endpoint.
    pub fn add(&self, connection_id: ConnectionId, endpoint_id: &str, sender: ViewerSender) {
        let mut inner = self.lock();

        if let Some(previous) = inner.connections.insert(connection_id, endpoint_id.to_string()) {
            if previous != endpoint_id {
                detach(&mut inner, connection_id, &previous);
            }
        }

        inner
            .endpoints
            .entry(endpoint_id.to_string())
            .or_default()
            .insert(connection_id, sender);
    }

    /// Remove a viewer. Returns `false` if it was already gone, so a close
    /// and a disconnect for the same connection can both call this.
    pub fn remove_by_connection_id(&self, connection_id: ConnectionId) -> bool {
        let mut inner = self.lock();

        match inner.connections.remove(&connection_id) {
            Some(endpoint_id) => {
                detach(&mut inner, connection_id, &endpoint_id);
                true
            }
            None => false,
        }
    }

    /// Connections watching `endpoint_id` right now
    pub fn list_by_endpoint(&self, endpoint_id: &str) -> HashSet<ConnectionId> {
        self.lock()
            .endpoints
            .get(endpoint_id)
            .map(|viewers| viewers.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Snapshot of delivery handles for `endpoint_id`, taken under the lock
    /// and used after it is released
    pub fn recipients(&self, endpoint_id: &str) -> Vec<(ConnectionId, ViewerSender)> {
        self.lock()
            .endpoints
            .get(endpoint_id)
            .map(|viewers| {
                viewers
                    .iter()
                    .map(|(id, sender)| (*id, sender.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Total live viewer connections
    pub fn connection_count(&self) -> usize {
        self.lock().connections.len()
    }

    /// Endpoints with at least one live viewer
    pub fn endpoint_count(&self) -> usize {
        self.lock().endpoints.len()
    }
}

/// Drop `connection_id` from an endpoint's viewer set, pruning empty sets
fn detach(inner: &mut Inner, connection_id: ConnectionId, endpoint_id: &str) {
    if let Some(viewers) = inner.endpoints.get_mut(endpoint_id) {
        viewers.remove(&connection_id);
        if viewers.is_empty() {
            inner.endpoints.remove(endpoint_id);
        }
    }
}
