//! Live connection tracking

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tracing::debug;

/// Server-assigned connection identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionEntry {
    pub peer_pid: Option<u32>,
    pub authenticated: bool,
    pub requests: u64,
}

/// Registry of open connections, shared by every session task
#[derive(Debug)]
pub struct ConnectionRegistry {
    connections: DashMap<ConnectionId, ConnectionEntry>,
    next_id: AtomicU64,
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn register(&self, peer_pid: Option<u32>) -> ConnectionId {
        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.connections.insert(
            id,
            ConnectionEntry {
                peer_pid,
                authenticated: false,
                requests: 0,
            },
        );
        debug!(conn = %id, ?peer_pid, "Registered connection");
        id
    }

    pub fn unregister(&self, id: ConnectionId) {
        if self.connections.remove(&id).is_some() {
            debug!(conn = %id, "Unregistered connection");
        }
    }

    pub fn mark_authenticated(&self, id: ConnectionId) {
        if let Some(mut entry) = self.connections.get_mut(&id) {
            entry.authenticated = true;
        }
    }

    /// Count a handled request, returning the new total
    pub fn record_request(&self, id: ConnectionId) -> u64 {
        match self.connections.get_mut(&id) {
            Some(mut entry) => {
                entry.requests += 1;
                entry.requests
            }
            None => 0,
        }
    }

    pub fn get(&self, id: ConnectionId) -> Option<ConnectionEntry> {
        self.connections.get(&id).map(|entry| entry.clone())
    }

    pub fn count(&self) -> usize {
        self.connections.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_unregister() {
        let registry = ConnectionRegistry::new();
        let a = registry.register(Some(100));
        let b = registry.register(None);
        assert_ne!(a, b);
        assert_eq!(registry.count(), 2);

        registry.mark_authenticated(a);
        assert!(registry.get(a).unwrap().authenticated);
        assert!(!registry.get(b).unwrap().authenticated);

        assert_eq!(registry.record_request(a), 1);
        assert_eq!(registry.record_request(a), 2);

        registry.unregister(a);
        assert!(registry.get(a).is_none());
        assert_eq!(registry.count(), 1);
        assert_eq!(registry.record_request(a), 0);
    }
}
