use crate::association::{AssociationHandle, AssociationId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

#[derive(Default)]
struct Members {
    live: HashMap<AssociationId, Arc<AssociationHandle>>,
    shut_down: bool,
}

/// Registry tracks every association that reached the relay phase so the
/// server can close them all on shutdown
#[derive(Default)]
pub struct Registry {
    members: Mutex<Members>,
}

impl Registry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn members(&self) -> MutexGuard<'_, Members> {
        self.members.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// add inserts the association if it is not already present. After
    /// `close_all` the association is closed instead and false is returned
    pub fn add(&self, handle: Arc<AssociationHandle>) -> bool {
        let refused = {
            let mut members = self.members();
            if members.shut_down || handle.is_closed() {
                true
            } else {
                members.live.entry(handle.id()).or_insert(handle.clone());
                false
            }
        };

        if refused {
            // Lock released: close re-enters remove
            handle.close();
            return false;
        }
        debug!("association {} registered", handle.id());
        true
    }

    /// remove drops the association if present
    pub fn remove(&self, id: AssociationId) {
        if self.members().live.remove(&id).is_some() {
            debug!("association {id} deregistered");
        }
    }

    /// snapshot returns the current members
    pub fn snapshot(&self) -> Vec<Arc<AssociationHandle>> {
        self.members().live.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.members().live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// close_all closes every live association and refuses later additions.
    /// Returns how many associations this call closed
    pub fn close_all(&self) -> usize {
        let members = {
            let mut members = self.members();
            members.shut_down = true;
            members.live.values().cloned().collect::<Vec<_>>()
        };

        members.iter().filter(|handle| handle.close()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;

    fn peer() -> SocketAddr {
        "127.0.0.1:50000".parse().unwrap()
    }

    #[test]
    fn add_is_idempotent() {
        let registry = Registry::new();
        let handle = AssociationHandle::new(peer(), &registry);

        assert!(registry.add(handle.clone()));
        assert!(registry.add(handle.clone()));
        assert_eq!(registry.len(), 1);

        registry.remove(handle.id());
        registry.remove(handle.id());
        assert!(registry.is_empty());
    }

    #[test]
    fn close_deregisters() {
        let registry = Registry::new();
        let handles: Vec<_> = (0..3)
            .map(|_| AssociationHandle::new(peer(), &registry))
            .collect();
        for handle in &handles {
            assert!(registry.add(handle.clone()));
        }
        assert_eq!(registry.len(), 3);

        assert!(handles[1].close());
        assert!(!handles[1].close());
        assert_eq!(registry.len(), 2);
        assert!(!registry.snapshot().iter().any(|h| h.id() == handles[1].id()));
    }

    #[test]
    fn close_all_empties_and_refuses() {
        let registry = Registry::new();
        for _ in 0..4 {
            let handle = AssociationHandle::new(peer(), &registry);
            registry.add(handle);
        }

        assert_eq!(registry.close_all(), 4);
        assert!(registry.is_empty());

        let late = AssociationHandle::new(peer(), &registry);
        assert!(!registry.add(late.clone()));
        assert!(late.is_closed());
        assert!(registry.is_empty());
        assert_eq!(registry.close_all(), 0);
    }

    #[test]
    fn closed_handle_is_not_added() {
        let registry = Registry::new();
        let handle = AssociationHandle::new(peer(), &registry);
        handle.close();
        assert!(!registry.add(handle));
        assert!(registry.is_empty());
    }

    #[test]
    fn concurrent_close_happens_once() {
        let registry = Registry::new();
        let handle = AssociationHandle::new(peer(), &registry);
        registry.add(handle.clone());

        let closers: Vec<_> = (0..8)
            .map(|_| {
                let handle = handle.clone();
                std::thread::spawn(move || handle.close())
            })
            .collect();
        let bulk = {
            let registry = registry.clone();
            std::thread::spawn(move || registry.close_all())
        };

        let mut closed = closers
            .into_iter()
            .map(|t| t.join().unwrap())
            .filter(|closed| *closed)
            .count();
        closed += bulk.join().unwrap();

        assert_eq!(closed, 1);
        assert!(registry.is_empty());
    }
}
