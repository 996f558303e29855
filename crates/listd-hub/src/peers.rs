//! Registry of connected peer addresses
//!
//! Accept loops add and remove peers concurrently, so the map sits behind a
//! reader/writer lock. Iteration always goes through [`PeerRegistry::snapshot`].

use listd_transport::TransportSender;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

#[derive(Default)]
pub struct PeerRegistry {
    peers: RwLock<HashMap<SocketAddr, Arc<dyn TransportSender>>>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a peer; returns false if the address is already present
    pub fn add(&self, addr: SocketAddr, sender: Arc<dyn TransportSender>) -> bool {
        let mut peers = self.peers.write();
        if peers.contains_key(&addr) {
            return false;
        }
        peers.insert(addr, sender);
        true
    }

    pub fn remove(&self, addr: &SocketAddr) -> Option<Arc<dyn TransportSender>> {
        self.peers.write().remove(addr)
    }

    pub fn contains(&self, addr: &SocketAddr) -> bool {
        self.peers.read().contains_key(addr)
    }

    /// Stable copy of the current peers
    pub fn snapshot(&self) -> Vec<(SocketAddr, Arc<dyn TransportSender>)> {
        self.peers
            .read()
            .iter()
            .map(|(addr, sender)| (*addr, sender.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.peers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use listd_transport::memory;

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    #[test]
    fn test_duplicate_address_rejected() {
        let registry = PeerRegistry::new();
        let (first, _rx1) = memory::channel(1);
        let (second, _rx2) = memory::channel(1);

        assert!(registry.add(addr(4000), Arc::new(first)));
        assert!(!registry.add(addr(4000), Arc::new(second)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_remove_and_snapshot() {
        let registry = PeerRegistry::new();
        for port in 4000..4003 {
            let (tx, _rx) = memory::channel(1);
            registry.add(addr(port), Arc::new(tx));
        }

        let snapshot = registry.snapshot();
        assert!(registry.remove(&addr(4001)).is_some());
        assert!(registry.remove(&addr(4001)).is_none());

        // The snapshot is unaffected by later changes
        assert_eq!(snapshot.len(), 3);
        assert_eq!(registry.len(), 2);
        assert!(!registry.contains(&addr(4001)));
        assert!(registry.contains(&addr(4002)));
    }

    #[test]
    fn test_concurrent_add_remove() {
        let registry = Arc::new(PeerRegistry::new());
        let handles: Vec<_> = (0..8u16)
            .map(|t| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    for i in 0..100u16 {
                        let a = addr(10_000 + t * 100 + i);
                        let (tx, _rx) = memory::channel(1);
                        assert!(registry.add(a, Arc::new(tx)));
                        if i % 2 == 0 {
                            registry.remove(&a);
                        }
                        let _ = registry.snapshot();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(registry.len(), 8 * 50);
        assert!(!registry.is_empty());
    }
}
