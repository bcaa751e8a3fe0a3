//! Peer-Schluessel-Speicher (Trust on first use)
//!
//! Zuordnung Benutzername -> abgeleiteter AES-256 Schluessel. Wird vom
//! Empfangspfad (Ankuendigungen) beschrieben und vom Sendepfad gelesen.
//! Jede neue Ankuendigung ersetzt den bisherigen Eintrag, Eintraege werden
//! nie entfernt.

use dashmap::DashMap;
use hubcrypt_core::PeerId;
use std::sync::Arc;

use crate::types::SymmetricKey;

/// Nebenlaeufig nutzbarer Speicher fuer Peer-Schluessel
#[derive(Debug, Default)]
pub struct PeerKeyStore {
    keys: DashMap<PeerId, Arc<SymmetricKey>>,
}

impl PeerKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Speichert den Schluessel eines Peers und ersetzt einen vorhandenen
    ///
    /// Gibt den vorherigen Schluessel zurueck (falls vorhanden).
    pub fn upsert(&self, peer: PeerId, key: SymmetricKey) -> Option<Arc<SymmetricKey>> {
        self.keys.insert(peer, Arc::new(key))
    }

    /// Gibt den Schluessel eines Peers zurueck
    pub fn get(&self, peer: &str) -> Option<Arc<SymmetricKey>> {
        self.keys.get(peer).map(|entry| Arc::clone(&*entry))
    }

    /// Alle bekannten Peers, sortiert
    pub fn known_peers(&self) -> Vec<PeerId> {
        let mut peers: Vec<PeerId> = self.keys.iter().map(|e| e.key().clone()).collect();
        peers.sort();
        peers
    }

    pub fn contains(&self, peer: &str) -> bool {
        self.keys.contains_key(peer)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_und_get() {
        let store = PeerKeyStore::new();
        assert!(store.is_empty());
        assert!(store.get("bob").is_none());

        assert!(store.upsert(PeerId::from("bob"), SymmetricKey::new([1; 32])).is_none());
        assert_eq!(store.get("bob").unwrap().as_bytes(), &[1; 32]);
        assert!(store.contains("bob"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn upsert_ersetzt_immer() {
        let store = PeerKeyStore::new();
        store.upsert(PeerId::from("bob"), SymmetricKey::new([1; 32]));

        let alt = store
            .upsert(PeerId::from("bob"), SymmetricKey::new([2; 32]))
            .expect("vorheriger Schluessel");
        assert_eq!(alt.as_bytes(), &[1; 32]);
        assert_eq!(store.get("bob").unwrap().as_bytes(), &[2; 32]);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn known_peers_sortiert() {
        let store = PeerKeyStore::new();
        for name in ["carol", "alice", "bob"] {
            store.upsert(PeerId::from(name), SymmetricKey::new([0; 32]));
        }
        assert_eq!(
            store.known_peers(),
            vec![PeerId::from("alice"), PeerId::from("bob"), PeerId::from("carol")]
        );
    }

    #[test]
    fn nebenlaeufige_schreib_und_lesezugriffe() {
        let store = Arc::new(PeerKeyStore::new());
        let handles: Vec<_> = (0..8u8)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for j in 0..100u8 {
                        let peer = PeerId::new(format!("peer-{}", j % 10));
                        store.upsert(peer.clone(), SymmetricKey::new([i; 32]));
                        assert!(store.get(peer.as_str()).is_some());
                        let _ = store.known_peers();
                    }
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(store.len(), 10);
    }
}
