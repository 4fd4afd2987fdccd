//! PeerRegistry: the deduplicated, ordered view of discovered peers.
//!
//! The registry is the agent's in-memory database of every peer currently
//! visible on the network.  Discovery snapshots arrive as `upsert`/`remove`
//! calls; the UI-facing `list()` applies the presentation ordering:
//! case-insensitive by display name, ties broken by discovery order so the
//! list is stable while peers come and go.
//!
//! Identity is the [`PeerEndpoint`].  Re-resolving a service replaces the
//! stored entry (name, address, and protection flag may all change) but keeps
//! the original discovery order, so a peer does not jump around the list when
//! its advertisement refreshes.
//!
//! Pure data transform; no I/O, no locking.  The agent keeps the registry
//! behind its state mutex.

use std::collections::HashMap;

use crate::domain::peer::{Peer, PeerEndpoint};

#[derive(Debug, Clone)]
struct Entry {
    peer: Peer,
    /// Monotonic insertion rank, assigned on first sight of an endpoint.
    order: u64,
}

/// In-memory registry of all currently visible peers.
#[derive(Debug, Default)]
pub struct PeerRegistry {
    peers: HashMap<PeerEndpoint, Entry>,
    next_order: u64,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a newly discovered peer or refreshes an existing one.
    ///
    /// A refresh keeps the peer's original discovery order.
    pub fn upsert(&mut self, peer: Peer) {
        match self.peers.get_mut(&peer.endpoint) {
            Some(entry) => entry.peer = peer,
            None => {
                let order = self.next_order;
                self.next_order += 1;
                self.peers
                    .insert(peer.endpoint.clone(), Entry { peer, order });
            }
        }
    }

    /// Removes a peer that disappeared from the network.
    ///
    /// Returns the removed peer, or `None` if the endpoint was unknown.
    pub fn remove(&mut self, endpoint: &PeerEndpoint) -> Option<Peer> {
        self.peers.remove(endpoint).map(|e| e.peer)
    }

    /// Looks up a peer by identity.
    pub fn get(&self, endpoint: &PeerEndpoint) -> Option<&Peer> {
        self.peers.get(endpoint).map(|e| &e.peer)
    }

    /// Returns all peers sorted case-insensitively by display name ascending,
    /// equal names ordered by discovery order.  Never contains two peers with
    /// the same endpoint (the map guarantees it).
    pub fn list(&self) -> Vec<Peer> {
        let mut entries: Vec<&Entry> = self.peers.values().collect();
        entries.sort_by(|a, b| {
            a.peer
                .display_name()
                .to_lowercase()
                .cmp(&b.peer.display_name().to_lowercase())
                .then(a.order.cmp(&b.order))
        });
        entries.into_iter().map(|e| e.peer.clone()).collect()
    }

    /// Drops every peer.  Called when discovery stops.
    pub fn clear(&mut self) {
        self.peers.clear();
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
