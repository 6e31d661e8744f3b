use std::{
    collections::{HashMap, HashSet, hash_map::Entry},
    time::Instant,
};

use tokio::sync::mpsc;
use tracing::warn;

use super::identity::{PeerId, RoomId};

/// What the relay asks a connection's writer to do, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Text(String),
    Close(String),
}

/// Send/close capability for one connection.
///
/// Pushes never wait on the remote end; the writer task on the other side
/// of the channel deals with the socket.
#[derive(Debug, Clone)]
pub struct PeerHandle {
    tx: mpsc::UnboundedSender<Outbound>,
}

impl PeerHandle {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn send(&self, text: String) -> bool {
        self.tx.send(Outbound::Text(text)).is_ok()
    }

    pub fn close(&self, reason: &str) -> bool {
        self.tx.send(Outbound::Close(reason.to_owned())).is_ok()
    }

    pub fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }
}

#[derive(Debug)]
pub struct Peer {
    pub id: PeerId,
    pub handle: PeerHandle,
    pub rooms: HashSet<RoomId>,
    pub last_activity: Instant,
}

#[derive(Debug, Default)]
pub struct PeerRegistry {
    peers: HashMap<PeerId, Peer>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a fresh peer with no rooms. An id collision overwrites the old
    /// record; the caller is expected to have checked `contains` first.
    pub fn register(&mut self, id: PeerId, handle: PeerHandle) -> &Peer {
        let peer = Peer {
            id: id.clone(),
            handle,
            rooms: HashSet::new(),
            last_activity: Instant::now(),
        };

        match self.peers.entry(id) {
            Entry::Occupied(mut entry) => {
                warn!(peer = %entry.key(), "peer id collision, replacing record");
                entry.insert(peer);
                entry.into_mut()
            }
            Entry::Vacant(entry) => entry.insert(peer),
        }
    }

    pub fn lookup(&self, id: &str) -> Option<&Peer> {
        self.peers.get(id)
    }

    pub fn lookup_mut(&mut self, id: &str) -> Option<&mut Peer> {
        self.peers.get_mut(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.peers.contains_key(id)
    }

    /// Drops the record only. Room membership must already be gone.
    pub fn unregister(&mut self, id: &str) -> Option<Peer> {
        self.peers.remove(id)
    }

    pub fn record_activity(&mut self, id: &str) -> bool {
        match self.peers.get_mut(id) {
            Some(peer) => {
                peer.last_activity = Instant::now();
                true
            }
            None => false,
        }
    }

    /// Peers whose last activity is strictly older than `cutoff`.
    pub fn idle_since(&self, cutoff: Instant) -> Vec<PeerId> {
        self.peers
            .values()
            .filter(|peer| peer.last_activity < cutoff)
            .map(|peer| peer.id.clone())
            .collect()
    }

    pub fn ids(&self) -> Vec<PeerId> {
        self.peers.keys().cloned().collect()
    }

    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn register_then_lookup() {
        let mut peers = PeerRegistry::new();
        let (handle, _rx) = PeerHandle::channel();
        let peer = peers.register(PeerId::from("alice"), handle);
        assert!(peer.rooms.is_empty());

        assert!(peers.contains("alice"));
        assert_eq!(peers.lookup("alice").map(|p| p.id.as_str()), Some("alice"));
        assert!(peers.lookup("bob").is_none());
    }

    #[test]
    fn collision_replaces_handle() {
        let mut peers = PeerRegistry::new();
        let (first, mut first_rx) = PeerHandle::channel();
        let (second, mut second_rx) = PeerHandle::channel();
        peers.register(PeerId::from("alice"), first);
        peers.register(PeerId::from("alice"), second);
        assert_eq!(peers.peer_count(), 1);

        let alice = peers.lookup("alice").unwrap();
        assert!(alice.handle.send("hi".into()));
        assert_eq!(second_rx.try_recv().unwrap(), Outbound::Text("hi".into()));
        assert!(first_rx.try_recv().is_err());
    }

    #[test]
    fn unregister_removes_record() {
        let mut peers = PeerRegistry::new();
        let (handle, _rx) = PeerHandle::channel();
        peers.register(PeerId::from("alice"), handle);

        assert!(peers.unregister("alice").is_some());
        assert!(peers.unregister("alice").is_none());
        assert_eq!(peers.peer_count(), 0);
    }

    #[test]
    fn activity_moves_peer_out_of_idle_set() {
        let mut peers = PeerRegistry::new();
        let (handle, _rx) = PeerHandle::channel();
        peers.register(PeerId::from("alice"), handle);

        let later = Instant::now() + Duration::from_secs(60);
        assert_eq!(peers.idle_since(later), vec![PeerId::from("alice")]);

        let before = Instant::now();
        assert!(peers.record_activity("alice"));
        assert!(peers.idle_since(before).is_empty());
        assert!(!peers.record_activity("bob"));
    }

    #[test]
    fn handle_reports_closed_receiver() {
        let (handle, rx) = PeerHandle::channel();
        assert!(handle.is_open());
        drop(rx);
        assert!(!handle.is_open());
        assert!(!handle.send("lost".into()));
        assert!(!handle.close("gone"));
    }
}
