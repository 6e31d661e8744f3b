use std::{
    collections::HashSet,
    time::{Duration, Instant},
};

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, trace, warn};

use crate::error::RelayError;

use super::{
    identity::{DEFAULT_PEER_ID_LENGTH, IdBounds, IdentityIssuer, PeerId, RoomId},
    msg::{ClientMessage, ServerMessage},
    peers::{Peer, PeerHandle, PeerRegistry},
    rooms::RoomRegistry,
};

const MAX_ISSUE_ATTEMPTS: usize = 8;

pub const IDLE_TIMEOUT_REASON: &str = "idle timeout";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayConfig {
    pub peer_id_length: usize,
    pub id_bounds: IdBounds,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            peer_id_length: DEFAULT_PEER_ID_LENGTH,
            id_bounds: IdBounds::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RelayStats {
    pub peers: usize,
    pub rooms: usize,
}

/// Both registries live under one lock so a join or a cleanup is never
/// observed half done.
#[derive(Debug, Default)]
struct Registries {
    peers: PeerRegistry,
    rooms: RoomRegistry,
}

impl Registries {
    fn join(&mut self, peer_id: &PeerId, room: RoomId) {
        let Some(peer) = self.peers.lookup_mut(peer_id.as_str()) else {
            return;
        };
        // rejoining still rebroadcasts
        if !peer.rooms.insert(room.clone()) {
            debug!(peer = %peer_id, %room, "peer rejoined room");
        }
        self.rooms.join(&room, peer_id);
        self.broadcast_members(&room);
    }

    fn broadcast_members(&self, room: &RoomId) {
        let members = self.rooms.members_of(room.as_str());
        let mut other_peer_ids: Vec<PeerId> = members.iter().cloned().collect();
        other_peer_ids.sort();

        let json = match (ServerMessage::Joined { other_peer_ids }).to_json() {
            Ok(json) => json,
            Err(e) => {
                warn!(%room, error = %e, "failed to serialize joined message");
                return;
            }
        };

        for member in &members {
            if let Some(peer) = self.peers.lookup(member.as_str()) {
                peer.handle.send(json.clone());
            }
        }
        debug!(%room, members = members.len(), "broadcast room membership");
    }

    /// Leaves every room first, then drops the peer record.
    fn remove_peer(&mut self, peer_id: &str) -> Option<Peer> {
        let peer = self.peers.lookup(peer_id)?;
        for room in &peer.rooms {
            self.rooms.leave(room, &peer.id);
        }
        self.peers.unregister(peer_id)
    }
}

pub struct Relay {
    issuer: IdentityIssuer,
    id_bounds: IdBounds,
    state: Mutex<Registries>,
}

impl Default for Relay {
    fn default() -> Self {
        Self::new(RelayConfig::default())
    }
}

impl Relay {
    pub fn new(config: RelayConfig) -> Self {
        Self {
            issuer: IdentityIssuer::new(config.peer_id_length),
            id_bounds: config.id_bounds,
            state: Mutex::new(Registries::default()),
        }
    }

    /// Registers a new connection and sends it its identity.
    pub fn connect(&self, handle: PeerHandle) -> PeerId {
        let mut state = self.state.lock();

        let mut id = self.issuer.issue();
        for _ in 1..MAX_ISSUE_ATTEMPTS {
            if !state.peers.contains(id.as_str()) {
                break;
            }
            id = self.issuer.issue();
        }

        let peer = state.peers.register(id.clone(), handle);
        match (ServerMessage::Init { your_peer_id: id.clone() }).to_json() {
            Ok(json) => {
                peer.handle.send(json);
            }
            Err(e) => warn!(peer = %id, error = %e, "failed to serialize init message"),
        }

        info!(peer = %id, peers = state.peers.peer_count(), "peer connected");
        id
    }

    /// Handles one inbound message and terminates the sender on a violation.
    pub fn receive(&self, peer_id: &PeerId, text: &str) {
        match self.handle_message(peer_id, text) {
            Ok(()) => {}
            Err(err) if err.is_violation() => {
                warn!(peer = %peer_id, error = ?err, "protocol violation");
                self.disconnect(peer_id, &err.to_string());
            }
            Err(_) => trace!(peer = %peer_id, "ignoring message for closed peer"),
        }
    }

    pub fn handle_message(&self, peer_id: &PeerId, text: &str) -> Result<(), RelayError> {
        let mut state = self.state.lock();
        if !state.peers.record_activity(peer_id.as_str()) {
            return Err(RelayError::NotConnected);
        }

        match ClientMessage::parse(text)? {
            ClientMessage::Join { room } => {
                if !self.id_bounds.admits(&room) || !self.id_bounds.admits(peer_id.as_str()) {
                    return Err(RelayError::InvalidIds);
                }
                state.join(peer_id, RoomId::from(room));
            }
            ClientMessage::Signal { sender_peer_id, receiver_peer_id, .. } => {
                if sender_peer_id != peer_id.as_str() {
                    return Err(RelayError::SpoofedSender);
                }
                match state.peers.lookup(&receiver_peer_id) {
                    Some(receiver) => {
                        receiver.handle.send(text.to_owned());
                        debug!(peer = %peer_id, receiver = %receiver_peer_id, "relayed signal");
                    }
                    None => debug!(peer = %peer_id, receiver = %receiver_peer_id, "dropping signal for unknown receiver"),
                }
            }
            ClientMessage::Ping => trace!(peer = %peer_id, "ping"),
        }
        Ok(())
    }

    /// Marks the peer as alive without interpreting anything.
    pub fn touch(&self, peer_id: &PeerId) -> bool {
        self.state.lock().peers.record_activity(peer_id.as_str())
    }

    /// Removes the peer from its rooms and the registry, then closes its
    /// transport. Returns `false` if the peer was already gone.
    pub fn disconnect(&self, peer_id: &PeerId, reason: &str) -> bool {
        let Some(peer) = self.state.lock().remove_peer(peer_id.as_str()) else {
            return false;
        };
        close_removed(peer, reason);
        true
    }

    /// Disconnects every peer silent for longer than `max_idle` as of `now`.
    pub fn evict_idle(&self, now: Instant, max_idle: Duration) -> Vec<PeerId> {
        let Some(cutoff) = now.checked_sub(max_idle) else {
            return Vec::new();
        };

        let evicted: Vec<Peer> = {
            let mut state = self.state.lock();
            state
                .peers
                .idle_since(cutoff)
                .iter()
                .filter_map(|id| state.remove_peer(id.as_str()))
                .collect()
        };

        evicted
            .into_iter()
            .map(|peer| {
                let id = peer.id.clone();
                close_removed(peer, IDLE_TIMEOUT_REASON);
                id
            })
            .collect()
    }

    pub fn shutdown(&self, reason: &str) -> usize {
        let peers: Vec<Peer> = {
            let mut state = self.state.lock();
            state
                .peers
                .ids()
                .iter()
                .filter_map(|id| state.remove_peer(id.as_str()))
                .collect()
        };

        let count = peers.len();
        for peer in peers {
            close_removed(peer, reason);
        }
        count
    }

    pub fn is_connected(&self, peer_id: &str) -> bool {
        self.state.lock().peers.contains(peer_id)
    }

    pub fn members_of(&self, room: &str) -> HashSet<PeerId> {
        self.state.lock().rooms.members_of(room)
    }

    pub fn rooms_of(&self, peer_id: &str) -> Option<HashSet<RoomId>> {
        self.state
            .lock()
            .peers
            .lookup(peer_id)
            .map(|peer| peer.rooms.clone())
    }

    pub fn stats(&self) -> RelayStats {
        let state = self.state.lock();
        RelayStats {
            peers: state.peers.peer_count(),
            rooms: state.rooms.room_count(),
        }
    }
}

fn close_removed(peer: Peer, reason: &str) {
    info!(peer = %peer.id, reason, rooms = peer.rooms.len(), "peer disconnected");
    if peer.handle.is_open() {
        peer.handle.close(reason);
    }
}
