use std::collections::{HashMap, HashSet};

use super::identity::{PeerId, RoomId};

/// Who is in which room. A room with no members is never stored.
#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: HashMap<RoomId, HashSet<PeerId>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if the peer was already a member.
    pub fn join(&mut self, room: &RoomId, peer: &PeerId) -> bool {
        self.rooms
            .entry(room.clone())
            .or_default()
            .insert(peer.clone())
    }

    /// Returns `false` if the peer was not a member.
    pub fn leave(&mut self, room: &RoomId, peer: &PeerId) -> bool {
        let Some(members) = self.rooms.get_mut(room) else {
            return false;
        };

        let removed = members.remove(peer);
        if members.is_empty() {
            self.rooms.remove(room);
        }
        removed
    }

    pub fn members_of(&self, room: &str) -> HashSet<PeerId> {
        self.rooms.get(room).cloned().unwrap_or_default()
    }

    pub fn contains(&self, room: &str) -> bool {
        self.rooms.contains_key(room)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RoomId, &HashSet<PeerId>)> {
        self.rooms.iter()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}
