use std::{borrow::Borrow, fmt};

use rand::Rng;
use serde::{Deserialize, Serialize};

const PEER_ID_CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyz";

pub const DEFAULT_PEER_ID_LENGTH: usize = 12;

/// Server-issued session identity. Never accepted from a client.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(String);

impl PeerId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for PeerId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PeerId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

/// Client-chosen room name. Rooms exist only while someone is in them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for RoomId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RoomId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for RoomId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Exclusive length bounds, in characters, for room and peer ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdBounds {
    pub min_exclusive: usize,
    pub max_exclusive: usize,
}

impl Default for IdBounds {
    fn default() -> Self {
        Self {
            min_exclusive: 5,
            max_exclusive: 100,
        }
    }
}

impl IdBounds {
    pub fn admits(&self, id: &str) -> bool {
        let len = id.chars().count();
        len > self.min_exclusive && len < self.max_exclusive
    }
}

/// Hands out random lowercase identities of a fixed length.
///
/// Uniqueness is not checked here; the relay retries against its registry.
#[derive(Debug, Clone, Copy)]
pub struct IdentityIssuer {
    length: usize,
}

impl Default for IdentityIssuer {
    fn default() -> Self {
        Self::new(DEFAULT_PEER_ID_LENGTH)
    }
}

impl IdentityIssuer {
    pub fn new(length: usize) -> Self {
        Self { length }
    }

    pub fn issue(&self) -> PeerId {
        let mut rng = rand::rng();
        let id = (0..self.length)
            .map(|_| PEER_ID_CHARS[rng.random_range(0..PEER_ID_CHARS.len())] as char)
            .collect();
        PeerId(id)
    }
}
