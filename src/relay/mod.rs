mod hub;
mod identity;
mod msg;
mod peers;
mod rooms;
mod ws;

use axum::{Router, routing::get};

use crate::AppState;

pub use hub::{IDLE_TIMEOUT_REASON, Relay, RelayConfig, RelayStats};
pub use identity::{DEFAULT_PEER_ID_LENGTH, IdBounds, IdentityIssuer, PeerId, RoomId};
pub use msg::{ClientMessage, ServerMessage};
pub use peers::{Outbound, Peer, PeerHandle, PeerRegistry};
pub use rooms::RoomRegistry;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(ws::relay_ws))
        .route("/ws", get(ws::relay_ws))
}
